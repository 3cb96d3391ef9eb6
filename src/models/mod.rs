use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Display};

pub mod preferences;

pub use preferences::{PreferenceSet, YearRange};

/// Kind of content a catalog query targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Movie,
    Show,
}

impl ContentType {
    /// Path segment TMDB uses for this content type
    pub fn tmdb_segment(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Show => "tv",
        }
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tmdb_segment())
    }
}

/// A single recommendable title returned by the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub id: u64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    /// ISO `YYYY-MM-DD`, when known
    pub release_date: Option<String>,
    pub vote_average: f64,
    pub runtime: Option<u32>,
    pub genre_ids: Vec<u32>,
}

impl CatalogItem {
    /// Release year parsed from the first four characters of the release date.
    ///
    /// Returns `None` when the date is missing or doesn't start with a year.
    pub fn release_year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .and_then(|date| date.get(..4))
            .and_then(|year| year.parse().ok())
    }
}

/// A streaming service offering a title
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchProvider {
    pub provider_id: u32,
    pub provider_name: String,
    pub logo_path: Option<String>,
}

/// Provider lookup result as stored in the cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAvailability {
    pub item_id: u64,
    pub providers: Vec<WatchProvider>,
    pub cached_at: DateTime<Utc>,
}

// ============================================================================
// TMDB API Types
// ============================================================================

/// One page of a TMDB list endpoint (trending or discover)
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<TmdbListing>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

/// Movie or TV listing; TV results use `name` and `first_air_date`
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbListing {
    pub id: u64,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default, alias = "first_air_date")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
}

impl From<TmdbListing> for CatalogItem {
    fn from(listing: TmdbListing) -> Self {
        CatalogItem {
            id: listing.id,
            title: listing.title,
            overview: listing.overview.filter(|o| !o.is_empty()),
            poster_path: listing.poster_path,
            // TMDB sends "" for unknown dates
            release_date: listing.release_date.filter(|d| !d.is_empty()),
            vote_average: listing.vote_average,
            runtime: listing.runtime,
            genre_ids: listing.genre_ids,
        }
    }
}

/// API response from GET /{movie|tv}/{id}/watch/providers
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbProvidersResponse {
    #[serde(default)]
    pub results: HashMap<String, TmdbRegionProviders>,
}

/// Offers for one region, grouped by monetization type
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbRegionProviders {
    #[serde(default)]
    pub flatrate: Vec<TmdbProvider>,
    #[serde(default)]
    pub free: Vec<TmdbProvider>,
    #[serde(default)]
    pub ads: Vec<TmdbProvider>,
    #[serde(default)]
    pub rent: Vec<TmdbProvider>,
    #[serde(default)]
    pub buy: Vec<TmdbProvider>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbProvider {
    pub provider_id: u32,
    pub provider_name: String,
    #[serde(default)]
    pub logo_path: Option<String>,
}

impl From<TmdbProvider> for WatchProvider {
    fn from(provider: TmdbProvider) -> Self {
        WatchProvider {
            provider_id: provider.provider_id,
            provider_name: provider.provider_name,
            logo_path: provider.logo_path,
        }
    }
}

impl TmdbRegionProviders {
    /// Providers streaming the title (subscription, free or ad-supported).
    ///
    /// Rent and buy offers are not streaming availability. Each provider
    /// appears once, at its first occurrence.
    pub fn streaming(self) -> Vec<WatchProvider> {
        let mut providers: Vec<WatchProvider> = Vec::new();
        for offer in self.flatrate.into_iter().chain(self.free).chain(self.ads) {
            if !providers.iter().any(|p| p.provider_id == offer.provider_id) {
                providers.push(offer.into());
            }
        }
        providers
    }
}
