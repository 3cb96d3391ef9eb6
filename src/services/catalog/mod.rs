//! Catalog source abstraction
//!
//! The recommendation queue pages through a catalog of titles without knowing
//! where it comes from. A source answers three kinds of request: a popularity
//! ranked "trending" page, a server-side filtered "discover" page, and the
//! streaming providers of a single title. Sources are read-only and can be
//! shared between any number of queues.

use crate::{
    error::CatalogResult,
    models::{CatalogItem, ContentType, PreferenceSet, WatchProvider, YearRange},
};

pub mod tmdb;

pub use tmdb::TmdbCatalog;

/// Server-side filters for a discover request.
///
/// `None` means "no constraint" for that dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverQuery {
    pub page: u32,
    pub content_type: ContentType,
    pub genre_ids: Option<Vec<u32>>,
    pub year_range: Option<YearRange>,
    pub min_rating: Option<f64>,
    pub provider_ids: Option<Vec<u32>>,
}

impl DiscoverQuery {
    /// Builds the query for one page under the given preferences.
    ///
    /// Providers are only sent in strict mode; in loose mode they must not
    /// narrow what the catalog returns.
    pub fn for_preferences(page: u32, preferences: &PreferenceSet) -> Self {
        let genre_ids = (!preferences.genre_ids.is_empty())
            .then(|| preferences.genre_ids.iter().copied().collect());
        let min_rating = (preferences.min_rating > 0.0).then_some(preferences.min_rating);
        let provider_ids = preferences
            .filters_by_provider()
            .then(|| preferences.provider_ids.iter().copied().collect());

        Self {
            page,
            content_type: preferences.content_type,
            genre_ids,
            year_range: Some(preferences.year_range),
            min_rating,
            provider_ids,
        }
    }
}

/// Trait for catalog sources
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Unfiltered page ordered by the catalog's popularity ranking
    async fn fetch_trending(
        &self,
        page: u32,
        content_type: ContentType,
    ) -> CatalogResult<Vec<CatalogItem>>;

    /// Filtered page.
    ///
    /// Returns `CatalogError::Unsupported` if the source can't filter
    /// server-side; callers fall back to [`CatalogSource::fetch_trending`].
    async fn fetch_discover(&self, query: &DiscoverQuery) -> CatalogResult<Vec<CatalogItem>>;

    /// Streaming providers currently offering the title
    async fn fetch_providers(
        &self,
        item_id: u64,
        content_type: ContentType,
    ) -> CatalogResult<Vec<WatchProvider>>;

    /// Source name for logging and debugging
    fn name(&self) -> &'static str;
}
