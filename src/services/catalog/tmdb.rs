//! TMDB catalog source
//!
//! API Flow:
//! 1. Trending: /trending/{movie|tv}/week → popularity-ranked page
//! 2. Discover: /discover/{movie|tv} → page filtered by genre, dates, rating, providers
//! 3. Providers: /{movie|tv}/{id}/watch/providers → offers per region
//!
//! Provider lookups are cached in Redis; list pages are not, since the
//! queue never asks for the same page twice in a session.

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{CatalogError, CatalogResult},
    models::{
        CatalogItem, ContentType, ProviderAvailability, TmdbPage, TmdbProvidersResponse,
        WatchProvider,
    },
    services::catalog::{CatalogSource, DiscoverQuery},
};
use chrono::Utc;
use reqwest::Client as HttpClient;

const PROVIDER_CACHE_TTL: u64 = 86400; // 1 day

#[derive(Clone)]
pub struct TmdbCatalog {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    region: String,
    language: String,
    cache: Cache,
}

impl TmdbCatalog {
    pub fn new(
        cache: Cache,
        api_key: String,
        api_url: String,
        region: String,
        language: String,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            region,
            language,
            cache,
        }
    }

    /// GETs a TMDB endpoint and decodes the JSON body
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> CatalogResult<T> {
        let url = format!("{}{}", self.api_url, path);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("language", self.language.as_str()),
            ])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                path = %path,
                status = %status,
                body = %body,
                "TMDB request failed"
            );
            return Err(CatalogError::Transient(format!(
                "TMDB returned status {} for {}: {}",
                status, path, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn get_page(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> CatalogResult<Vec<CatalogItem>> {
        let page: TmdbPage = self.get_json(path, params).await?;

        tracing::debug!(
            path = %path,
            page = page.page,
            total_pages = ?page.total_pages,
            results = page.results.len(),
            "TMDB page fetched"
        );

        Ok(page.results.into_iter().map(CatalogItem::from).collect())
    }

    async fn request_providers(
        &self,
        item_id: u64,
        content_type: ContentType,
    ) -> CatalogResult<ProviderAvailability> {
        let path = format!("/{}/{}/watch/providers", content_type.tmdb_segment(), item_id);
        let mut response: TmdbProvidersResponse = self.get_json(&path, &[]).await?;

        let providers = response
            .results
            .remove(&self.region)
            .map(|region| region.streaming())
            .unwrap_or_default();

        tracing::info!(
            item_id,
            region = %self.region,
            providers = providers.len(),
            "Watch providers fetched"
        );

        Ok(ProviderAvailability {
            item_id,
            providers,
            cached_at: Utc::now(),
        })
    }
}

/// Query parameters for a discover request
fn discover_params(query: &DiscoverQuery, region: &str) -> Vec<(String, String)> {
    let mut params = vec![
        ("page".to_string(), query.page.to_string()),
        ("sort_by".to_string(), "popularity.desc".to_string()),
        ("include_adult".to_string(), "false".to_string()),
    ];

    if let Some(genres) = &query.genre_ids {
        // "|" is OR in TMDB filters, "," would be AND
        params.push(("with_genres".to_string(), join_ids(genres)));
    }

    if let Some(range) = &query.year_range {
        let field = match query.content_type {
            ContentType::Movie => "primary_release_date",
            ContentType::Show => "first_air_date",
        };
        params.push((format!("{}.gte", field), format!("{}-01-01", range.min)));
        params.push((format!("{}.lte", field), format!("{}-12-31", range.max)));
    }

    if let Some(min_rating) = query.min_rating {
        params.push(("vote_average.gte".to_string(), min_rating.to_string()));
    }

    if let Some(providers) = &query.provider_ids {
        params.push(("with_watch_providers".to_string(), join_ids(providers)));
        params.push(("watch_region".to_string(), region.to_string()));
    }

    params
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

#[async_trait::async_trait]
impl CatalogSource for TmdbCatalog {
    async fn fetch_trending(
        &self,
        page: u32,
        content_type: ContentType,
    ) -> CatalogResult<Vec<CatalogItem>> {
        let path = format!("/trending/{}/week", content_type.tmdb_segment());
        self.get_page(&path, &[("page".to_string(), page.to_string())])
            .await
    }

    async fn fetch_discover(&self, query: &DiscoverQuery) -> CatalogResult<Vec<CatalogItem>> {
        let path = format!("/discover/{}", query.content_type.tmdb_segment());
        self.get_page(&path, &discover_params(query, &self.region))
            .await
    }

    async fn fetch_providers(
        &self,
        item_id: u64,
        content_type: ContentType,
    ) -> CatalogResult<Vec<WatchProvider>> {
        let availability: CatalogResult<ProviderAvailability> = cached!(
            self.cache,
            CacheKey::WatchProviders(content_type, item_id),
            PROVIDER_CACHE_TTL,
            async move { self.request_providers(item_id, content_type).await }
        );

        Ok(availability?.providers)
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
