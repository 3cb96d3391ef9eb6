#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cinematch_api::{
    error::{CatalogError, CatalogResult},
    models::{CatalogItem, ContentType, WatchProvider},
    services::{CatalogSource, DiscoverQuery},
};

/// In-memory catalog with scripted pages and call counters
#[derive(Default)]
pub struct StubCatalog {
    pages: HashMap<(ContentType, u32), Vec<CatalogItem>>,
    providers: HashMap<u64, Vec<WatchProvider>>,
    failing_providers: HashSet<u64>,
    discover_unsupported: bool,
    delay: Duration,
    trending_failures: AtomicUsize,
    pub discover_calls: AtomicUsize,
    pub trending_calls: AtomicUsize,
    pub provider_calls: AtomicUsize,
}

impl StubCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: u32, items: Vec<CatalogItem>) -> Self {
        self.pages.insert((ContentType::Movie, page), items);
        self
    }

    pub fn with_show_page(mut self, page: u32, items: Vec<CatalogItem>) -> Self {
        self.pages.insert((ContentType::Show, page), items);
        self
    }

    pub fn with_providers(mut self, item_id: u64, provider_ids: &[u32]) -> Self {
        let providers = provider_ids
            .iter()
            .map(|&id| WatchProvider {
                provider_id: id,
                provider_name: format!("Provider {}", id),
                logo_path: None,
            })
            .collect();
        self.providers.insert(item_id, providers);
        self
    }

    pub fn with_failing_provider_lookup(mut self, item_id: u64) -> Self {
        self.failing_providers.insert(item_id);
        self
    }

    /// Discover requests fail as unsupported, forcing the trending fallback
    pub fn without_discover(mut self) -> Self {
        self.discover_unsupported = true;
        self
    }

    /// Every page request waits this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The next `count` trending requests fail
    pub fn failing_trending(self, count: usize) -> Self {
        self.trending_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn discover_count(&self) -> usize {
        self.discover_calls.load(Ordering::SeqCst)
    }

    pub fn trending_count(&self) -> usize {
        self.trending_calls.load(Ordering::SeqCst)
    }

    pub fn provider_count(&self) -> usize {
        self.provider_calls.load(Ordering::SeqCst)
    }

    fn page(&self, content_type: ContentType, page: u32) -> Vec<CatalogItem> {
        self.pages
            .get(&(content_type, page))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl CatalogSource for StubCatalog {
    async fn fetch_trending(
        &self,
        page: u32,
        content_type: ContentType,
    ) -> CatalogResult<Vec<CatalogItem>> {
        self.trending_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        let failing = self
            .trending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CatalogError::Transient("connection reset by peer".to_string()));
        }

        Ok(self.page(content_type, page))
    }

    async fn fetch_discover(&self, query: &DiscoverQuery) -> CatalogResult<Vec<CatalogItem>> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        if self.discover_unsupported {
            return Err(CatalogError::Unsupported("discover"));
        }
        tokio::time::sleep(self.delay).await;

        // Returns the page unfiltered, like an imprecise server-side filter
        Ok(self.page(query.content_type, query.page))
    }

    async fn fetch_providers(
        &self,
        item_id: u64,
        _content_type: ContentType,
    ) -> CatalogResult<Vec<WatchProvider>> {
        self.provider_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_providers.contains(&item_id) {
            return Err(CatalogError::Transient("provider service unavailable".to_string()));
        }
        Ok(self.providers.get(&item_id).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

pub fn movie(id: u64) -> CatalogItem {
    movie_from(id, Some("2015-06-01"), 7.0)
}

pub fn movie_from(id: u64, release_date: Option<&str>, vote_average: f64) -> CatalogItem {
    CatalogItem {
        id,
        title: format!("Movie {}", id),
        overview: Some(format!("Overview of movie {}", id)),
        poster_path: Some(format!("/poster{}.jpg", id)),
        release_date: release_date.map(str::to_string),
        vote_average,
        runtime: Some(110),
        genre_ids: vec![28],
    }
}

pub fn movies(ids: impl IntoIterator<Item = u64>) -> Vec<CatalogItem> {
    ids.into_iter().map(movie).collect()
}

pub fn ids(items: &[CatalogItem]) -> Vec<u64> {
    items.iter().map(|i| i.id).collect()
}
