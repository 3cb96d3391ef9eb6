//! Per-page fetch and filter steps used by the recommendation queue.
//!
//! Order is fixed: fetch (discover, falling back to trending), then the
//! rating/year re-check, then provider availability. Every step preserves
//! the catalog's ordering.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    error::{CatalogError, CatalogResult},
    models::{CatalogItem, PreferenceSet},
    services::catalog::{CatalogSource, DiscoverQuery},
};

/// Runs a catalog call with an upper bound on how long it may take
pub async fn with_timeout<T>(
    limit: Duration,
    request: impl Future<Output = CatalogResult<T>>,
) -> CatalogResult<T> {
    tokio::time::timeout(limit, request)
        .await
        .unwrap_or(Err(CatalogError::Timeout(limit)))
}

/// Fetches one page, preferring server-side filtering.
///
/// Any discover failure falls back to the trending page; only a trending
/// failure is returned.
pub async fn fetch_page(
    catalog: &Arc<dyn CatalogSource>,
    page: u32,
    preferences: &PreferenceSet,
    limit: Duration,
) -> CatalogResult<Vec<CatalogItem>> {
    let query = DiscoverQuery::for_preferences(page, preferences);

    match with_timeout(limit, catalog.fetch_discover(&query)).await {
        Ok(items) => Ok(items),
        Err(e) => {
            match &e {
                CatalogError::Unsupported(_) => tracing::debug!(
                    catalog = catalog.name(),
                    page,
                    "Discover unsupported, using trending"
                ),
                _ => tracing::warn!(
                    catalog = catalog.name(),
                    page,
                    error = %e,
                    "Discover failed, falling back to trending"
                ),
            }
            with_timeout(limit, catalog.fetch_trending(page, preferences.content_type)).await
        }
    }
}

/// Drops items below the rating threshold or outside the year range.
///
/// Guards against server-side filters that are looser than ours.
pub fn apply_client_filters(
    items: Vec<CatalogItem>,
    preferences: &PreferenceSet,
) -> Vec<CatalogItem> {
    items
        .into_iter()
        .filter(|item| preferences.accepts(item))
        .collect()
}

/// Keeps items streaming on at least one selected provider.
///
/// Only strict preferences with a non-empty provider selection filter
/// anything. Lookups run in parallel; an item whose lookup fails or times
/// out is dropped.
pub async fn apply_availability_filter(
    catalog: &Arc<dyn CatalogSource>,
    items: Vec<CatalogItem>,
    preferences: &PreferenceSet,
    limit: Duration,
) -> Vec<CatalogItem> {
    if !preferences.filters_by_provider() {
        return items;
    }

    let mut tasks = Vec::with_capacity(items.len());
    for item in &items {
        let catalog = Arc::clone(catalog);
        let item_id = item.id;
        let content_type = preferences.content_type;
        tasks.push(tokio::spawn(async move {
            with_timeout(limit, catalog.fetch_providers(item_id, content_type)).await
        }));
    }

    let mut kept = Vec::new();
    let mut failures = 0usize;

    for (item, task) in items.into_iter().zip(tasks) {
        let lookup = match task.await {
            Ok(result) => result,
            Err(e) => Err(CatalogError::Transient(e.to_string())),
        };

        match lookup {
            Ok(providers) => {
                if providers
                    .iter()
                    .any(|p| preferences.provider_ids.contains(&p.provider_id))
                {
                    kept.push(item);
                }
            }
            Err(e) => {
                failures += 1;
                let e = CatalogError::ProviderLookup {
                    item_id: item.id,
                    reason: e.to_string(),
                };
                tracing::warn!(error = %e, "Dropping item after failed provider lookup");
            }
        }
    }

    if failures > 0 {
        tracing::warn!(kept = kept.len(), failures, "Partial provider lookup failure");
    }

    kept
}
