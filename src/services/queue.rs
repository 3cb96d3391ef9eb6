//! Recommendation queue engine.
//!
//! Serves catalog items one at a time under a [`PreferenceSet`]. The queue
//! pages through the catalog on demand: whenever it runs low it refills in
//! the background, and when it is empty it refills before answering.
//!
//! All state lives behind one mutex per queue. The lock is never held while
//! waiting on the catalog, so consumers aren't blocked by a refill in
//! progress. Each full reset bumps a generation counter; a refill started
//! under an older generation discards its results instead of committing
//! them.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::{
    models::{CatalogItem, PreferenceSet},
    services::{catalog::CatalogSource, pipeline},
};

/// Remaining size at or below which a background refill starts
pub const LOW_WATER_MARK: usize = 5;
/// New items a refill pass tries to collect before stopping
pub const TARGET_BATCH_SIZE: usize = 20;
/// Pages a refill pass fetches at most
pub const MAX_PAGES_PER_REFILL: u32 = 10;
/// Upper bound on each catalog request unless configured otherwise
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Tuning for a queue instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    pub low_water_mark: usize,
    pub target_batch_size: usize,
    pub max_pages_per_refill: u32,
    /// Upper bound on each catalog request
    pub page_timeout: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            low_water_mark: LOW_WATER_MARK,
            target_batch_size: TARGET_BATCH_SIZE,
            max_pages_per_refill: MAX_PAGES_PER_REFILL,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
        }
    }
}

/// Point-in-time view of a queue, published after every state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub queue_size: usize,
    pub loading: bool,
    pub last_error: Option<String>,
    /// Next catalog page to fetch
    pub cursor: u32,
    pub seen_count: usize,
    pub has_preferences: bool,
}

#[derive(Debug)]
struct QueueState {
    preferences: Option<PreferenceSet>,
    generation: u64,
    queue: VecDeque<CatalogItem>,
    /// Every id ever placed in the queue since the last reset
    seen_ids: HashSet<u64>,
    cursor: u32,
    loading: bool,
    last_error: Option<String>,
}

/// A refill claimed under the lock, to be run without it
#[derive(Debug)]
struct RefillTicket {
    generation: u64,
    preferences: PreferenceSet,
}

impl QueueState {
    fn new() -> Self {
        Self {
            preferences: None,
            generation: 0,
            queue: VecDeque::new(),
            seen_ids: HashSet::new(),
            cursor: 1,
            loading: false,
            last_error: None,
        }
    }

    /// Clears everything and invalidates refills in flight
    fn wipe(&mut self) {
        let generation = self.generation + 1;
        *self = Self::new();
        self.generation = generation;
    }

    /// Marks a refill as running, unless one already is or there is nothing to
    /// refill for
    fn claim_refill(&mut self) -> Option<RefillTicket> {
        if self.loading {
            return None;
        }
        let preferences = self.preferences.clone()?;

        self.loading = true;
        self.last_error = None;

        Some(RefillTicket {
            generation: self.generation,
            preferences,
        })
    }

    fn is_current(&self, ticket: &RefillTicket) -> bool {
        self.generation == ticket.generation
    }

    fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_size: self.queue.len(),
            loading: self.loading,
            last_error: self.last_error.clone(),
            cursor: self.cursor,
            seen_count: self.seen_ids.len(),
            has_preferences: self.preferences.is_some(),
        }
    }
}

/// Handle to a recommendation queue.
///
/// Cloning is cheap; clones share the same queue.
#[derive(Clone)]
pub struct RecommendationQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    catalog: Arc<dyn CatalogSource>,
    settings: QueueSettings,
    state: Mutex<QueueState>,
    status_tx: watch::Sender<QueueStatus>,
}

impl RecommendationQueue {
    pub fn new(catalog: Arc<dyn CatalogSource>, settings: QueueSettings) -> Self {
        let state = QueueState::new();
        let (status_tx, _) = watch::channel(state.status());

        Self {
            inner: Arc::new(QueueInner {
                catalog,
                settings,
                state: Mutex::new(state),
                status_tx,
            }),
        }
    }

    pub fn settings(&self) -> QueueSettings {
        self.inner.settings
    }

    /// Replaces the preferences, clears all state and refills before returning.
    ///
    /// Always performs the full reset, even for unchanged preferences.
    pub async fn initialize(&self, preferences: PreferenceSet) {
        self.apply_preferences(preferences, true).await;
    }

    /// Same as [`initialize`](Self::initialize), but a no-op when the
    /// preferences are structurally equal to the active ones.
    ///
    /// Returns whether anything changed.
    pub async fn update_preferences(&self, preferences: PreferenceSet) -> bool {
        self.apply_preferences(preferences, false).await
    }

    async fn apply_preferences(&self, preferences: PreferenceSet, force: bool) -> bool {
        let ticket = {
            let mut state = self.lock().await;
            if !force && state.preferences.as_ref() == Some(&preferences) {
                tracing::debug!("Preferences unchanged, keeping queue");
                return false;
            }

            state.wipe();
            state.preferences = Some(preferences);
            let ticket = state.claim_refill();
            self.publish(&state);

            tracing::info!(
                generation = state.generation,
                catalog = self.inner.catalog.name(),
                "Queue initialized with new preferences"
            );
            ticket
        };

        if let Some(ticket) = ticket {
            self.refill_and_wait(ticket).await;
        }
        true
    }

    /// Takes the next item.
    ///
    /// Returns immediately when an item is queued, starting a background
    /// refill if that leaves the queue at or below the low-water mark. An
    /// empty queue is refilled first, unless a refill is already running, in
    /// which case this returns `None` without waiting for it.
    pub async fn consume(&self) -> Option<CatalogItem> {
        let mut state = self.lock().await;

        let front = state.queue.pop_front();
        if let Some(item) = front {
            self.after_take(state);
            return Some(item);
        }

        let ticket = state.claim_refill();
        self.publish(&state);
        drop(state);

        let Some(ticket) = ticket else {
            tracing::debug!("Queue empty and no refill could be started");
            return None;
        };
        self.refill_and_wait(ticket).await;

        let mut state = self.lock().await;
        let item = state.queue.pop_front();
        if item.is_some() {
            self.after_take(state);
        } else {
            tracing::debug!("Refill produced no items");
        }
        item
    }

    /// Publishes the post-take state and kicks off a background refill if the
    /// queue ran low
    fn after_take(&self, mut state: MutexGuard<'_, QueueState>) {
        let ticket = if state.queue.len() <= self.inner.settings.low_water_mark {
            state.claim_refill()
        } else {
            None
        };
        self.publish(&state);
        drop(state);

        if let Some(ticket) = ticket {
            self.spawn_refill(ticket);
        }
    }

    /// Runs a claimed refill on its own task.
    ///
    /// Once `loading` is set, only the refill itself may clear it, so the
    /// refill must not live inside a caller's future that can be dropped.
    fn spawn_refill(&self, ticket: RefillTicket) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            queue.run_refill(ticket).await;
        })
    }

    /// Spawns a claimed refill and waits for it. Cancelling the caller
    /// detaches the refill instead of aborting it.
    async fn refill_and_wait(&self, ticket: RefillTicket) {
        let generation = ticket.generation;
        if let Err(e) = self.spawn_refill(ticket).await {
            tracing::error!(generation, error = %e, "Refill task failed");

            let mut state = self.lock().await;
            if state.generation == generation && state.loading {
                state.loading = false;
                state.last_error = Some(format!("Refill task failed: {}", e));
                self.publish(&state);
            }
        }
    }

    /// Fetches, filters and deduplicates pages until enough new items are
    /// collected, then appends them in one step.
    ///
    /// Failures are recorded in `last_error`; items gathered before the
    /// failure are still appended.
    async fn run_refill(&self, ticket: RefillTicket) {
        let catalog = &self.inner.catalog;
        let settings = self.inner.settings;
        let preferences = &ticket.preferences;

        let mut accumulated: Vec<CatalogItem> = Vec::new();
        let mut failure: Option<String> = None;
        let mut pages_fetched = 0u32;

        tracing::debug!(generation = ticket.generation, "Refill started");

        while pages_fetched < settings.max_pages_per_refill
            && accumulated.len() < settings.target_batch_size
        {
            let page = {
                let state = self.lock().await;
                if !state.is_current(&ticket) {
                    tracing::debug!(generation = ticket.generation, "Stale refill abandoned");
                    return;
                }
                state.cursor
            };
            pages_fetched += 1;

            let fetched = pipeline::fetch_page(catalog, page, preferences, settings.page_timeout);
            let fetched = match fetched.await {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(page, error = %e, "Refill page fetch failed");
                    failure = Some(format!("Failed to load page {}: {}", page, e));
                    break;
                }
            };
            let exhausted = fetched.is_empty();
            let fetched_count = fetched.len();

            let filtered = pipeline::apply_client_filters(fetched, preferences);
            let filtered = pipeline::apply_availability_filter(
                catalog,
                filtered,
                preferences,
                settings.page_timeout,
            )
            .await;

            {
                let mut state = self.lock().await;
                if !state.is_current(&ticket) {
                    tracing::debug!(generation = ticket.generation, "Stale refill abandoned");
                    return;
                }
                state.cursor = page + 1;

                let before = accumulated.len();
                for item in filtered {
                    if state.seen_ids.insert(item.id) {
                        accumulated.push(item);
                    }
                }

                tracing::debug!(
                    page,
                    fetched = fetched_count,
                    accepted = accumulated.len() - before,
                    "Refill page processed"
                );
            }

            if exhausted {
                tracing::info!(page, "Catalog exhausted");
                break;
            }
        }

        let mut state = self.lock().await;
        if !state.is_current(&ticket) {
            tracing::debug!(generation = ticket.generation, "Stale refill discarded");
            return;
        }

        let added = accumulated.len();
        state.queue.extend(accumulated);
        state.loading = false;
        state.last_error = failure;
        self.publish(&state);

        tracing::info!(
            added,
            pages = pages_fetched,
            queue_size = state.queue.len(),
            cursor = state.cursor,
            failed = state.last_error.is_some(),
            "Refill finished"
        );
    }

    pub async fn clear_error(&self) {
        let mut state = self.lock().await;
        state.last_error = None;
        self.publish(&state);
    }

    /// Drops all state including the preferences; nothing is refilled
    pub async fn reset(&self) {
        let mut state = self.lock().await;
        state.wipe();
        self.publish(&state);
        tracing::info!(generation = state.generation, "Queue reset");
    }

    pub async fn queue_size(&self) -> usize {
        self.lock().await.queue.len()
    }

    pub async fn needs_refill(&self) -> bool {
        self.queue_size().await <= self.inner.settings.low_water_mark
    }

    pub async fn is_loading(&self) -> bool {
        self.lock().await.loading
    }

    pub async fn last_error(&self) -> Option<String> {
        self.lock().await.last_error.clone()
    }

    pub async fn preferences(&self) -> Option<PreferenceSet> {
        self.lock().await.preferences.clone()
    }

    /// Snapshot of the queued items, front first
    pub async fn items(&self) -> Vec<CatalogItem> {
        self.lock().await.queue.iter().cloned().collect()
    }

    pub async fn status(&self) -> QueueStatus {
        self.lock().await.status()
    }

    /// Receiver that sees a new [`QueueStatus`] after every state change
    pub fn subscribe(&self) -> watch::Receiver<QueueStatus> {
        self.inner.status_tx.subscribe()
    }

    async fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().await
    }

    fn publish(&self, state: &QueueState) {
        self.inner.status_tx.send_replace(state.status());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::services::catalog::MockCatalogSource;

    fn item(id: u64) -> CatalogItem {
        CatalogItem {
            id,
            title: format!("Title {}", id),
            overview: None,
            poster_path: None,
            release_date: Some("2015-06-01".to_string()),
            vote_average: 7.0,
            runtime: None,
            genre_ids: vec![],
        }
    }

    fn settings(target: usize) -> QueueSettings {
        QueueSettings {
            target_batch_size: target,
            ..QueueSettings::default()
        }
    }

    #[test]
    fn test_wipe_bumps_generation_and_resets_cursor() {
        let mut state = QueueState::new();
        state.cursor = 7;
        state.seen_ids.insert(3);
        state.loading = true;
        state.preferences = Some(PreferenceSet::new());

        state.wipe();

        assert_eq!(state.generation, 1);
        assert_eq!(state.cursor, 1);
        assert!(state.seen_ids.is_empty());
        assert!(!state.loading);
        assert!(state.preferences.is_none());
    }

    #[test]
    fn test_claim_refill_requires_preferences_and_idle() {
        let mut state = QueueState::new();
        assert!(state.claim_refill().is_none());

        state.preferences = Some(PreferenceSet::new());
        state.last_error = Some("old".to_string());
        let ticket = state.claim_refill().unwrap();
        assert_eq!(ticket.generation, 0);
        assert!(state.loading);
        assert!(state.last_error.is_none());

        assert!(state.claim_refill().is_none());
    }

    #[tokio::test]
    async fn test_initialize_dedups_across_pages() {
        let mut mock = MockCatalogSource::new();
        mock.expect_fetch_discover().returning(|q| {
            Ok(match q.page {
                1 => vec![item(1), item(2), item(3)],
                2 => vec![item(3), item(4), item(4)],
                _ => vec![item(5)],
            })
        });
        mock.expect_name().return_const("mock");

        let queue = RecommendationQueue::new(Arc::new(mock), settings(5));
        queue.initialize(PreferenceSet::new()).await;

        let ids: Vec<u64> = queue.items().await.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let status = queue.status().await;
        assert_eq!(status.cursor, 4);
        assert_eq!(status.seen_count, 5);
        assert!(!status.loading);
    }

    #[tokio::test]
    async fn test_page_bound_limits_refill() {
        let mut mock = MockCatalogSource::new();
        mock.expect_fetch_discover()
            .times(10)
            .returning(|q| Ok(vec![item(q.page as u64)]));
        mock.expect_name().return_const("mock");

        let queue = RecommendationQueue::new(Arc::new(mock), QueueSettings::default());
        queue.initialize(PreferenceSet::new()).await;

        assert_eq!(queue.queue_size().await, 10);
        assert_eq!(queue.status().await.cursor, 11);
    }

    #[tokio::test]
    async fn test_failure_keeps_partial_progress() {
        let mut mock = MockCatalogSource::new();
        mock.expect_fetch_discover().returning(|q| {
            if q.page == 1 {
                Ok(vec![item(1), item(2)])
            } else {
                Err(CatalogError::Transient("boom".to_string()))
            }
        });
        mock.expect_fetch_trending()
            .returning(|_, _| Err(CatalogError::Transient("still boom".to_string())));
        mock.expect_name().return_const("mock");

        let queue = RecommendationQueue::new(Arc::new(mock), settings(20));
        queue.initialize(PreferenceSet::new()).await;

        let status = queue.status().await;
        assert_eq!(status.queue_size, 2);
        assert_eq!(status.cursor, 2);
        assert!(!status.loading);
        let error = status.last_error.unwrap();
        assert!(error.contains("page 2"), "unexpected error: {}", error);

        queue.clear_error().await;
        assert_eq!(queue.last_error().await, None);
    }

    #[tokio::test]
    async fn test_subscribers_see_refill_result() {
        let mut mock = MockCatalogSource::new();
        mock.expect_fetch_discover().returning(|_| Ok(vec![item(1), item(2)]));
        mock.expect_name().return_const("mock");

        let queue = RecommendationQueue::new(Arc::new(mock), settings(2));
        let rx = queue.subscribe();
        queue.initialize(PreferenceSet::new()).await;

        let status = rx.borrow().clone();
        assert_eq!(status.queue_size, 2);
        assert!(status.has_preferences);
        assert!(!status.loading);
    }
}
