use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::{CatalogSource, QueueSettings, RecommendationQueue};

struct Session {
    queue: RecommendationQueue,
    last_seen: Instant,
}

/// Shared application state
///
/// Each session owns one recommendation queue; all queues share the catalog.
/// Sessions not touched for a while are dropped by [`AppState::evict_idle`].
pub struct AppState {
    pub catalog: Arc<dyn CatalogSource>,
    pub queue_settings: QueueSettings,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl AppState {
    pub fn new(catalog: Arc<dyn CatalogSource>, queue_settings: QueueSettings) -> Self {
        Self {
            catalog,
            queue_settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Starts a session with an empty, uninitialized queue
    pub async fn create_session(&self) -> Uuid {
        let session_id = Uuid::new_v4();
        let queue = RecommendationQueue::new(Arc::clone(&self.catalog), self.queue_settings);
        let session = Session {
            queue,
            last_seen: Instant::now(),
        };
        self.sessions.write().await.insert(session_id, session);
        session_id
    }

    /// Looks up a session's queue and marks the session as active.
    ///
    /// The returned handle outlives the lock.
    pub async fn queue(&self, session_id: &Uuid) -> AppResult<RecommendationQueue> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;

        session.last_seen = Instant::now();
        Ok(session.queue.clone())
    }

    pub async fn remove_session(&self, session_id: &Uuid) -> AppResult<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;

        // Invalidates any background refill still holding a handle
        session.queue.reset().await;
        Ok(())
    }

    /// Removes sessions idle for at least `max_idle`, returning how many
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let expired: Vec<Session> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, session)| session.last_seen.elapsed() >= max_idle)
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &expired {
            session.queue.reset().await;
        }

        if !expired.is_empty() {
            tracing::info!(evicted = expired.len(), "Idle sessions evicted");
        }
        expired.len()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
