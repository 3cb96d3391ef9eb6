use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{CatalogItem, PreferenceSet},
    routes::AppState,
    services::QueueStatus,
};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub status: QueueStatus,
    pub items: Vec<CatalogItem>,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub changed: bool,
    pub status: QueueStatus,
}

#[derive(Debug, Serialize)]
pub struct NextItemResponse {
    pub item: Option<CatalogItem>,
    pub status: QueueStatus,
}

/// Creates a session with its own recommendation queue
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> (StatusCode, Json<SessionResponse>) {
    let session_id = state.create_session().await;
    let sessions = state.session_count().await;

    tracing::info!(
        request_id = %request_id,
        session_id = %session_id,
        sessions,
        "Session created"
    );

    (StatusCode::CREATED, Json(SessionResponse { session_id }))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(session_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.remove_session(&session_id).await?;
    tracing::info!(request_id = %request_id, session_id = %session_id, "Session removed");
    Ok(StatusCode::NO_CONTENT)
}

/// Current queue status and contents
pub async fn get_queue(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<QueueResponse>> {
    let queue = state.queue(&session_id).await?;
    Ok(Json(QueueResponse {
        status: queue.status().await,
        items: queue.items().await,
    }))
}

/// Resets the queue to new preferences and waits for the first refill
pub async fn initialize(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(session_id): Path<Uuid>,
    Json(preferences): Json<PreferenceSet>,
) -> AppResult<Json<QueueStatus>> {
    preferences.validate()?;
    let queue = state.queue(&session_id).await?;

    tracing::info!(
        request_id = %request_id,
        session_id = %session_id,
        genres = preferences.genre_ids.len(),
        providers = preferences.provider_ids.len(),
        strict = preferences.availability_strict,
        "Initializing queue"
    );

    queue.initialize(preferences).await;
    Ok(Json(queue.status().await))
}

pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(session_id): Path<Uuid>,
    Json(preferences): Json<PreferenceSet>,
) -> AppResult<Json<PreferencesResponse>> {
    preferences.validate()?;
    let queue = state.queue(&session_id).await?;

    let changed = queue.update_preferences(preferences).await;
    tracing::info!(
        request_id = %request_id,
        session_id = %session_id,
        changed,
        "Preferences applied"
    );

    Ok(Json(PreferencesResponse {
        changed,
        status: queue.status().await,
    }))
}

/// Takes the next recommendation off the queue
pub async fn next_item(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<NextItemResponse>> {
    let queue = state.queue(&session_id).await?;
    let item = queue.consume().await;

    Ok(Json(NextItemResponse {
        item,
        status: queue.status().await,
    }))
}

pub async fn clear_error(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.queue(&session_id).await?.clear_error().await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(session_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.queue(&session_id).await?.reset().await;
    tracing::info!(request_id = %request_id, session_id = %session_id, "Queue reset");
    Ok(StatusCode::NO_CONTENT)
}
