use axum::{
    http::StatusCode,
    middleware::from_fn,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

pub mod sessions;
pub mod state;

pub use state::AppState;

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/:id", delete(sessions::delete_session))
        .route("/sessions/:id/queue", get(sessions::get_queue))
        .route("/sessions/:id/initialize", post(sessions::initialize))
        .route("/sessions/:id/preferences", put(sessions::update_preferences))
        .route("/sessions/:id/next", post(sessions::next_item))
        .route("/sessions/:id/error", delete(sessions::clear_error))
        .route("/sessions/:id/reset", post(sessions::reset))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
