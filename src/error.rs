use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors surfaced through the HTTP layer
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Failures reported by a catalog source.
///
/// None of these are fatal: the recommendation queue recovers from each one
/// by falling back to another query, dropping an item, or recording the
/// message as its last error.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// Network or parse failure on a single request
    #[error("Catalog request failed: {0}")]
    Transient(String),

    /// Request URLs carry the API key, so they are stripped on conversion
    #[error("HTTP client error: {0}")]
    Http(reqwest::Error),

    /// The source cannot serve this kind of query (e.g. no discover filtering)
    #[error("{0} is not supported by this catalog")]
    Unsupported(&'static str),

    #[error("Provider lookup failed for item {item_id}: {reason}")]
    ProviderLookup { item_id: u64, reason: String },

    #[error("Catalog request timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        CatalogError::Http(e.without_url())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors from the Redis cache layer
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("Cache error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
