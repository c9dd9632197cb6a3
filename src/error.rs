//! Error types for the runtime cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache manager and its host surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// NetworkFirst (or StaleWhileRevalidate on a miss) exhausted network and cache
    #[error("Network failed and no cached response for {key}: {reason}")]
    CacheMissAfterNetworkFailure { key: String, reason: String },

    /// CacheFirst found nothing cached and the network failed
    #[error("No cached response and network failed for {key}: {reason}")]
    NoCacheNoNetwork { key: String, reason: String },

    /// Invalid rule set, detected at initialization
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Purge requested for a store no rule declares
    #[error("Unknown cache store: {0}")]
    UnknownStore(String),

    /// A request no rule intercepts could not be fetched
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    /// The proxy only forwards GET and HEAD
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Persistence backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Entry could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Storage(err.to_string())
    }
}

// == Fetch Error Enum ==
/// Failure reported by a network fetch primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport-level failure (connection refused, DNS, reset...)
    #[error("network error: {0}")]
    Network(String),

    /// The fetch was abandoned before a complete response arrived
    #[error("fetch cancelled")]
    Cancelled,
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::CacheMissAfterNetworkFailure { .. } => StatusCode::GATEWAY_TIMEOUT,
            CacheError::NoCacheNoNetwork { .. } => StatusCode::BAD_GATEWAY,
            CacheError::Upstream(_) => StatusCode::BAD_GATEWAY,
            CacheError::UnknownStore(_) => StatusCode::NOT_FOUND,
            CacheError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            CacheError::Configuration(_)
            | CacheError::Storage(_)
            | CacheError::Serialization(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the runtime cache.
pub type Result<T> = std::result::Result<T, CacheError>;
