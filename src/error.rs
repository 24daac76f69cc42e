//! Error types for the catalog API
//!
//! Provides the error taxonomy of each layer using thiserror, and the
//! mapping of resolver failures onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Failures raised by a cache backend.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key rejected by the store
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Value exceeds the per-entry size limit
    #[error("Value too large: {0} bytes")]
    ValueTooLarge(usize),

    /// Cache is full and eviction failed
    #[error("Cache full: {0}")]
    CacheFull(String),

    /// Backend cannot be reached
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

// == Store Error Enum ==
/// Failures raised by a document store client.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Transport-level failure reaching the store
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    /// Store did not answer within the configured bound
    #[error("Document store timed out")]
    Timeout,

    /// Index creation hit an existing index
    #[error("Index '{0}' already exists")]
    IndexExists(String),

    /// Stored document does not match the entity schema
    #[error("Invalid document '{id}': {message}")]
    InvalidDocument { id: String, message: String },

    /// Store answered with an unexpected status
    #[error("Document store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }
}

// == Resolve Error Enum ==
/// Failures surfaced by the cache-aside resolver.
///
/// Cache and decode failures never appear here: they degrade to the store path.
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// Store lookup failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Store lookup exceeded its time bound
    #[error("Document store lookup timed out")]
    Timeout,
}

// == Api Error Enum ==
/// Error type returned by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Requested resource is absent
    #[error("{0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream store cannot be reached
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Upstream store answered with an error
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Upstream store timed out
    #[error("Upstream timeout")]
    Timeout,
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Timeout | ResolveError::Store(StoreError::Timeout) => ApiError::Timeout,
            ResolveError::Store(StoreError::Unavailable(msg)) => ApiError::Unavailable(msg),
            ResolveError::Store(other) => ApiError::BadGateway(other.to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for HTTP handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
