//! Error types for the storage layer.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network error reaching the backend.
    #[error("network error: {0}")]
    Network(String),

    /// Backend-side storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Missing or rejected credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Requested row or blob does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Concurrent-writer conflict on a guarded commit.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
