//! Storage-specific error types.
//!
//! All store operations return [`StorageError`] on failure, which can be
//! matched to determine the underlying cause (missing record, database,
//! serialization).

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Record does not exist (e.g., update of a deleted monitor).
    #[error("{0} not found")]
    NotFound(String),

    /// Database operation failed (sqlx error).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid data in the store (e.g., duplicate identifier).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Internal error (e.g., task join failure).
    #[error("internal error: {0}")]
    Internal(String),
}
