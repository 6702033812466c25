//! Scheduler error types.

use thiserror::Error;

use crate::agent::AgentError;
use crate::model::{InvalidIdError, ObjectId};
use crate::storage::StorageError;
use crate::transport::TransportError;

/// Errors returned by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Malformed identifier; nothing was touched.
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdError),

    /// Monitor rejected by validation; nothing was touched.
    #[error("invalid monitor: {0}")]
    InvalidMonitor(String),

    /// Host rejected by validation; nothing was touched.
    #[error("invalid host: {0}")]
    InvalidHost(String),

    /// No record with this identifier.
    #[error("{0} not found")]
    NotFound(String),

    /// Store failure.
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for SchedulerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::NotFound(what),
            other => Self::Storage(other),
        }
    }
}

/// Why a single execution produced no points.
///
/// Logged by the scheduler; never returned to callers.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("host {0} not found")]
    HostNotFound(ObjectId),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),
}
