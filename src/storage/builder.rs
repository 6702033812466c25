//! Storage builder and handles.
//!
//! Provides a builder pattern for constructing the SQLite storage layer and
//! a handles struct for accessing the store and the point writer.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::storage::StorageError;
use crate::storage::actor::{DEFAULT_BATCH_FLUSH_INTERVAL, DEFAULT_BATCH_SIZE, PointWriterActor};
use crate::storage::document_store::SqliteStore;
use crate::storage::writer::StorageWriter;

/// Default channel capacity for point batches.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Builder for constructing the storage layer.
#[derive(Debug, Clone)]
pub struct StorageBuilder {
    url: String,
    channel_capacity: usize,
    batch_size: usize,
    batch_flush_interval: Duration,
}

impl StorageBuilder {
    /// Create a builder for a sqlx SQLite URL (e.g., `sqlite::memory:`).
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_flush_interval: DEFAULT_BATCH_FLUSH_INTERVAL,
        }
    }

    /// Create a builder for a database file, creating its directory on build.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::new(format!("sqlite:{}", path.as_ref().display()))
    }

    /// Set the channel capacity for point batches.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the number of buffered points that triggers a flush.
    ///
    /// Default: 500 points.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the maximum time points stay buffered. Default: 1 second.
    pub fn batch_flush_interval(mut self, interval: Duration) -> Self {
        self.batch_flush_interval = interval;
        self
    }

    /// Build the storage layer and return handles.
    ///
    /// # Errors
    /// Fails if the database cannot be opened or the schema cannot be created.
    pub async fn build(self) -> Result<StorageHandles, StorageError> {
        if let Some(path) = self.url.strip_prefix("sqlite:")
            && !path.starts_with(':')
            && !path.starts_with("file:")
            && let Some(parent) = Path::new(path.split('?').next().unwrap_or(path)).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Internal(format!(
                    "Failed to create database directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let store = SqliteStore::connect(&self.url).await?;
        let (actor_handle, tx) = PointWriterActor::spawn(
            store.pool().clone(),
            self.channel_capacity,
            self.batch_size,
            self.batch_flush_interval,
        );

        tracing::info!(url = %self.url, "Storage opened");

        Ok(StorageHandles {
            store: Arc::new(store),
            writer: StorageWriter::new(tx),
            actor_handle: Some(actor_handle),
        })
    }
}

/// Handles to the storage layer.
pub struct StorageHandles {
    /// Monitor and host document store.
    pub store: Arc<SqliteStore>,
    /// Non-blocking point writer.
    pub writer: StorageWriter,
    /// Internal actor handle for graceful shutdown.
    actor_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for StorageHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageHandles")
            .field("writer", &self.writer)
            .finish_non_exhaustive()
    }
}

impl StorageHandles {
    /// Gracefully shutdown the storage layer.
    ///
    /// Flushes buffered points, waits for the writer to finish, then closes
    /// the pool.
    pub async fn shutdown(mut self) -> Result<(), StorageError> {
        if let Some(handle) = self.actor_handle.take() {
            // An already-stopped actor is fine; the join below still completes.
            let _ = self.writer.shutdown();
            handle
                .await
                .map_err(|e| StorageError::Internal(format!("Failed to join writer task: {e}")))?;
        }
        self.store.pool().close().await;
        Ok(())
    }
}

impl Drop for StorageHandles {
    fn drop(&mut self) {
        // Best effort: the actor flushes on Shutdown even if nobody awaits it.
        if self.actor_handle.take().is_some() {
            let _ = self.writer.shutdown();
        }
    }
}
