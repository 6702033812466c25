//! Storage Layer
//!
//! Durable home of monitors and hosts, plus the local point table:
//! - **Store**: per-record document CRUD behind the [`Store`] trait
//! - **Writer**: async task with exclusive point appends via tokio mpsc
//!
//! # Components
//!
//! - [`Store`]: monitor/host persistence contract
//! - [`SqliteStore`]: sqlx SQLite documents (JSON text keyed by hex id)
//! - [`MemoryStore`]: in-process store for tests and ephemeral runs
//! - [`StorageWriter`]: non-blocking, batching point sink
//! - [`StorageBuilder`] / [`StorageHandles`]: initialization and lifecycle management

mod actor;
mod builder;
pub mod db;
mod document_store;
mod error;
mod memory_store;
mod schema;
mod traits;
mod writer;

pub use actor::{DEFAULT_BATCH_FLUSH_INTERVAL, DEFAULT_BATCH_SIZE};
pub use builder::{DEFAULT_CHANNEL_CAPACITY, StorageBuilder, StorageHandles};
pub use document_store::SqliteStore;
pub use error::StorageError;
pub use memory_store::MemoryStore;
pub use traits::{Collection, Store};
pub use writer::StorageWriter;
