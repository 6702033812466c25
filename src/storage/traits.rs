//! Persistent store contract.

use strum_macros::{AsRefStr, Display};

use crate::model::{Host, Monitor, ObjectId};
use crate::storage::StorageError;

/// Document collections held by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Collection {
    Monitors,
    Hosts,
}

impl Collection {
    /// Singular noun for messages ("monitor abc… not found").
    pub fn singular(&self) -> &'static str {
        match self {
            Self::Monitors => "monitor",
            Self::Hosts => "host",
        }
    }

    pub(crate) fn not_found(&self, id: ObjectId) -> StorageError {
        StorageError::NotFound(format!("{} {}", self.singular(), id))
    }
}

/// Durable home of monitors and hosts.
///
/// Each operation is atomic per record. There are no multi-record
/// transactions; concurrent updates of the same record are last-write-wins.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// All monitors.
    async fn find_monitors(&self) -> Result<Vec<Monitor>, StorageError>;

    async fn find_monitor(&self, id: ObjectId) -> Result<Option<Monitor>, StorageError>;

    /// Insert a new monitor under its own id.
    async fn insert_monitor(&self, monitor: &Monitor) -> Result<(), StorageError>;

    /// Replace an existing monitor.
    ///
    /// # Errors
    /// `StorageError::NotFound` if no monitor has this id.
    async fn update_monitor(&self, monitor: &Monitor) -> Result<(), StorageError>;

    /// Remove a monitor, returning whether it existed.
    async fn remove_monitor(&self, id: ObjectId) -> Result<bool, StorageError>;

    /// All hosts.
    async fn find_hosts(&self) -> Result<Vec<Host>, StorageError>;

    async fn find_host(&self, id: ObjectId) -> Result<Option<Host>, StorageError>;

    async fn insert_host(&self, host: &Host) -> Result<(), StorageError>;

    /// Replace an existing host.
    ///
    /// # Errors
    /// `StorageError::NotFound` if no host has this id.
    async fn update_host(&self, host: &Host) -> Result<(), StorageError>;

    /// Remove a host, returning whether it existed.
    async fn remove_host(&self, id: ObjectId) -> Result<bool, StorageError>;
}
