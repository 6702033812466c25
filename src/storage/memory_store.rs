//! In-process store for tests and ephemeral runs.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use crate::model::{Host, Monitor, ObjectId};
use crate::storage::StorageError;
use crate::storage::traits::{Collection, Store};

/// [`Store`] held entirely in memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    monitors: RwLock<BTreeMap<ObjectId, Monitor>>,
    hosts: RwLock<BTreeMap<ObjectId, Host>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn insert<T: Clone>(
    map: &mut BTreeMap<ObjectId, T>,
    collection: Collection,
    id: ObjectId,
    value: &T,
) -> Result<(), StorageError> {
    if map.contains_key(&id) {
        return Err(StorageError::InvalidData(format!(
            "duplicate {} {}",
            collection.singular(),
            id
        )));
    }
    map.insert(id, value.clone());
    Ok(())
}

fn update<T: Clone>(
    map: &mut BTreeMap<ObjectId, T>,
    collection: Collection,
    id: ObjectId,
    value: &T,
) -> Result<(), StorageError> {
    let slot = map.get_mut(&id).ok_or_else(|| collection.not_found(id))?;
    *slot = value.clone();
    Ok(())
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn find_monitors(&self) -> Result<Vec<Monitor>, StorageError> {
        Ok(self.monitors.read().await.values().cloned().collect())
    }

    async fn find_monitor(&self, id: ObjectId) -> Result<Option<Monitor>, StorageError> {
        Ok(self.monitors.read().await.get(&id).cloned())
    }

    async fn insert_monitor(&self, monitor: &Monitor) -> Result<(), StorageError> {
        let mut monitors = self.monitors.write().await;
        insert(&mut monitors, Collection::Monitors, monitor.id, monitor)
    }

    async fn update_monitor(&self, monitor: &Monitor) -> Result<(), StorageError> {
        let mut monitors = self.monitors.write().await;
        update(&mut monitors, Collection::Monitors, monitor.id, monitor)
    }

    async fn remove_monitor(&self, id: ObjectId) -> Result<bool, StorageError> {
        Ok(self.monitors.write().await.remove(&id).is_some())
    }

    async fn find_hosts(&self) -> Result<Vec<Host>, StorageError> {
        Ok(self.hosts.read().await.values().cloned().collect())
    }

    async fn find_host(&self, id: ObjectId) -> Result<Option<Host>, StorageError> {
        Ok(self.hosts.read().await.get(&id).cloned())
    }

    async fn insert_host(&self, host: &Host) -> Result<(), StorageError> {
        let mut hosts = self.hosts.write().await;
        insert(&mut hosts, Collection::Hosts, host.id, host)
    }

    async fn update_host(&self, host: &Host) -> Result<(), StorageError> {
        let mut hosts = self.hosts.write().await;
        update(&mut hosts, Collection::Hosts, host.id, host)
    }

    async fn remove_host(&self, id: ObjectId) -> Result<bool, StorageError> {
        Ok(self.hosts.write().await.remove(&id).is_some())
    }
}
