//! In-flight bookkeeping.
//!
//! A monitor id is in the set from the moment it is dispatched until its
//! execution ends. The marker is held by an [`InFlightGuard`] and cleared on
//! drop, including when the execution panics.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::model::ObjectId;

/// Set of monitor ids with an execution in progress.
#[derive(Debug, Default)]
pub struct InFlight {
    ids: RwLock<HashSet<ObjectId>>,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Atomically mark `id` as in flight.
    ///
    /// Returns `None` if it already was.
    pub fn try_acquire(self: &Arc<Self>, id: ObjectId) -> Option<InFlightGuard> {
        let inserted = self
            .ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);

        inserted.then(|| InFlightGuard {
            set: Arc::clone(self),
            id,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the ids currently in flight.
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self
            .ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    fn release(&self, id: ObjectId) {
        self.ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Clears the in-flight marker when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    set: Arc<InFlight>,
    id: ObjectId,
}

impl InFlightGuard {
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.release(self.id);
    }
}
