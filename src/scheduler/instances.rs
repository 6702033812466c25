//! Long-lived agent instances, one per monitor.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::agent::{Agent, AgentError, AgentRegistry};
use crate::model::{Monitor, ObjectId};

/// Agent instances keyed by monitor id, each tagged with the fingerprint of
/// the job that built it.
///
/// An instance is checked out for the duration of one execution. The
/// in-flight rule guarantees at most one checkout per monitor at a time.
#[derive(Default)]
pub struct AgentInstances {
    slots: Mutex<HashMap<ObjectId, (String, Box<dyn Agent>)>>,
}

impl AgentInstances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the cached instance for `monitor`, or build a new one if none is
    /// cached or the job changed since it was built.
    pub fn checkout(
        &self,
        monitor: &Monitor,
        registry: &AgentRegistry,
    ) -> Result<Box<dyn Agent>, AgentError> {
        let fingerprint = monitor.job.fingerprint();
        let cached = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&monitor.id);

        match cached {
            Some((cached_fingerprint, agent)) if cached_fingerprint == fingerprint => Ok(agent),
            Some(_) => {
                tracing::debug!(monitor = %monitor.id, agent = %monitor.job.agent_id, "Job changed, rebuilding agent");
                registry.build(&monitor.job)
            }
            None => registry.build(&monitor.job),
        }
    }

    /// Return an instance after an execution.
    pub fn checkin(&self, id: ObjectId, fingerprint: String, agent: Box<dyn Agent>) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (fingerprint, agent));
    }

    /// Drop the instance of a deleted monitor.
    pub fn evict(&self, id: ObjectId) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for AgentInstances {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentInstances")
            .field("len", &self.len())
            .finish()
    }
}
