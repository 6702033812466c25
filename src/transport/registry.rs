//! Transport registry: maps a host's transport key to a constructor.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Host, LOCAL_TRANSPORT_ID};

use super::local::LocalTransport;
use super::ssh::SshTransport;
use super::traits::{Transport, TransportError};

/// Constructor taking the host's transport configuration.
pub type TransportFactory =
    Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn Transport>, TransportError> + Send + Sync>;

/// Registry of transport constructors, populated at composition time.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    factories: HashMap<String, TransportFactory>,
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with `localtransport` and `ssh` registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(LOCAL_TRANSPORT_ID, |config| {
            Ok(Arc::new(LocalTransport::from_value(config)?) as Arc<dyn Transport>)
        });
        registry.register("ssh", |config| {
            Ok(Arc::new(SshTransport::from_value(config)?) as Arc<dyn Transport>)
        });
        registry
    }

    /// Register a constructor, replacing any previous one under `key`.
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> Result<Arc<dyn Transport>, TransportError>
            + Send
            + Sync
            + 'static,
    {
        let key = key.into();
        if self.factories.insert(key.clone(), Arc::new(factory)).is_some() {
            tracing::warn!(transport = %key, "Transport constructor replaced");
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Build a transport for `key` with the given configuration.
    ///
    /// # Errors
    /// `TransportError::Unknown` if nothing is registered under `key`, or the
    /// constructor's own error.
    pub fn resolve(
        &self,
        key: &str,
        config: &serde_json::Value,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| TransportError::Unknown(key.to_string()))?;
        factory(config)
    }

    /// Build the transport for a host.
    pub fn resolve_host(&self, host: &Host) -> Result<Arc<dyn Transport>, TransportError> {
        self.resolve(&host.transport_id, &host.transport_config)
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
