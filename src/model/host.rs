//! Target hosts.

use serde::{Deserialize, Serialize};

use super::id::{LOCAL_HOST_ID, ObjectId};

/// Registry key of the local execution transport.
pub const LOCAL_TRANSPORT_ID: &str = "localtransport";

/// Display name of the implicit local host.
pub const LOCAL_HOST_NAME: &str = "localhost";

/// A target system reachable through a transport.
///
/// The transport itself is resolved from the transport registry using
/// `transport_id` and `transport_config`; it is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub id: ObjectId,
    pub name: String,
    pub transport_id: String,
    #[serde(default)]
    pub transport_config: serde_json::Value,
}

impl Host {
    /// Create a host with a fresh identifier and no transport configuration.
    pub fn new(name: impl Into<String>, transport_id: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            transport_id: transport_id.into(),
            transport_config: serde_json::Value::Null,
        }
    }

    /// The reserved local host.
    pub fn localhost() -> Self {
        Self {
            id: LOCAL_HOST_ID,
            name: LOCAL_HOST_NAME.to_string(),
            transport_id: LOCAL_TRANSPORT_ID.to_string(),
            transport_config: serde_json::Value::Null,
        }
    }

    /// Set the transport configuration.
    pub fn with_transport_config(mut self, config: serde_json::Value) -> Self {
        self.transport_config = config;
        self
    }

    /// Whether this is the reserved local host.
    pub fn is_local(&self) -> bool {
        self.id == LOCAL_HOST_ID
    }
}
