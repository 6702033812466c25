//! Seed monitors declared in the configuration file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{Job, LOCAL_HOST_ID, Monitor, ObjectId};

fn local_host() -> ObjectId {
    LOCAL_HOST_ID
}

/// A monitor to create at startup unless an identical one exists.
///
/// ```yaml
/// monitors:
///   - agent: cpustats
///     interval: 10s
///   - agent: muninpluginrunner
///     interval: 1m
///     config: { command: /usr/share/munin/plugins/load, prefix: munin.load }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSeed {
    /// Target host id (default: the local host).
    #[serde(default = "local_host")]
    pub host: ObjectId,

    /// Agent registry key.
    pub agent: String,

    /// Check interval.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Agent configuration.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl MonitorSeed {
    pub fn to_monitor(&self) -> Monitor {
        Monitor::new(
            self.host,
            self.interval,
            Job::new(self.agent.clone(), self.config.clone()),
        )
    }
}
