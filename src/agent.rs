//! Agent Layer
//!
//! Metric-gathering logic. Each agent runs against a [`Transport`] and
//! produces [`Point`]s; instances are long-lived so counter-based agents can
//! report rates.
//!
//! # Built-in agents
//!
//! | key | source |
//! |---|---|
//! | `cpustats` | `/proc/stat` |
//! | `memorystats` | `/proc/meminfo` |
//! | `entropy` | `/proc/sys/kernel/random/entropy_avail` |
//! | `muninpluginrunner` | any munin-style command |
//! | `hostname` | `hostname` |
//!
//! [`Transport`]: crate::transport::Transport
//! [`Point`]: crate::model::Point

mod cpu;
mod entropy;
mod hostname;
mod memory;
mod munin;
mod registry;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use cpu::{CpuSample, CpuStatsAgent};
pub use entropy::EntropyAgent;
pub use hostname::HostnameAgent;
pub use memory::{MemoryStats, MemoryStatsAgent, parse_meminfo};
pub use munin::{MuninConfig, MuninPluginRunner, parse_values};
pub use registry::{AgentFactory, AgentRegistry};
pub use traits::{Agent, AgentDoc, AgentError, ConfigurableAgent, HostIdentity, MeasurementDoc};
