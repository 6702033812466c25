//! vigil - Monitoring Agent Library
//!
//! This crate provides the core of the vigil monitoring agent: a durable
//! scheduler that runs metric-gathering jobs against local and remote hosts
//! on fixed intervals. It can be embedded as a library or run as the `vigil`
//! binary.
//!
//! # Architecture
//!
//! - **Scheduler**: tick-driven scan, per-monitor exclusion, bounded dispatch
//! - **Agents**: long-lived gatherers (`cpustats`, `memorystats`, `entropy`,
//!   `muninpluginrunner`, `hostname`)
//! - **Transports**: command execution on the target (`localtransport`, `ssh`)
//! - **Storage**: SQLite (sqlx) or in-memory monitor/host store plus a
//!   batching point writer
//! - **Sinks**: local point table or InfluxDB line protocol
//! - **Broadcast**: monitor lifecycle events
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil::{SchedulerBuilder, StorageBuilder};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = StorageBuilder::new("sqlite:data/vigil.db").build().await?;
//! let scheduler = SchedulerBuilder::new(storage.store.clone(), Arc::new(storage.writer.clone()))
//!     .build();
//!
//! let handle = scheduler.spawn();
//! // ...
//! handle.shutdown().await?;
//! storage.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod broadcast;
pub mod config;
pub mod model;
pub mod scheduler;
pub mod sink;
pub mod storage;
pub mod transport;

pub use agent::{Agent, AgentDoc, AgentError, AgentRegistry, ConfigurableAgent, HostIdentity};
pub use broadcast::{Broadcaster, ChannelBroadcaster, MonitorEvent, NoopBroadcaster};
pub use config::{AppConfig, ConfigError};
pub use model::{Host, Job, LOCAL_HOST_ID, Monitor, ObjectId, Point};
pub use scheduler::{Scheduler, SchedulerBuilder, SchedulerError, SchedulerHandle, TickReport};
pub use sink::{InfluxSink, PointSink, SinkError};
pub use storage::{
    MemoryStore, SqliteStore, StorageBuilder, StorageError, StorageHandles, StorageWriter, Store,
};
pub use transport::{ExecOutput, Transport, TransportError, TransportRegistry};
