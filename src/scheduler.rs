//! Scheduler
//!
//! Scans all monitors on a fixed tick and dispatches each due monitor as an
//! independent task, at most one execution per monitor at a time.
//!
//! # Components
//!
//! - [`Scheduler`]: admin operations (monitor and host CRUD) and the scan loop
//! - [`SchedulerBuilder`]: wires store, sink, broadcaster and registries
//! - [`SchedulerHandle`]: completion handle of a spawned loop
//! - [`InFlight`]: per-monitor exclusion set with drop guards
//!
//! # Schedule rules
//!
//! For each monitor at tick time `now`, with `age = now - last_check` and
//! `wait = next_check - now`:
//!
//! - cold start (`age > 2 * interval` and `wait < -interval`): move
//!   `next_check` to `now` plus a random offset in `[0, interval)`, persist,
//!   do not run
//! - due (`wait < 0`): mark in flight and run
//!
//! After a run at `now`, `last_check = now` and `next_check = now + interval`,
//! even if the job failed.

mod builder;
mod dispatch;
mod error;
mod inflight;
mod instances;
mod runner;
mod service;
#[cfg(test)]
mod testing;

use std::time::Duration;

pub use builder::SchedulerBuilder;
pub use dispatch::{HOSTNAME_TAG, MONITOR_TAG, TickReport};
pub use error::{ExecutionError, SchedulerError};
pub use inflight::{InFlight, InFlightGuard};
pub use instances::AgentInstances;
pub use runner::SchedulerHandle;
pub use service::{Scheduler, SeedReport};

/// Default scan period.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Default bound on draining executions at shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Scan loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Scan period.
    pub tick: Duration,
    /// Cap on concurrent executions; `None` is unbounded.
    pub max_concurrent: Option<usize>,
    /// How long shutdown waits for outstanding executions.
    pub shutdown_timeout: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            max_concurrent: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}
