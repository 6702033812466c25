//! Scheduler construction.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::agent::AgentRegistry;
use crate::broadcast::{Broadcaster, NoopBroadcaster};
use crate::sink::PointSink;
use crate::storage::Store;
use crate::transport::TransportRegistry;

use super::inflight::InFlight;
use super::instances::AgentInstances;
use super::service::Scheduler;
use super::{DEFAULT_TICK, SchedulerOptions};

/// Builder for [`Scheduler`].
///
/// Store and sink are required. The broadcaster defaults to
/// [`NoopBroadcaster`] and both registries to their built-ins.
pub struct SchedulerBuilder {
    store: Arc<dyn Store>,
    sink: Arc<dyn PointSink>,
    broadcaster: Arc<dyn Broadcaster>,
    agents: Option<AgentRegistry>,
    transports: Option<TransportRegistry>,
    options: SchedulerOptions,
}

impl SchedulerBuilder {
    pub fn new(store: Arc<dyn Store>, sink: Arc<dyn PointSink>) -> Self {
        Self {
            store,
            sink,
            broadcaster: Arc::new(NoopBroadcaster),
            agents: None,
            transports: None,
            options: SchedulerOptions::default(),
        }
    }

    pub fn broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    pub fn agents(mut self, registry: AgentRegistry) -> Self {
        self.agents = Some(registry);
        self
    }

    pub fn transports(mut self, registry: TransportRegistry) -> Self {
        self.transports = Some(registry);
        self
    }

    /// Set the scan period. A zero period falls back to the default.
    pub fn tick(mut self, tick: Duration) -> Self {
        self.options.tick = tick;
        self
    }

    /// Cap concurrent executions. Zero means unbounded.
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.options.max_concurrent = (max > 0).then_some(max);
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.options.shutdown_timeout = timeout;
        self
    }

    pub fn options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Arc<Scheduler> {
        let mut options = self.options;
        if options.tick.is_zero() {
            tracing::warn!(default = ?DEFAULT_TICK, "Zero tick period, using default");
            options.tick = DEFAULT_TICK;
        }
        if options.max_concurrent == Some(0) {
            options.max_concurrent = None;
        }

        let agents = self.agents.unwrap_or_else(AgentRegistry::with_builtins);
        let transports = self.transports.unwrap_or_else(TransportRegistry::with_builtins);

        tracing::debug!(
            agents = ?agents.keys(),
            transports = ?transports.keys(),
            tick = ?options.tick,
            max_concurrent = ?options.max_concurrent,
            "Scheduler built"
        );

        Arc::new(Scheduler {
            store: self.store,
            sink: self.sink,
            broadcaster: self.broadcaster,
            agents,
            transports,
            permits: options.max_concurrent.map(|n| Arc::new(Semaphore::new(n))),
            options,
            in_flight: InFlight::new(),
            instances: AgentInstances::new(),
            tasks: Mutex::new(JoinSet::new()),
            local_host_checked: AtomicBool::new(false),
        })
    }
}
