//! Admin operations: monitor and host CRUD.
//!
//! Every accepted monitor mutation is persisted first and then broadcast.
//! Rejected input touches neither the store nor the broadcaster.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::agent::AgentRegistry;
use crate::broadcast::{Broadcaster, MonitorEvent};
use crate::model::{Host, LOCAL_HOST_ID, Monitor, ObjectId};
use crate::sink::PointSink;
use crate::storage::Store;
use crate::transport::TransportRegistry;

use super::SchedulerOptions;
use super::error::SchedulerError;
use super::inflight::InFlight;
use super::instances::AgentInstances;

/// The monitoring scheduler.
///
/// Built by [`SchedulerBuilder`](super::SchedulerBuilder) and shared as
/// `Arc<Scheduler>`; dispatched executions hold their own reference.
pub struct Scheduler {
    pub(super) store: Arc<dyn Store>,
    pub(super) sink: Arc<dyn PointSink>,
    pub(super) broadcaster: Arc<dyn Broadcaster>,
    pub(super) agents: AgentRegistry,
    pub(super) transports: TransportRegistry,
    pub(super) options: SchedulerOptions,
    pub(super) in_flight: Arc<InFlight>,
    pub(super) permits: Option<Arc<Semaphore>>,
    pub(super) instances: AgentInstances,
    pub(super) tasks: Mutex<JoinSet<()>>,
    pub(super) local_host_checked: AtomicBool,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("options", &self.options)
            .field("agents", &self.agents)
            .field("transports", &self.transports)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

/// Outcome of [`Scheduler::seed_monitors`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Seeds inserted as new monitors.
    pub added: usize,
    /// Seeds skipped because an identical monitor already exists.
    pub existing: usize,
}

impl Scheduler {
    pub fn options(&self) -> SchedulerOptions {
        self.options
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn transports(&self) -> &TransportRegistry {
        &self.transports
    }

    /// Ids of monitors with an execution in progress.
    pub fn in_flight(&self) -> Vec<ObjectId> {
        self.in_flight.ids()
    }

    // ========================================================================
    // Monitors
    // ========================================================================

    pub async fn list_monitors(&self) -> Result<Vec<Monitor>, SchedulerError> {
        Ok(self.store.find_monitors().await?)
    }

    /// Fetch one monitor by its hex id.
    ///
    /// # Errors
    /// `InvalidIdentifier` for a malformed id, `NotFound` if absent.
    pub async fn get_monitor(&self, id: &str) -> Result<Monitor, SchedulerError> {
        let id = ObjectId::parse_str(id)?;
        self.store
            .find_monitor(id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(format!("monitor {id}")))
    }

    /// Insert a monitor under a freshly generated id and announce it.
    ///
    /// Any id on the input is replaced. Returns the stored monitor.
    pub async fn add_monitor(&self, mut monitor: Monitor) -> Result<Monitor, SchedulerError> {
        self.validate_monitor(&monitor)?;
        monitor.id = ObjectId::new();

        self.store.insert_monitor(&monitor).await?;
        tracing::info!(
            monitor = %monitor.id,
            agent = %monitor.job.agent_id,
            host = %monitor.host_id,
            interval = ?monitor.interval,
            "Monitor added"
        );
        self.broadcaster
            .broadcast(MonitorEvent::Added(monitor.clone()));
        Ok(monitor)
    }

    /// Replace a stored monitor and announce the change.
    ///
    /// # Errors
    /// `NotFound` if no monitor has this id.
    pub async fn update_monitor(&self, monitor: Monitor) -> Result<Monitor, SchedulerError> {
        self.validate_monitor(&monitor)?;
        self.store.update_monitor(&monitor).await?;
        tracing::debug!(monitor = %monitor.id, "Monitor updated");
        self.broadcaster
            .broadcast(MonitorEvent::Changed(monitor.clone()));
        Ok(monitor)
    }

    /// Remove a monitor by its hex id and announce the deletion.
    pub async fn delete_monitor(&self, id: &str) -> Result<(), SchedulerError> {
        let id = ObjectId::parse_str(id)?;
        if !self.store.remove_monitor(id).await? {
            return Err(SchedulerError::NotFound(format!("monitor {id}")));
        }

        self.instances.evict(id);
        tracing::info!(monitor = %id, "Monitor deleted");
        self.broadcaster.broadcast(MonitorEvent::Deleted(id));
        Ok(())
    }

    /// Insert seed monitors that have no identical counterpart yet.
    ///
    /// Two monitors are identical when host, interval and job all match.
    pub async fn seed_monitors(
        &self,
        seeds: impl IntoIterator<Item = Monitor>,
    ) -> Result<SeedReport, SchedulerError> {
        let mut known = self.store.find_monitors().await?;
        let mut report = SeedReport::default();

        for seed in seeds {
            let exists = known.iter().any(|m| {
                m.host_id == seed.host_id && m.interval == seed.interval && m.job == seed.job
            });
            if exists {
                report.existing += 1;
                continue;
            }
            known.push(self.add_monitor(seed).await?);
            report.added += 1;
        }

        if report.added > 0 {
            tracing::info!(added = report.added, existing = report.existing, "Seed monitors applied");
        }
        Ok(report)
    }

    fn validate_monitor(&self, monitor: &Monitor) -> Result<(), SchedulerError> {
        if monitor.interval.is_zero() {
            return Err(SchedulerError::InvalidMonitor(
                "interval must be greater than zero".to_string(),
            ));
        }
        if !self.agents.contains(&monitor.job.agent_id) {
            return Err(SchedulerError::InvalidMonitor(format!(
                "unknown agent: '{}'",
                monitor.job.agent_id
            )));
        }
        self.agents
            .build(&monitor.job)
            .map(drop)
            .map_err(|e| SchedulerError::InvalidMonitor(e.to_string()))
    }

    // ========================================================================
    // Hosts
    // ========================================================================

    pub async fn list_hosts(&self) -> Result<Vec<Host>, SchedulerError> {
        Ok(self.store.find_hosts().await?)
    }

    pub async fn get_host(&self, id: &str) -> Result<Host, SchedulerError> {
        let id = ObjectId::parse_str(id)?;
        self.store
            .find_host(id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(format!("host {id}")))
    }

    /// Insert a host. Non-local hosts get a freshly generated id.
    pub async fn add_host(&self, mut host: Host) -> Result<Host, SchedulerError> {
        self.validate_host(&host)?;
        if !host.is_local() {
            host.id = ObjectId::new();
        }

        self.store.insert_host(&host).await?;
        tracing::info!(host = %host.id, name = %host.name, transport = %host.transport_id, "Host added");
        Ok(host)
    }

    pub async fn update_host(&self, host: Host) -> Result<Host, SchedulerError> {
        self.validate_host(&host)?;
        self.store.update_host(&host).await?;
        tracing::debug!(host = %host.id, "Host updated");
        Ok(host)
    }

    /// Remove a host. Monitors bound to it fail until it is re-added.
    pub async fn delete_host(&self, id: &str) -> Result<(), SchedulerError> {
        let id = ObjectId::parse_str(id)?;
        if !self.store.remove_host(id).await? {
            return Err(SchedulerError::NotFound(format!("host {id}")));
        }
        tracing::info!(host = %id, "Host deleted");
        Ok(())
    }

    /// Make sure the reserved local host exists.
    ///
    /// A local transport that fails to resolve is logged, not returned.
    /// [`run`](Self::run) skips this once it has succeeded.
    pub async fn ensure_local_host(&self) -> Result<Host, SchedulerError> {
        let host = match self.store.find_host(LOCAL_HOST_ID).await? {
            Some(host) => host,
            None => {
                let host = Host::localhost();
                self.store.insert_host(&host).await?;
                tracing::info!(host = %host.id, "Local host created");
                host
            }
        };

        if let Err(e) = self.transports.resolve_host(&host) {
            tracing::error!(host = %host.id, transport = %host.transport_id, error = %e, "Local transport unavailable");
        }
        self.local_host_checked.store(true, Ordering::Release);
        Ok(host)
    }

    fn validate_host(&self, host: &Host) -> Result<(), SchedulerError> {
        if host.name.trim().is_empty() {
            return Err(SchedulerError::InvalidHost("name must not be empty".to_string()));
        }
        if !self.transports.contains(&host.transport_id) {
            return Err(SchedulerError::InvalidHost(format!(
                "unknown transport: '{}'",
                host.transport_id
            )));
        }
        self.transports
            .resolve_host(host)
            .map(drop)
            .map_err(|e| SchedulerError::InvalidHost(e.to_string()))
    }
}
