//! Scan and dispatch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::OwnedSemaphorePermit;

use crate::agent::Agent;
use crate::broadcast::MonitorEvent;
use crate::model::{Monitor, Point, Readiness};
use crate::storage::StorageError;

use super::error::{ExecutionError, SchedulerError};
use super::inflight::InFlightGuard;
use super::service::Scheduler;

/// Tag naming the monitor that produced a point.
pub const MONITOR_TAG: &str = "monitor";

/// Tag naming the host a point was gathered from.
pub const HOSTNAME_TAG: &str = "hostname";

/// What one scan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Monitors in the snapshot.
    pub scanned: usize,
    /// Executions started.
    pub dispatched: usize,
    /// Cold starts rescheduled with jitter.
    pub deferred: usize,
    /// Skipped because an execution was already running.
    pub in_flight: usize,
    /// Due but left for a later tick because the concurrency cap was reached.
    pub throttled: usize,
}

/// Uniform offset in `[0, interval)`.
fn jitter(interval: Duration) -> Duration {
    let nanos = u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
}

impl Scheduler {
    /// Run one scan at `now`.
    ///
    /// # Errors
    /// Only a failed monitor fetch is returned; the scan is then skipped
    /// entirely. Per-monitor failures are logged.
    pub async fn tick(self: &Arc<Self>, now: DateTime<Utc>) -> Result<TickReport, SchedulerError> {
        self.reap().await;

        let monitors = self.store.find_monitors().await?;
        let mut report = TickReport {
            scanned: monitors.len(),
            ..TickReport::default()
        };

        for mut monitor in monitors {
            if self.in_flight.contains(monitor.id) {
                report.in_flight += 1;
                continue;
            }

            match monitor.readiness(now) {
                Readiness::NotDue => {}
                Readiness::ColdStart => {
                    monitor.defer_first_check(now, jitter(monitor.interval));
                    tracing::debug!(monitor = %monitor.id, next_check = %monitor.next_check, "Cold start, first check deferred");
                    self.persist(&monitor).await;
                    report.deferred += 1;
                }
                Readiness::Due => {
                    let permit = match &self.permits {
                        Some(permits) => match Arc::clone(permits).try_acquire_owned() {
                            Ok(permit) => Some(permit),
                            Err(_) => {
                                report.throttled += 1;
                                continue;
                            }
                        },
                        None => None,
                    };
                    let Some(guard) = self.in_flight.try_acquire(monitor.id) else {
                        report.in_flight += 1;
                        continue;
                    };

                    let this = Arc::clone(self);
                    self.tasks
                        .lock()
                        .await
                        .spawn(this.execute(monitor, now, guard, permit));
                    report.dispatched += 1;
                }
            }
        }

        if report.throttled > 0 {
            tracing::debug!(throttled = report.throttled, "Concurrency cap reached");
        }
        Ok(report)
    }

    /// Collect finished executions without waiting.
    async fn reap(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result
                && e.is_panic()
            {
                tracing::error!(error = %e, "Monitor execution panicked");
            }
        }
    }

    /// Update the stored monitor and announce the change. Failures are logged.
    async fn persist(&self, monitor: &Monitor) -> bool {
        match self.store.update_monitor(monitor).await {
            Ok(()) => {
                self.broadcaster
                    .broadcast(MonitorEvent::Changed(monitor.clone()));
                true
            }
            Err(StorageError::NotFound(_)) => {
                tracing::debug!(monitor = %monitor.id, "Monitor deleted while scheduled, result discarded");
                false
            }
            Err(e) => {
                tracing::error!(monitor = %monitor.id, error = %e, "Failed to persist monitor");
                true
            }
        }
    }

    /// One execution of a due monitor at tick time `at`.
    ///
    /// The guard and permit are released when this returns or unwinds.
    async fn execute(
        self: Arc<Self>,
        mut monitor: Monitor,
        at: DateTime<Utc>,
        _guard: InFlightGuard,
        _permit: Option<OwnedSemaphorePermit>,
    ) {
        let fingerprint = monitor.job.fingerprint();
        let started = Instant::now();

        let (agent, outcome) = self.run_job(&monitor).await;
        let points = match outcome {
            Ok(points) => {
                tracing::debug!(
                    monitor = %monitor.id,
                    agent = %monitor.job.agent_id,
                    points = points.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Check completed"
                );
                points
            }
            Err(e) => {
                tracing::warn!(
                    monitor = %monitor.id,
                    agent = %monitor.job.agent_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Check failed"
                );
                Vec::new()
            }
        };

        monitor.record_check(at, points.clone());
        let still_exists = self.persist(&monitor).await;
        if still_exists && let Some(agent) = agent {
            self.instances.checkin(monitor.id, fingerprint, agent);
        }

        if !points.is_empty()
            && let Err(e) = self.sink.write_points(&points).await
        {
            tracing::warn!(monitor = %monitor.id, points = points.len(), error = %e, "Failed to write points");
        }
    }

    /// Check out the agent and gather. The agent is handed back for reuse
    /// whenever it could be built.
    async fn run_job(
        &self,
        monitor: &Monitor,
    ) -> (Option<Box<dyn Agent>>, Result<Vec<Point>, ExecutionError>) {
        let mut agent = match self.instances.checkout(monitor, &self.agents) {
            Ok(agent) => agent,
            Err(e) => return (None, Err(e.into())),
        };
        let result = self.gather(agent.as_mut(), monitor).await;
        (Some(agent), result)
    }

    async fn gather(
        &self,
        agent: &mut dyn Agent,
        monitor: &Monitor,
    ) -> Result<Vec<Point>, ExecutionError> {
        let host = self
            .store
            .find_host(monitor.host_id)
            .await?
            .ok_or(ExecutionError::HostNotFound(monitor.host_id))?;
        let transport = self.transports.resolve_host(&host)?;

        let mut points = agent.gather(transport.as_ref()).await?;
        let gathered = points.len();
        points.retain(|p| p.value.is_finite());
        if points.len() < gathered {
            tracing::warn!(
                monitor = %monitor.id,
                agent = %monitor.job.agent_id,
                dropped = gathered - points.len(),
                "Non-finite point values dropped"
            );
        }

        let hostname = agent
            .host_identity()
            .and_then(|identity| identity.hostname())
            .unwrap_or(host.name.as_str());
        let monitor_id = monitor.id.to_hex();
        for point in &mut points {
            point.tag_if_absent(MONITOR_TAG, &monitor_id);
            point.tag_if_absent(HOSTNAME_TAG, hostname);
        }
        Ok(points)
    }
}
