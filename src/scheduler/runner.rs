//! Scan loop lifecycle: run, drain, spawn.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval, timeout};

use super::service::Scheduler;

/// Completion handle of a loop started with [`Scheduler::spawn`].
///
/// Dropping the handle also stops the loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop scanning, drain outstanding executions and wait for the loop.
    pub async fn shutdown(mut self) -> Result<(), JoinError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        (&mut self.handle).await
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

fn join_outcome(result: Result<(), JoinError>) {
    if let Err(e) = result
        && e.is_panic()
    {
        tracing::error!(error = %e, "Monitor execution panicked");
    }
}

impl Scheduler {
    /// Scan on every tick until `shutdown` resolves, then drain.
    ///
    /// Ensures the local host first unless that already happened.
    ///
    /// Never returns early on per-monitor or store errors.
    pub async fn run<F>(self: &Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        if self.local_host_checked.load(Ordering::Acquire) {
            tracing::debug!("Local host already checked");
        } else if let Err(e) = self.ensure_local_host().await {
            tracing::error!(error = %e, "Failed to ensure local host");
        }

        let mut ticker = interval(self.options.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(
            tick = ?self.options.tick,
            max_concurrent = ?self.options.max_concurrent,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => match self.tick(Utc::now()).await {
                    Ok(report) if report.dispatched > 0 || report.deferred > 0 => {
                        tracing::trace!(?report, "Tick");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Failed to fetch monitors, tick skipped"),
                },
            }
        }

        tracing::info!(in_flight = self.in_flight.len(), "Scheduler stopping");
        let detached = self.drain().await;
        tracing::info!(detached, "Scheduler stopped");
    }

    /// Wait up to `shutdown_timeout` for outstanding executions.
    ///
    /// Returns how many were still running and got detached. Detached
    /// executions keep running to completion.
    pub async fn drain(&self) -> usize {
        let mut tasks = std::mem::take(&mut *self.tasks.lock().await);
        if tasks.is_empty() {
            return 0;
        }

        let deadline = self.options.shutdown_timeout;
        let drained = timeout(deadline, async {
            while let Some(result) = tasks.join_next().await {
                join_outcome(result);
            }
        })
        .await;

        if drained.is_ok() {
            return 0;
        }
        let detached = tasks.len();
        tracing::warn!(detached, timeout = ?deadline, "Executions still running at shutdown, detaching");
        tasks.detach_all();
        detached
    }

    /// Wait until every dispatched execution has finished.
    pub async fn wait_idle(&self) {
        loop {
            let mut tasks: JoinSet<()> = std::mem::take(&mut *self.tasks.lock().await);
            if tasks.is_empty() {
                return;
            }
            while let Some(result) = tasks.join_next().await {
                join_outcome(result);
            }
        }
    }

    /// Run the loop on a new task.
    pub fn spawn(self: &Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.run(async {
                let _ = shutdown_rx.await;
            })
            .await;
        });

        SchedulerHandle {
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }
}
