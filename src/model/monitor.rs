//! Monitors: scheduled recurring checks binding a job to a host.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::id::ObjectId;
use super::point::Point;

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// Agent selection plus its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Agent registry key (e.g., "cpustats").
    #[serde(rename = "agent")]
    pub agent_id: String,
    /// Agent-specific configuration.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl Job {
    /// Create a job for the given agent.
    pub fn new(agent_id: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            agent_id: agent_id.into(),
            config,
        }
    }

    /// Identity of the agent instance this job produces.
    ///
    /// Two jobs with the same fingerprint can share a long-lived agent.
    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.agent_id, self.config)
    }
}

/// What the scheduler should do with a monitor at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Next check lies in the future.
    NotDue,
    /// Overdue: run it now.
    Due,
    /// Never meaningfully checked and far overdue: reschedule with jitter
    /// instead of running.
    ColdStart,
}

/// A persisted, scheduled recurring check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: ObjectId,
    pub host_id: ObjectId,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub job: Job,
    #[serde(default = "epoch")]
    pub last_check: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub next_check: DateTime<Utc>,
    #[serde(default, rename = "last_result")]
    pub last_points: Vec<Point>,
}

impl Monitor {
    /// Create a never-checked monitor.
    ///
    /// The identifier is provisional; adding the monitor through the
    /// scheduler assigns a new one.
    pub fn new(host_id: ObjectId, interval: Duration, job: Job) -> Self {
        Self {
            id: ObjectId::new(),
            host_id,
            interval,
            job,
            last_check: epoch(),
            next_check: epoch(),
            last_points: Vec::new(),
        }
    }

    /// Interval as a signed chrono delta, saturating on overflow.
    pub fn interval_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.interval).unwrap_or(TimeDelta::MAX)
    }

    /// Time elapsed since the last check (positive: past).
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.last_check
    }

    /// Time until the next check (positive: future).
    pub fn wait(&self, now: DateTime<Utc>) -> TimeDelta {
        self.next_check - now
    }

    /// Decide what to do with this monitor at `now`.
    ///
    /// A monitor older than twice its interval that is also overdue by more
    /// than a full interval is treated as a cold start, whether it is brand
    /// new or has simply not run for a long time.
    pub fn readiness(&self, now: DateTime<Utc>) -> Readiness {
        let interval = self.interval_delta();
        let twice = interval.checked_mul(2).unwrap_or(TimeDelta::MAX);

        let wait = self.wait(now);
        if self.age(now) > twice && wait < -interval {
            Readiness::ColdStart
        } else if wait < TimeDelta::zero() {
            Readiness::Due
        } else {
            Readiness::NotDue
        }
    }

    /// Push the next check to `now + offset`.
    pub fn defer_first_check(&mut self, now: DateTime<Utc>, offset: Duration) {
        let offset = TimeDelta::from_std(offset).unwrap_or(TimeDelta::MAX);
        self.next_check = now.checked_add_signed(offset).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Record a completed check at `at`.
    ///
    /// Sets `last_check = at` and `next_check = at + interval` whether or not
    /// the job produced any points.
    pub fn record_check(&mut self, at: DateTime<Utc>, points: Vec<Point>) {
        self.last_check = at;
        self.next_check = at
            .checked_add_signed(self.interval_delta())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.last_points = points;
    }
}
