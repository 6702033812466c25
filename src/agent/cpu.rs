//! CPU statistics from `/proc/stat`.
//!
//! Counters (`intr`, `ctxt`, `processes`, per-core ticks) are turned into
//! per-second rates against the previous sample, so the first gather only
//! yields the two process gauges.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::model::{Point, round};
use crate::transport::Transport;

use super::traits::{Agent, AgentDoc, AgentError, ConfigurableAgent, read_remote_file};

const PROC_STAT: &str = "/proc/stat";

/// Per-core tick counters, in `/proc/stat` column order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoreTicks([f64; 10]);

const CORE_FIELDS: [&str; 10] = [
    "cpu.User",
    "cpu.Nice",
    "cpu.System",
    "cpu.Idle",
    "cpu.IoWait",
    "cpu.Irq",
    "cpu.SoftIrq",
    "cpu.Steal",
    "cpu.Guest",
    "cpu.GuestNice",
];

impl CoreTicks {
    /// Parse the numeric columns of a `cpu*` line. Older kernels report fewer
    /// columns; missing ones stay zero.
    fn parse(columns: &[&str]) -> Result<Self, AgentError> {
        let mut ticks = [0.0; 10];
        for (slot, raw) in ticks.iter_mut().zip(columns) {
            *slot = raw
                .parse()
                .map_err(|_| AgentError::Parse(format!("invalid cpu counter '{raw}'")))?;
        }
        Ok(Self(ticks))
    }
}

/// One parsed `/proc/stat` reading.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuSample {
    pub at: DateTime<Utc>,
    /// Core label ("all" for the aggregate line) → ticks.
    pub cores: BTreeMap<String, CoreTicks>,
    pub interrupts: f64,
    pub context_switches: f64,
    pub forks: f64,
    pub running: i64,
    pub blocked: i64,
}

fn number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AgentError> {
    raw.parse()
        .map_err(|_| AgentError::Parse(format!("invalid value '{raw}' for {key}")))
}

impl CpuSample {
    /// Parse `/proc/stat` contents sampled at `at`.
    pub fn parse(text: &str, at: DateTime<Utc>) -> Result<Self, AgentError> {
        let mut sample = Self {
            at,
            cores: BTreeMap::new(),
            interrupts: 0.0,
            context_switches: 0.0,
            forks: 0.0,
            running: 0,
            blocked: 0,
        };

        for line in text.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 {
                continue;
            }

            let key = fields[0];
            if let Some(core) = key.strip_prefix("cpu") {
                let label = if core.is_empty() { "all" } else { core };
                sample
                    .cores
                    .insert(label.to_string(), CoreTicks::parse(&fields[1..])?);
                continue;
            }

            match key {
                "intr" => sample.interrupts = number(key, fields[1])?,
                "ctxt" => sample.context_switches = number(key, fields[1])?,
                "processes" => sample.forks = number(key, fields[1])?,
                "procs_running" => sample.running = number(key, fields[1])?,
                "procs_blocked" => sample.blocked = number(key, fields[1])?,
                _ => {}
            }
        }

        if sample.cores.is_empty() {
            return Err(AgentError::Parse(format!("no cpu lines in {PROC_STAT}")));
        }
        Ok(sample)
    }

    /// Points for this sample, with rates against `previous` when given.
    pub fn points(&self, previous: Option<&CpuSample>) -> Vec<Point> {
        let mut points = vec![
            Point::new("misc.RunningProcesses", self.running as f64).at(self.at),
            Point::new("misc.BlockedProcesses", self.blocked as f64).at(self.at),
        ];

        let Some(previous) = previous else {
            return points;
        };
        let Ok(elapsed) = (self.at - previous.at).to_std() else {
            return points;
        };
        let elapsed = elapsed.as_secs_f64();
        if elapsed <= 0.0 {
            return points;
        }
        let rate = |now: f64, then: f64| round((now - then) / elapsed, 1);

        points.push(
            Point::new("misc.Interrupts", rate(self.interrupts, previous.interrupts)).at(self.at),
        );
        points.push(
            Point::new(
                "misc.ContextSwitches",
                rate(self.context_switches, previous.context_switches),
            )
            .at(self.at),
        );
        points.push(Point::new("misc.Forks", rate(self.forks, previous.forks)).at(self.at));

        for (core, ticks) in &self.cores {
            // Cores that appeared since the last sample have no baseline.
            let Some(before) = previous.cores.get(core) else {
                continue;
            };
            for (i, name) in CORE_FIELDS.iter().enumerate() {
                points.push(
                    Point::new(*name, rate(ticks.0[i], before.0[i]))
                        .with_tag("core", core.as_str())
                        .at(self.at),
                );
            }
        }

        points
    }
}

/// CPU statistics agent (`cpustats`).
#[derive(Debug, Default)]
pub struct CpuStatsAgent {
    previous: Option<CpuSample>,
}

#[async_trait::async_trait]
impl Agent for CpuStatsAgent {
    async fn gather(&mut self, transport: &dyn Transport) -> Result<Vec<Point>, AgentError> {
        let text = read_remote_file(transport, PROC_STAT).await?;
        let sample = CpuSample::parse(&text, Utc::now())?;
        let points = sample.points(self.previous.as_ref());
        self.previous = Some(sample);
        Ok(points)
    }

    fn doc(&self) -> AgentDoc {
        Self::describe()
    }
}

impl ConfigurableAgent for CpuStatsAgent {
    const KEY: &'static str = "cpustats";

    fn describe() -> AgentDoc {
        AgentDoc::new("CPU time, interrupts, context switches and process counts")
            .with_tag("core", "The cpu core ('all' for the aggregate)")
            .with_measurement("misc.Interrupts", "Number of interrupts per second", "/s")
            .with_measurement("misc.ContextSwitches", "Number of context switches per second", "/s")
            .with_measurement("misc.Forks", "Number of forks per second", "/s")
            .with_measurement("misc.RunningProcesses", "Currently running processes", "n")
            .with_measurement("misc.BlockedProcesses", "Processes currently blocked", "n")
            .with_measurement("cpu.User", "Time spent in user mode", "ticks/s")
            .with_measurement("cpu.Nice", "Time spent in user mode with low priority", "ticks/s")
            .with_measurement("cpu.System", "Time spent in kernel mode", "ticks/s")
            .with_measurement("cpu.Idle", "Time spent idle", "ticks/s")
            .with_measurement("cpu.IoWait", "Time spent waiting for IO", "ticks/s")
            .with_measurement("cpu.Irq", "Time spent processing interrupts", "ticks/s")
            .with_measurement("cpu.SoftIrq", "Time spent processing soft interrupts", "ticks/s")
            .with_measurement("cpu.Steal", "Time stolen by the hypervisor", "ticks/s")
            .with_measurement("cpu.Guest", "Time spent running guests", "ticks/s")
            .with_measurement("cpu.GuestNice", "Time spent running nice guests", "ticks/s")
    }

    fn from_config(_config: &serde_json::Value) -> Result<Self, AgentError> {
        Ok(Self::default())
    }
}
