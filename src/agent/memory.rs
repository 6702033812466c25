//! Memory usage from `/proc/meminfo`.

use std::collections::HashMap;

use crate::model::Point;
use crate::transport::Transport;

use super::traits::{Agent, AgentDoc, AgentError, ConfigurableAgent, read_remote_file};

const PROC_MEMINFO: &str = "/proc/meminfo";

/// Parse `/proc/meminfo` into key → bytes. Lines with an unknown unit or a
/// malformed value are skipped.
pub fn parse_meminfo(text: &str) -> HashMap<String, u64> {
    let mut values = HashMap::new();
    for line in text.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let mut fields = rest.split_whitespace();
        let Some(Ok(value)) = fields.next().map(str::parse::<u64>) else {
            continue;
        };
        let bytes = match fields.next() {
            None => value,
            Some("kB") => value.saturating_mul(1024),
            Some(_) => continue,
        };
        values.insert(key.trim().to_string(), bytes);
    }
    values
}

/// Derived memory figures, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub used: u64,
    pub free: u64,
    pub shared: u64,
    pub buffers: u64,
    pub cached: u64,
    pub swap_used: u64,
    pub swap_free: u64,
}

impl MemoryStats {
    pub fn from_meminfo(info: &HashMap<String, u64>) -> Result<Self, AgentError> {
        let get = |key: &str| info.get(key).copied().unwrap_or(0);
        let total = info
            .get("MemTotal")
            .copied()
            .ok_or_else(|| AgentError::Parse(format!("MemTotal missing from {PROC_MEMINFO}")))?;

        Ok(Self {
            used: total
                .saturating_sub(get("MemFree"))
                .saturating_sub(get("Buffers"))
                .saturating_sub(get("Cached")),
            free: get("MemFree"),
            shared: get("Shmem"),
            buffers: get("Buffers"),
            cached: get("Cached"),
            swap_used: get("SwapTotal").saturating_sub(get("SwapFree")),
            swap_free: get("SwapFree"),
        })
    }

    pub fn points(&self) -> Vec<Point> {
        [
            ("mem.Used", self.used),
            ("mem.Free", self.free),
            ("mem.Shared", self.shared),
            ("mem.Buffers", self.buffers),
            ("mem.Cached", self.cached),
            ("swap.Used", self.swap_used),
            ("swap.Free", self.swap_free),
        ]
        .into_iter()
        .map(|(name, value)| Point::new(name, value as f64))
        .collect()
    }
}

/// Memory statistics agent (`memorystats`).
#[derive(Debug, Default)]
pub struct MemoryStatsAgent;

#[async_trait::async_trait]
impl Agent for MemoryStatsAgent {
    async fn gather(&mut self, transport: &dyn Transport) -> Result<Vec<Point>, AgentError> {
        let text = read_remote_file(transport, PROC_MEMINFO).await?;
        Ok(MemoryStats::from_meminfo(&parse_meminfo(&text))?.points())
    }

    fn doc(&self) -> AgentDoc {
        Self::describe()
    }
}

impl ConfigurableAgent for MemoryStatsAgent {
    const KEY: &'static str = "memorystats";

    fn describe() -> AgentDoc {
        AgentDoc::new("Memory and swap usage")
            .with_measurement("mem.Used", "Memory used", "b")
            .with_measurement("mem.Free", "Free memory", "b")
            .with_measurement("mem.Shared", "Memory shared among multiple processes", "b")
            .with_measurement("mem.Buffers", "Memory used for buffers", "b")
            .with_measurement("mem.Cached", "Memory used for cache", "b")
            .with_measurement("swap.Used", "Used swap", "b")
            .with_measurement("swap.Free", "Free swap", "b")
    }

    fn from_config(_config: &serde_json::Value) -> Result<Self, AgentError> {
        Ok(Self)
    }
}
