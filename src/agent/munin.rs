//! Munin plugin runner.
//!
//! Runs an arbitrary command and reads munin-style `key.value number` lines
//! from its output.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::Point;
use crate::transport::Transport;

use super::traits::{Agent, AgentDoc, AgentError, ConfigurableAgent, parse_config};

fn value_line() -> &'static Regex {
    static VALUE_LINE: OnceLock<Regex> = OnceLock::new();
    VALUE_LINE.get_or_init(|| {
        Regex::new(r"^(.*)\.value ([0-9]+(\.[0-9]*)?)$").expect("failed to compile munin regex")
    })
}

/// Munin runner configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MuninConfig {
    /// Command to run.
    pub command: String,
    /// Whitespace-separated arguments.
    #[serde(default)]
    pub arguments: String,
    /// Prepended to every key as `prefix.key`.
    #[serde(default)]
    pub prefix: String,
}

/// Parse munin plugin output. Lines that are not `key.value number` are
/// ignored, as are values too large for an `f64`.
pub fn parse_values(text: &str, prefix: &str) -> Result<Vec<Point>, AgentError> {
    let mut points = Vec::new();
    for line in text.lines() {
        let Some(caps) = value_line().captures(line) else {
            continue;
        };
        let key = &caps[1];
        let value: f64 = caps[2]
            .parse()
            .map_err(|_| AgentError::Parse(format!("invalid munin value '{}'", &caps[2])))?;
        if !value.is_finite() {
            tracing::debug!(key = %key, "Munin value out of range, skipped");
            continue;
        }

        let name = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        };
        points.push(Point::new(name, value));
    }
    Ok(points)
}

/// Munin plugin runner agent (`muninpluginrunner`).
#[derive(Debug)]
pub struct MuninPluginRunner {
    config: MuninConfig,
}

impl MuninPluginRunner {
    pub fn new(config: MuninConfig) -> Result<Self, AgentError> {
        if config.command.trim().is_empty() {
            return Err(AgentError::Config("command cannot be empty".to_string()));
        }
        Ok(Self { config })
    }
}

#[async_trait::async_trait]
impl Agent for MuninPluginRunner {
    async fn gather(&mut self, transport: &dyn Transport) -> Result<Vec<Point>, AgentError> {
        let args: Vec<&str> = self.config.arguments.split_whitespace().collect();
        let output = transport.exec(&self.config.command, &args).await?;
        parse_values(&output.stdout_lossy(), &self.config.prefix)
    }

    fn doc(&self) -> AgentDoc {
        Self::describe()
    }
}

impl ConfigurableAgent for MuninPluginRunner {
    const KEY: &'static str = "muninpluginrunner";

    fn describe() -> AgentDoc {
        AgentDoc::new(
            "Runs a munin plugin and emits one measurement per 'key.value' line \
             (config: command, arguments, prefix)",
        )
    }

    fn from_config(config: &serde_json::Value) -> Result<Self, AgentError> {
        Self::new(parse_config(config)?)
    }
}
