//! Core agent traits and types.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::model::Point;
use crate::transport::{Transport, TransportError};

/// Errors that can occur while gathering.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Command execution on the host failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Command output could not be understood.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid or unknown agent configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Local I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Documentation of one measurement an agent emits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementDoc {
    pub name: String,
    pub description: String,
    pub unit: String,
}

/// Self-description of an agent, printed by `--list-agents`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentDoc {
    pub description: String,
    /// Tag name → meaning.
    pub tags: BTreeMap<String, String>,
    pub measurements: Vec<MeasurementDoc>,
}

impl AgentDoc {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>, description: impl Into<String>) -> Self {
        self.tags.insert(tag.into(), description.into());
        self
    }

    pub fn with_measurement(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        self.measurements.push(MeasurementDoc {
            name: name.into(),
            description: description.into(),
            unit: unit.into(),
        });
        self
    }
}

impl std::fmt::Display for AgentDoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  {}", self.description)?;
        for (tag, description) in &self.tags {
            writeln!(f, "  tag {tag}: {description}")?;
        }
        for m in &self.measurements {
            writeln!(f, "  {:<24} {} ({})", m.name, m.description, m.unit)?;
        }
        Ok(())
    }
}

/// Typed access to the name a host reports for itself.
pub trait HostIdentity {
    fn hostname(&self) -> Option<&str>;
}

/// A unit of metric-gathering logic.
///
/// Instances are long-lived: the scheduler keeps one per monitor and calls
/// `gather` with exclusive access, so counter-based agents can compute rates
/// from the previous sample.
///
/// # Error Handling
///
/// Any failure to produce points is returned as [`AgentError`]. The
/// scheduler logs it and still advances the monitor's schedule.
#[async_trait::async_trait]
pub trait Agent: Send + Sync {
    /// Perform one gathering cycle against `transport`.
    async fn gather(&mut self, transport: &dyn Transport) -> Result<Vec<Point>, AgentError>;

    /// Describe the measurements this agent emits.
    fn doc(&self) -> AgentDoc;

    /// Host identity learned while gathering, if this agent probes for one.
    fn host_identity(&self) -> Option<&dyn HostIdentity> {
        None
    }
}

/// An agent that can be built from a job's JSON configuration.
pub trait ConfigurableAgent: Agent + Sized + 'static {
    /// Registry key.
    const KEY: &'static str;

    /// Documentation, available without an instance.
    fn describe() -> AgentDoc;

    /// Build an instance from configuration (`null` for defaults).
    fn from_config(config: &serde_json::Value) -> Result<Self, AgentError>;
}

/// Deserialize an agent configuration, using the default for `null`.
pub(crate) fn parse_config<T>(value: &serde_json::Value) -> Result<T, AgentError>
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone()).map_err(|e| AgentError::Config(e.to_string()))
}

/// Read a file on the target host.
pub(crate) async fn read_remote_file(
    transport: &dyn Transport,
    path: &str,
) -> Result<String, AgentError> {
    let output = transport.exec("cat", &[path]).await?;
    Ok(output.stdout_lossy().into_owned())
}
