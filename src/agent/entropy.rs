//! Kernel entropy pool.

use crate::model::Point;
use crate::transport::Transport;

use super::traits::{Agent, AgentDoc, AgentError, ConfigurableAgent, read_remote_file};

const ENTROPY_AVAIL: &str = "/proc/sys/kernel/random/entropy_avail";

/// Entropy agent (`entropy`).
#[derive(Debug, Default)]
pub struct EntropyAgent;

#[async_trait::async_trait]
impl Agent for EntropyAgent {
    async fn gather(&mut self, transport: &dyn Transport) -> Result<Vec<Point>, AgentError> {
        let text = read_remote_file(transport, ENTROPY_AVAIL).await?;
        let raw = text.trim();
        let available: i64 = raw
            .parse()
            .map_err(|_| AgentError::Parse(format!("invalid entropy value '{raw}'")))?;
        Ok(vec![Point::new("misc.AvailableEntropy", available as f64)])
    }

    fn doc(&self) -> AgentDoc {
        Self::describe()
    }
}

impl ConfigurableAgent for EntropyAgent {
    const KEY: &'static str = "entropy";

    fn describe() -> AgentDoc {
        AgentDoc::new("Entropy available to the kernel random number generator").with_measurement(
            "misc.AvailableEntropy",
            "Available entropy in the kernel pool",
            "b",
        )
    }

    fn from_config(_config: &serde_json::Value) -> Result<Self, AgentError> {
        Ok(Self)
    }
}
