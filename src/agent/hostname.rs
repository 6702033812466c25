//! Host identity probe.

use crate::model::Point;
use crate::transport::Transport;

use super::traits::{Agent, AgentDoc, AgentError, ConfigurableAgent, HostIdentity};

/// Hostname agent (`hostname`): asks the host for its own name.
#[derive(Debug, Default)]
pub struct HostnameAgent {
    hostname: Option<String>,
}

#[async_trait::async_trait]
impl Agent for HostnameAgent {
    async fn gather(&mut self, transport: &dyn Transport) -> Result<Vec<Point>, AgentError> {
        let output = transport.exec("hostname", &[]).await?;
        let name = output.stdout_lossy().trim().to_string();
        if name.is_empty() {
            return Err(AgentError::Parse("empty hostname".to_string()));
        }

        let point = Point::new("host.Identity", 1.0).with_tag("hostname", name.as_str());
        self.hostname = Some(name);
        Ok(vec![point])
    }

    fn doc(&self) -> AgentDoc {
        Self::describe()
    }

    fn host_identity(&self) -> Option<&dyn HostIdentity> {
        Some(self)
    }
}

impl HostIdentity for HostnameAgent {
    fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }
}

impl ConfigurableAgent for HostnameAgent {
    const KEY: &'static str = "hostname";

    fn describe() -> AgentDoc {
        AgentDoc::new("Reports the name the host gives itself")
            .with_tag("hostname", "Name reported by the host")
            .with_measurement("host.Identity", "Always 1", "n")
    }

    fn from_config(_config: &serde_json::Value) -> Result<Self, AgentError> {
        Ok(Self::default())
    }
}
