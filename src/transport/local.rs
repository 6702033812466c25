//! Local command execution.

use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::traits::{ExecOutput, Transport, TransportError, finish, parse_config};

/// Default per-command timeout (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// Local transport configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Kill the command if it runs longer than this.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Runs commands as child processes of the agent.
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    config: LocalConfig,
}

impl LocalTransport {
    pub fn new(config: LocalConfig) -> Self {
        Self { config }
    }

    /// Build from a host's transport configuration (`null` means defaults).
    pub fn from_value(value: &serde_json::Value) -> Result<Self, TransportError> {
        let config: LocalConfig = parse_config(value)?;
        if config.timeout.is_zero() {
            return Err(TransportError::Config("timeout must be > 0".to_string()));
        }
        Ok(Self::new(config))
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    fn name(&self) -> &str {
        "localtransport"
    }

    async fn exec(&self, command: &str, args: &[&str]) -> Result<ExecOutput, TransportError> {
        let mut cmd = Command::new(command);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);

        tracing::trace!(command, ?args, "Executing local command");

        // Dropping the output future on timeout kills the child.
        let output = tokio::time::timeout(self.config.timeout, cmd.output())
            .await
            .map_err(|_| TransportError::Timeout {
                command: command.to_string(),
                timeout: self.config.timeout,
            })?
            .map_err(|source| TransportError::Spawn {
                command: command.to_string(),
                source,
            })?;

        finish(command, output)
    }
}
