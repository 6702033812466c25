//! Core transport trait and types.

use std::borrow::Cow;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can occur while executing a command on a host.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The command could not be started.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command did not finish in time and was killed.
    #[error("'{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The command exited with a non-zero status.
    #[error("'{command}' exited with status {status}: {stderr}")]
    NonZeroExit {
        command: String,
        status: i32,
        stderr: String,
    },

    /// The command was terminated by a signal.
    #[error("'{command}' was terminated by a signal")]
    Killed { command: String },

    /// Invalid transport configuration.
    #[error("transport config error: {0}")]
    Config(String),

    /// No transport registered under this key.
    #[error("unknown transport: '{0}'")]
    Unknown(String),
}

/// Captured output of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code, `None` if unavailable.
    pub status: Option<i32>,
}

impl ExecOutput {
    /// Successful output with the given stdout.
    pub fn from_stdout(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
            status: Some(0),
        }
    }

    /// Standard output as a readable stream.
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Standard error as a readable stream.
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Standard output decoded as UTF-8, replacing invalid sequences.
    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }
}

/// Capability to run a command on a target host.
///
/// Implementations own their timeout semantics: the scheduler never cancels
/// a running command.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs (e.g., "localtransport").
    fn name(&self) -> &str;

    /// Execute `command` with `args` and capture its output.
    ///
    /// # Errors
    /// Returns [`TransportError`] if the command cannot be started, times out
    /// or exits unsuccessfully.
    async fn exec(&self, command: &str, args: &[&str]) -> Result<ExecOutput, TransportError>;
}

/// Deserialize a transport configuration, using the default for `null`.
pub(crate) fn parse_config<T>(value: &serde_json::Value) -> Result<T, TransportError>
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone()).map_err(|e| TransportError::Config(e.to_string()))
}

/// Convert a finished process into an [`ExecOutput`], failing on non-zero exit.
pub(crate) fn finish(
    command: &str,
    output: std::process::Output,
) -> Result<ExecOutput, TransportError> {
    if output.status.success() {
        return Ok(ExecOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            status: output.status.code(),
        });
    }

    match output.status.code() {
        Some(status) => Err(TransportError::NonZeroExit {
            command: command.to_string(),
            status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
        None => Err(TransportError::Killed {
            command: command.to_string(),
        }),
    }
}
