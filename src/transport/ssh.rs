//! Remote command execution through the system OpenSSH client.
//!
//! Authentication is delegated to the client (agent, identity file, known
//! hosts). `BatchMode` is always on so a missing key fails fast instead of
//! prompting.

use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::traits::{ExecOutput, Transport, TransportError, finish, parse_config};

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;
/// Default per-command timeout, connection included (15 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_binary() -> String {
    "ssh".to_string()
}

/// SSH transport configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshConfig {
    /// Remote host name or address.
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    /// Private key passed with `-i`.
    #[serde(default)]
    pub identity_file: Option<String>,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Client binary, mostly useful for tests.
    #[serde(default = "default_binary")]
    pub binary: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            user: None,
            identity_file: None,
            timeout: DEFAULT_TIMEOUT,
            binary: default_binary(),
        }
    }
}

/// Runs commands on a remote host over SSH.
#[derive(Debug, Clone)]
pub struct SshTransport {
    config: SshConfig,
}

impl SshTransport {
    pub fn new(config: SshConfig) -> Result<Self, TransportError> {
        if config.host.trim().is_empty() {
            return Err(TransportError::Config("ssh host cannot be empty".to_string()));
        }
        if config.timeout.is_zero() {
            return Err(TransportError::Config("timeout must be > 0".to_string()));
        }
        Ok(Self { config })
    }

    /// Build from a host's transport configuration.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, TransportError> {
        Self::new(parse_config(value)?)
    }

    fn destination(&self) -> String {
        match &self.config.user {
            Some(user) => format!("{}@{}", user, self.config.host),
            None => self.config.host.clone(),
        }
    }

    /// Arguments passed to the ssh client for one remote command.
    pub fn client_args(&self, command: &str, args: &[&str]) -> Vec<String> {
        let connect_secs = self.config.timeout.as_secs().max(1);
        let mut out = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={connect_secs}"),
            "-p".to_string(),
            self.config.port.to_string(),
        ];
        if let Some(identity) = &self.config.identity_file {
            out.push("-i".to_string());
            out.push(identity.clone());
        }
        out.push(self.destination());
        out.push("--".to_string());
        out.push(remote_command(command, args));
        out
    }
}

/// Join a command and its arguments into one shell-safe remote command line.
pub fn remote_command(command: &str, args: &[&str]) -> String {
    std::iter::once(command)
        .chain(args.iter().copied())
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a word for a POSIX shell, leaving plain words untouched.
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[async_trait::async_trait]
impl Transport for SshTransport {
    fn name(&self) -> &str {
        "ssh"
    }

    async fn exec(&self, command: &str, args: &[&str]) -> Result<ExecOutput, TransportError> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(self.client_args(command, args))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::trace!(host = %self.config.host, command, ?args, "Executing remote command");

        let output = tokio::time::timeout(self.config.timeout, cmd.output())
            .await
            .map_err(|_| TransportError::Timeout {
                command: command.to_string(),
                timeout: self.config.timeout,
            })?
            .map_err(|source| TransportError::Spawn {
                command: self.config.binary.clone(),
                source,
            })?;

        finish(command, output)
    }
}
