//! Scripted transport for agent tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::transport::{ExecOutput, Transport, TransportError};

/// Answers commands from a fixed table keyed by the full command line.
#[derive(Default)]
pub struct ScriptedTransport {
    outputs: HashMap<String, Result<String, i32>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, command_line: &str, stdout: &str) -> Self {
        self.outputs
            .insert(command_line.to_string(), Ok(stdout.to_string()));
        self
    }

    pub fn with_exit(mut self, command_line: &str, status: i32) -> Self {
        self.outputs.insert(command_line.to_string(), Err(status));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn exec(&self, command: &str, args: &[&str]) -> Result<ExecOutput, TransportError> {
        let line = std::iter::once(command)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(line.clone());

        match self.outputs.get(&line) {
            Some(Ok(stdout)) => Ok(ExecOutput::from_stdout(stdout.as_bytes())),
            Some(Err(status)) => Err(TransportError::NonZeroExit {
                command: command.to_string(),
                status: *status,
                stderr: String::new(),
            }),
            None => Err(TransportError::NonZeroExit {
                command: command.to_string(),
                status: 127,
                stderr: format!("{line}: not scripted"),
            }),
        }
    }
}
