//! Transport Layer
//!
//! Executes commands on target hosts and returns their output. Agents gather
//! everything through a transport, so the same agent works locally and over
//! SSH.
//!
//! # Architecture
//!
//! - [`Transport`]: async command execution contract
//! - [`LocalTransport`]: child processes on this machine (`localtransport`)
//! - [`SshTransport`]: system OpenSSH client in batch mode (`ssh`)
//! - [`TransportRegistry`]: key → constructor, resolved per host

mod local;
mod registry;
mod ssh;
mod traits;

pub use local::{LocalConfig, LocalTransport};
pub use registry::{TransportFactory, TransportRegistry};
pub use ssh::{SshConfig, SshTransport, remote_command, shell_quote};
pub use traits::{ExecOutput, Transport, TransportError};
