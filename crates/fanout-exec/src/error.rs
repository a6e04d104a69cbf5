//! Error types for fanout-exec

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while running a command on one host
///
/// The `Display` output doubles as the per-host diagnostic, so every variant
/// starts with the prefix of the step that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// Key file could not be read
    #[error("read key: {0}")]
    KeyRead(String),

    /// Key material could not be decoded
    #[error("parse key: {0}")]
    KeyParse(String),

    /// Failed to reach the host or complete the handshake
    #[error("dial: {0}")]
    Connect(String),

    /// Every authentication method was rejected, or none was supplied
    #[error("auth: {0}")]
    Auth(String),

    /// Failed to open a command channel after authenticating
    #[error("new session: {0}")]
    Session(String),

    /// Remote process finished unsuccessfully
    #[error("run: {}", describe_exit(.status, .signal))]
    CommandFailed {
        /// Exit status, if the server reported one
        status: Option<u32>,
        /// Signal that killed the process, if any
        signal: Option<String>,
        /// Captured stderr
        stderr: String,
    },

    /// Transport failure while the command was running
    #[error("run: {0}")]
    Transport(String),

    /// Host did not finish in time
    #[error("timeout: no response after {timeout:?}")]
    Timeout {
        /// Budget that was exceeded
        timeout: Duration,
    },
}

fn describe_exit(status: &Option<u32>, signal: &Option<String>) -> String {
    match (status, signal) {
        (_, Some(name)) => format!("process killed by signal {name}"),
        (Some(code), None) => format!("process exited with status {code}"),
        (None, None) => "process exited without an exit status".to_string(),
    }
}

/// Coarse failure class attached to a failed host result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Host unreachable, refused, or handshake failed
    Connect,
    /// Credential rejected or malformed key material
    Auth,
    /// Command channel could not be opened
    Session,
    /// Non-zero exit or mid-run transport error
    Execution,
    /// Host or round deadline exceeded
    Timeout,
    /// Per-host task died without reporting
    Internal,
}

impl ExecError {
    /// Failure class of this error
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            ExecError::KeyRead(_) | ExecError::KeyParse(_) | ExecError::Auth(_) => {
                FailureKind::Auth
            }
            ExecError::Connect(_) => FailureKind::Connect,
            ExecError::Session(_) => FailureKind::Session,
            ExecError::CommandFailed { .. } | ExecError::Transport(_) => FailureKind::Execution,
            ExecError::Timeout { .. } => FailureKind::Timeout,
        }
    }

    /// Human-readable diagnostic, with captured stderr appended for failed
    /// commands
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match self {
            ExecError::CommandFailed { stderr, .. } if !stderr.is_empty() => {
                format!("{self}\n{stderr}")
            }
            _ => self.to_string(),
        }
    }
}
