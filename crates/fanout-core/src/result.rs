//! Per-host execution results

use std::time::Duration;

use fanout_exec::{CommandResult, ExecError, FailureKind};
use serde::{Deserialize, Serialize};

use crate::error::HostFailure;

/// Outcome of one host in one round
///
/// Exactly one is produced per host entry. `diagnostic` is empty iff
/// `succeeded` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Target identifier
    pub host: String,
    /// Whether the command ran and exited 0
    pub succeeded: bool,
    /// Captured stdout (kept on failure when the command ran)
    pub output: String,
    /// Failure detail
    pub diagnostic: String,
    /// Failure class, `None` on success
    pub kind: Option<FailureKind>,
    /// Remote exit status, if the command ran and reported one
    pub exit_status: Option<u32>,
    /// Wall time spent on this host
    pub duration: Duration,
}

impl ExecutionResult {
    /// Classify what the executor returned for `host`
    #[must_use]
    pub fn from_outcome(
        host: impl Into<String>,
        outcome: Result<CommandResult, ExecError>,
        duration: Duration,
    ) -> Self {
        let host = host.into();
        match outcome {
            Ok(cmd) => match cmd.check() {
                Ok(()) => Self {
                    host,
                    succeeded: true,
                    output: cmd.stdout,
                    diagnostic: String::new(),
                    kind: None,
                    exit_status: cmd.status,
                    duration,
                },
                Err(e) => Self {
                    host,
                    succeeded: false,
                    output: cmd.stdout,
                    diagnostic: e.diagnostic(),
                    kind: Some(e.kind()),
                    exit_status: cmd.status,
                    duration,
                },
            },
            Err(e) => Self::failed(host, &e, duration),
        }
    }

    /// Result for a host that never produced command output
    #[must_use]
    pub fn failed(host: impl Into<String>, err: &ExecError, duration: Duration) -> Self {
        Self {
            host: host.into(),
            succeeded: false,
            output: String::new(),
            diagnostic: err.diagnostic(),
            kind: Some(err.kind()),
            exit_status: None,
            duration,
        }
    }

    /// Result for a host whose task died before reporting
    #[must_use]
    pub fn internal(host: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            succeeded: false,
            output: String::new(),
            diagnostic: diagnostic.into(),
            kind: Some(FailureKind::Internal),
            exit_status: None,
            duration: Duration::ZERO,
        }
    }

    /// Failure entry for the round error, `None` on success
    #[must_use]
    pub fn failure(&self) -> Option<HostFailure> {
        if self.succeeded {
            return None;
        }

        Some(HostFailure {
            host: self.host.clone(),
            kind: self.kind.unwrap_or(FailureKind::Internal),
            diagnostic: self.diagnostic.clone(),
        })
    }
}
