//! Core error types for fanout-core

use std::fmt;

use fanout_exec::FailureKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Round-level errors returned to the caller
///
/// Per-host detail lives in the result list; this is only the summary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributeError {
    /// Round rejected before any host was contacted
    #[error("configuration error: {0}")]
    Configuration(String),

    /// At least one host failed
    #[error("execution errors: [{}]", join_failures(.failures))]
    Execution {
        /// One entry per failed host, in result order
        failures: Vec<HostFailure>,
    },
}

impl DistributeError {
    /// Failed hosts, empty for configuration errors
    #[must_use]
    pub fn failures(&self) -> &[HostFailure] {
        match self {
            DistributeError::Configuration(_) => &[],
            DistributeError::Execution { failures } => failures,
        }
    }
}

/// Why one host failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFailure {
    /// Host identifier
    pub host: String,
    /// Failure class
    pub kind: FailureKind,
    /// Diagnostic copied from the host's result
    pub diagnostic: String,
}

impl fmt::Display for HostFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host {} failed: {}", self.host, self.diagnostic)
    }
}

fn join_failures(failures: &[HostFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
