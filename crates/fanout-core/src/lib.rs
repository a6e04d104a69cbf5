//! fanout-core: Execution coordination and result aggregation
//!
//! Fans one command out to every host of an `ExecutorConfig`, collects one
//! `ExecutionResult` per host regardless of individual failures, and reduces
//! them into an all-or-nothing verdict.

pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod result;

pub use aggregate::{Summary, summarize};
pub use config::{ConcurrencyMode, DEFAULT_MAX_CONCURRENCY, ExecutorConfig};
pub use coordinator::{Coordinator, RoundOutcome, execute, join_command, run_on_host};
pub use error::{DistributeError, HostFailure};
pub use result::ExecutionResult;

pub use fanout_exec::{
    CommandResult, Credential, ExecError, FailureKind, HostKeyPolicy, KeySource, RemoteExecutor,
    SessionConfig, SshExecutor,
};
