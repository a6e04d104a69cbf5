//! fanout-exec: Remote session client
//!
//! Opens one authenticated SSH connection per host, runs exactly one command
//! and hands back the captured output. Also defines the `RemoteExecutor`
//! seam the coordinator fans out over.

pub mod config;
pub mod error;
pub mod keys;
pub mod result;
pub mod ssh;
pub mod traits;

pub use config::{Credential, DEFAULT_SSH_PORT, HostKeyPolicy, SessionConfig};
pub use error::{ExecError, FailureKind};
pub use keys::{KeyError, KeySource};
pub use result::CommandResult;
pub use ssh::SshExecutor;
pub use traits::RemoteExecutor;
