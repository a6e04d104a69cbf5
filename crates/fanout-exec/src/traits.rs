//! Remote executor trait

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Runs one command on one host.
///
/// Implementations must not share mutable state between calls: the
/// coordinator invokes `run` concurrently for every host of a round.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `cmd` on `host` and return the captured output.
    ///
    /// A command that ran to completion is `Ok` regardless of its exit
    /// status. `Err` is reserved for failures before or outside the remote
    /// process (key, dial, auth, channel, transport).
    async fn run(&self, host: &str, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Short name for logs
    fn executor_type(&self) -> &'static str;
}
