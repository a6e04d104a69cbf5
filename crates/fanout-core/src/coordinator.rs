//! Execution coordinator: fans one command out to every host of a round
//!
//! Parallel rounds spawn one task per host, bounded by a semaphore, and join
//! all of them before returning. Sequential rounds walk the host list in
//! order. Either way every host gets exactly one `ExecutionResult`, and a
//! failing host never cancels its siblings.

use std::sync::Arc;
use std::time::Duration;

use fanout_exec::{ExecError, RemoteExecutor, SshExecutor};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinError;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, error, info, instrument, warn};

use crate::aggregate::{Summary, summarize};
use crate::config::{ConcurrencyMode, ExecutorConfig};
use crate::error::{DistributeError, HostFailure};
use crate::result::ExecutionResult;

/// Everything a round produced
///
/// `results` is complete even when `error` is set; callers needing per-host
/// detail should read it rather than the error text.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    /// One entry per host: completion order (parallel) or host order
    /// (sequential)
    pub results: Vec<ExecutionResult>,
    /// Set iff the config was rejected or at least one host failed
    pub error: Option<DistributeError>,
}

impl RoundOutcome {
    fn rejected(err: DistributeError) -> Self {
        Self {
            results: Vec::new(),
            error: Some(err),
        }
    }

    /// Aggregate counts
    #[must_use]
    pub fn summary(&self) -> Summary {
        summarize(&self.results)
    }

    /// Whether the round succeeded on every host
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Split into results and the round verdict
    #[must_use]
    pub fn into_parts(self) -> (Vec<ExecutionResult>, Result<(), DistributeError>) {
        let verdict = match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        };
        (self.results, verdict)
    }
}

/// Results and failures gathered as hosts complete
#[derive(Debug, Default)]
struct Accumulator {
    results: Vec<ExecutionResult>,
    failures: Vec<HostFailure>,
}

impl Accumulator {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Vec::with_capacity(capacity),
            failures: Vec::new(),
        }
    }

    fn record(&mut self, result: ExecutionResult) {
        if let Some(failure) = result.failure() {
            self.failures.push(failure);
        }
        self.results.push(result);
    }

    fn finish(self) -> RoundOutcome {
        let error = if self.failures.is_empty() {
            None
        } else {
            Some(DistributeError::Execution {
                failures: self.failures,
            })
        };

        RoundOutcome {
            results: self.results,
            error,
        }
    }
}

/// Round deadline and the budget it was derived from
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// `None` when the round is unbounded, including budgets too large to
    /// land on the clock
    fn from_config(config: &ExecutorConfig) -> Option<Self> {
        let budget = config.round_timeout?;
        let Some(at) = Instant::now().checked_add(budget) else {
            debug!(budget = ?budget, "round timeout out of clock range, running unbounded");
            return None;
        };
        Some(Self { at, budget })
    }

    fn expired(&self, host: &str) -> ExecutionResult {
        warn!(host = %host, budget = ?self.budget, "round deadline reached");
        ExecutionResult::failed(
            host,
            &ExecError::Timeout {
                timeout: self.budget,
            },
            self.budget,
        )
    }
}

/// Fans commands out over a `RemoteExecutor`
#[derive(Clone)]
pub struct Coordinator {
    executor: Arc<dyn RemoteExecutor>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("executor", &self.executor.executor_type())
            .finish()
    }
}

impl Coordinator {
    /// Create a coordinator over any executor
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }

    /// Create a coordinator that reaches hosts over SSH with the round's
    /// session settings
    #[must_use]
    pub fn ssh(config: &ExecutorConfig) -> Self {
        Self::new(Arc::new(SshExecutor::new(config.session.clone())))
    }

    /// Run `command` once on every host of `config`
    ///
    /// Returns only after every host has a result. An invalid config yields
    /// a configuration error and no results, without contacting any host.
    #[instrument(skip(self, config, command), fields(hosts = config.hosts.len(), mode = ?config.mode))]
    pub async fn execute(&self, config: &ExecutorConfig, command: &str) -> RoundOutcome {
        if let Err(e) = config.validate() {
            warn!(error = %e, "rejecting execution round");
            return RoundOutcome::rejected(e);
        }

        let start = Instant::now();
        let deadline = Deadline::from_config(config);

        debug!(command = %command, "starting execution round");

        let outcome = match config.mode {
            ConcurrencyMode::Parallel => self.fan_out(config, command, deadline).await,
            ConcurrencyMode::Sequential => self.run_in_order(config, command, deadline).await,
        };

        let summary = outcome.summary();
        info!(
            target: "fanout::usage",
            executor = self.executor.executor_type(),
            mode = ?config.mode,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed(),
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "execution round finished"
        );

        outcome
    }

    async fn fan_out(
        &self,
        config: &ExecutorConfig,
        command: &str,
        deadline: Option<Deadline>,
    ) -> RoundOutcome {
        let accumulator = Arc::new(Mutex::new(Accumulator::with_capacity(config.hosts.len())));
        let permits = Arc::new(Semaphore::new(
            config.max_concurrency.min(Semaphore::MAX_PERMITS),
        ));
        let command: Arc<str> = Arc::from(command);

        let mut handles = Vec::with_capacity(config.hosts.len());

        for host in &config.hosts {
            let executor = Arc::clone(&self.executor);
            let accumulator = Arc::clone(&accumulator);
            let permits = Arc::clone(&permits);
            let command = Arc::clone(&command);
            let task_host = host.clone();
            let host_timeout = config.host_timeout;

            let handle = tokio::spawn(async move {
                let attempt = async {
                    // held until this host is done; the semaphore is never closed
                    let _permit = permits.acquire().await;
                    run_on_host(executor.as_ref(), &task_host, &command, host_timeout).await
                };

                let result = within_deadline(&task_host, deadline, attempt).await;
                accumulator.lock().await.record(result);
            });

            handles.push((host.clone(), handle));
        }

        // Join every task; no early return on failure
        for (host, handle) in handles {
            if let Err(e) = handle.await {
                accumulator.lock().await.record(task_failed(host, &e));
            }
        }

        std::mem::take(&mut *accumulator.lock().await).finish()
    }

    async fn run_in_order(
        &self,
        config: &ExecutorConfig,
        command: &str,
        deadline: Option<Deadline>,
    ) -> RoundOutcome {
        let mut accumulator = Accumulator::with_capacity(config.hosts.len());
        let command: Arc<str> = Arc::from(command);

        for host in &config.hosts {
            let executor = Arc::clone(&self.executor);
            let command = Arc::clone(&command);
            let task_host = host.clone();
            let host_timeout = config.host_timeout;

            // a task per host isolates panics; the next host waits for it
            let handle = tokio::spawn(async move {
                run_on_host(executor.as_ref(), &task_host, &command, host_timeout).await
            });
            let abort = handle.abort_handle();

            let attempt = async {
                match handle.await {
                    Ok(result) => result,
                    Err(e) => task_failed(host.clone(), &e),
                }
            };

            accumulator.record(within_deadline(host, deadline, attempt).await);
            // no-op unless the round deadline cut the attempt short
            abort.abort();
        }

        accumulator.finish()
    }
}

/// Result for a host whose task panicked or was cancelled
fn task_failed(host: String, err: &JoinError) -> ExecutionResult {
    error!(host = %host, error = %err, "host task did not complete");
    ExecutionResult::internal(host, format!("task failed: {err}"))
}

/// Bound `attempt` by the round deadline, if any
async fn within_deadline<F>(host: &str, deadline: Option<Deadline>, attempt: F) -> ExecutionResult
where
    F: Future<Output = ExecutionResult>,
{
    let Some(deadline) = deadline else {
        return attempt.await;
    };

    // past the deadline: do not start the host at all
    if Instant::now() >= deadline.at {
        return deadline.expired(host);
    }

    match timeout_at(deadline.at, attempt).await {
        Ok(result) => result,
        Err(_) => deadline.expired(host),
    }
}

/// Run `command` on one host and classify the outcome
///
/// Never fails: every error becomes a failed `ExecutionResult`. Dropping the
/// executor future on timeout releases its connection.
#[instrument(skip(executor, host, command), fields(host = %host))]
pub async fn run_on_host(
    executor: &dyn RemoteExecutor,
    host: &str,
    command: &str,
    host_timeout: Option<Duration>,
) -> ExecutionResult {
    let start = Instant::now();

    let outcome = match host_timeout {
        Some(limit) => timeout(limit, executor.run(host, command))
            .await
            .unwrap_or(Err(ExecError::Timeout { timeout: limit })),
        None => executor.run(host, command).await,
    };

    let result = ExecutionResult::from_outcome(host, outcome, start.elapsed());

    if result.succeeded {
        debug!(host = %host, duration = ?result.duration, "host succeeded");
    } else {
        warn!(host = %host, diagnostic = %result.diagnostic, "host failed");
    }

    result
}

/// Run `command` over SSH on every host of `config`
pub async fn execute(config: &ExecutorConfig, command: &str) -> RoundOutcome {
    Coordinator::ssh(config).execute(config, command).await
}

/// Join positional command tokens with single spaces, preserving order
#[must_use]
pub fn join_command<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}
