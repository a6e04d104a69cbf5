//! Configuration for one execution round

use std::time::Duration;

use fanout_exec::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::error::DistributeError;

/// Default cap on hosts in flight at once in parallel mode
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;

/// How hosts of a round are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// One task per host, results in completion order
    #[default]
    Parallel,
    /// One host at a time, results in host list order
    Sequential,
}

/// Everything the coordinator needs for one round
///
/// Built by the caller and only read during `execute`.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Target hosts in order; duplicates are allowed
    pub hosts: Vec<String>,
    /// Username, credential and transport settings
    pub session: SessionConfig,
    /// Parallel or sequential scheduling
    pub mode: ConcurrencyMode,
    /// Upper bound on in-flight hosts in parallel mode
    pub max_concurrency: usize,
    /// Budget for one host (connect, authenticate, execute)
    pub host_timeout: Option<Duration>,
    /// Budget for the whole round, including time spent queued
    pub round_timeout: Option<Duration>,
}

impl ExecutorConfig {
    /// Create a parallel round over `hosts`
    pub fn new<I, S>(hosts: I, session: SessionConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            session,
            mode: ConcurrencyMode::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            host_timeout: None,
            round_timeout: None,
        }
    }

    /// Set scheduling mode
    #[must_use]
    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set concurrency cap
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Set per-host timeout
    #[must_use]
    pub fn with_host_timeout(mut self, timeout: Duration) -> Self {
        self.host_timeout = Some(timeout);
        self
    }

    /// Set whole-round timeout
    #[must_use]
    pub fn with_round_timeout(mut self, timeout: Duration) -> Self {
        self.round_timeout = Some(timeout);
        self
    }

    /// Check the config before any host is contacted
    ///
    /// # Errors
    /// Returns `DistributeError::Configuration` for an empty host list, a
    /// blank host entry, or a zero concurrency cap
    pub fn validate(&self) -> Result<(), DistributeError> {
        if self.hosts.is_empty() {
            return Err(DistributeError::Configuration(
                "no hosts specified".to_string(),
            ));
        }

        if let Some(idx) = self.hosts.iter().position(|h| h.trim().is_empty()) {
            return Err(DistributeError::Configuration(format!(
                "empty host entry at position {idx}"
            )));
        }

        if self.max_concurrency == 0 {
            return Err(DistributeError::Configuration(
                "max concurrency must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
