//! Result aggregation

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::result::ExecutionResult;

/// Succeeded/total counts for one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Hosts whose command succeeded
    pub succeeded: usize,
    /// Hosts attempted
    pub total: usize,
    /// True iff every host succeeded
    pub overall_succeeded: bool,
}

impl Summary {
    /// Hosts that failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.total.saturating_sub(self.succeeded)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} hosts succeeded", self.succeeded, self.total)
    }
}

/// Reduce per-host results to an all-or-nothing verdict
#[must_use]
pub fn summarize(results: &[ExecutionResult]) -> Summary {
    let succeeded = results.iter().filter(|r| r.succeeded).count();
    let total = results.len();

    Summary {
        succeeded,
        total,
        overall_succeeded: succeeded == total,
    }
}
