//! Result types for command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecError;

/// Output of a remote process that ran to completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status reported by the server (`None` if it never sent one)
    pub status: Option<u32>,
    /// Signal name reported if the process was killed
    #[serde(default)]
    pub signal: Option<String>,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Convert a non-zero exit into the matching error
    ///
    /// # Errors
    /// Returns `ExecError::CommandFailed` carrying stderr if the command did
    /// not exit with status 0
    pub fn check(&self) -> Result<(), ExecError> {
        if self.success() {
            Ok(())
        } else {
            Err(ExecError::CommandFailed {
                status: self.status,
                signal: self.signal.clone(),
                stderr: self.stderr.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: Option<u32>) -> CommandResult {
        CommandResult {
            status,
            signal: None,
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            duration: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_success() {
        assert!(result(Some(0)).success());
        assert!(result(Some(0)).check().is_ok());
    }

    #[test]
    fn test_nonzero_is_failure() {
        let err = result(Some(2)).check().unwrap_err();
        assert_eq!(
            err,
            ExecError::CommandFailed {
                status: Some(2),
                signal: None,
                stderr: "err".to_string()
            }
        );
    }

    #[test]
    fn test_missing_status_is_failure() {
        assert!(!result(None).success());
    }

    #[test]
    fn test_signal_carried_into_error() {
        let killed = CommandResult {
            signal: Some("TERM".to_string()),
            ..result(None)
        };

        let err = killed.check().unwrap_err();
        assert_eq!(err.to_string(), "run: process killed by signal TERM");
    }
}
