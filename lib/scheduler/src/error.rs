//! Error types for the scheduler crate.

use closetrack_core::ExecutionId;
use std::fmt;

/// Errors from driving retries through a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    /// Listing due retries failed.
    ListFailed { reason: String },
    /// Running a single retry failed.
    RetryFailed { id: ExecutionId, reason: String },
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListFailed { reason } => write!(f, "listing due retries failed: {reason}"),
            Self::RetryFailed { id, reason } => {
                write!(f, "retry of execution {id} failed: {reason}")
            }
        }
    }
}

impl std::error::Error for RunnerError {}
