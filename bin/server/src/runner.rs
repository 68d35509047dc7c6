//! Adapter exposing the execution manager to the retry worker.

use crate::state::AppManager;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use closetrack_core::ExecutionId;
use closetrack_scheduler::{RetryRunner, RunnerError};
use std::sync::Arc;

/// Runs due retries through the shared execution manager.
pub struct ManagerRetryRunner {
    manager: Arc<AppManager>,
}

impl ManagerRetryRunner {
    /// Creates a runner over the manager.
    pub fn new(manager: Arc<AppManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl RetryRunner for ManagerRetryRunner {
    async fn due_retries(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionId>, RunnerError> {
        self.manager
            .due_retries(now)
            .await
            .map_err(|e| RunnerError::ListFailed {
                reason: e.to_string(),
            })
    }

    async fn run_retry(&self, id: ExecutionId) -> Result<(), RunnerError> {
        self.manager
            .run_retry(id)
            .await
            .map(|_| ())
            .map_err(|e| RunnerError::RetryFailed {
                id,
                reason: e.to_string(),
            })
    }
}
