//! Polling worker that drives due retries.

use crate::error::RunnerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use closetrack_core::ExecutionId;
use std::time::Duration;

/// The slice of the automation engine the worker needs.
///
/// Implemented by the server over its execution manager. Keeping the
/// worker behind this seam keeps the polling loop testable without a
/// database.
#[async_trait]
pub trait RetryRunner: Send + Sync {
    /// Lists executions whose scheduled retry is due at `now`.
    async fn due_retries(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionId>, RunnerError>;

    /// Runs one due retry to its next settled state.
    async fn run_retry(&self, id: ExecutionId) -> Result<(), RunnerError>;
}

/// Periodically polls for due retries and runs them.
pub struct RetryWorker<R>
where
    R: RetryRunner,
{
    runner: R,
    poll_interval: Duration,
}

impl<R> RetryWorker<R>
where
    R: RetryRunner,
{
    /// Creates a worker polling at the given interval.
    pub fn new(runner: R, poll_interval: Duration) -> Self {
        Self {
            runner,
            poll_interval,
        }
    }

    /// Runs a single poll cycle, returning how many retries were driven.
    ///
    /// A failing retry is logged and skipped; the row stays in its
    /// current state and surfaces again on a later poll if still due.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<usize, RunnerError> {
        let due = self.runner.due_retries(now).await?;
        if due.is_empty() {
            return Ok(0);
        }
        tracing::debug!(due = due.len(), "driving due automation retries");

        let mut driven = 0;
        for id in due {
            match self.runner.run_retry(id).await {
                Ok(()) => driven += 1,
                Err(e) => {
                    tracing::warn!(execution = %id, error = %e, "retry run failed");
                }
            }
        }
        Ok(driven)
    }

    /// Runs the polling loop forever.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                tracing::warn!(error = %e, "retry poll failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Runner over a fixed due list, with optional per-id failures.
    #[derive(Clone, Default)]
    struct ScriptedRunner {
        due: Arc<Mutex<Vec<ExecutionId>>>,
        failing: Arc<Mutex<HashSet<ExecutionId>>>,
        ran: Arc<Mutex<Vec<ExecutionId>>>,
    }

    impl ScriptedRunner {
        fn with_due(due: Vec<ExecutionId>) -> Self {
            Self {
                due: Arc::new(Mutex::new(due)),
                ..Self::default()
            }
        }

        fn fail_on(&self, id: ExecutionId) {
            self.failing.lock().unwrap().insert(id);
        }

        fn ran(&self) -> Vec<ExecutionId> {
            self.ran.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RetryRunner for ScriptedRunner {
        async fn due_retries(&self, _now: DateTime<Utc>) -> Result<Vec<ExecutionId>, RunnerError> {
            Ok(self.due.lock().unwrap().clone())
        }

        async fn run_retry(&self, id: ExecutionId) -> Result<(), RunnerError> {
            if self.failing.lock().unwrap().contains(&id) {
                return Err(RunnerError::RetryFailed {
                    id,
                    reason: "scripted failure".to_string(),
                });
            }
            self.ran.lock().unwrap().push(id);
            self.due.lock().unwrap().retain(|d| *d != id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn tick_runs_every_due_retry() {
        let ids = vec![ExecutionId::new(), ExecutionId::new(), ExecutionId::new()];
        let runner = ScriptedRunner::with_due(ids.clone());
        let worker = RetryWorker::new(runner.clone(), Duration::from_secs(5));

        let driven = worker.tick(Utc::now()).await.unwrap();
        assert_eq!(driven, 3);
        assert_eq!(runner.ran(), ids);
    }

    #[tokio::test]
    async fn tick_with_nothing_due_is_a_noop() {
        let runner = ScriptedRunner::default();
        let worker = RetryWorker::new(runner.clone(), Duration::from_secs(5));

        let driven = worker.tick(Utc::now()).await.unwrap();
        assert_eq!(driven, 0);
        assert!(runner.ran().is_empty());
    }

    #[tokio::test]
    async fn failing_retry_does_not_block_the_rest() {
        let good = ExecutionId::new();
        let bad = ExecutionId::new();
        let runner = ScriptedRunner::with_due(vec![bad, good]);
        runner.fail_on(bad);
        let worker = RetryWorker::new(runner.clone(), Duration::from_secs(5));

        let driven = worker.tick(Utc::now()).await.unwrap();
        assert_eq!(driven, 1);
        assert_eq!(runner.ran(), vec![good]);

        // The failed id is still due and picked up on the next tick.
        runner.failing.lock().unwrap().clear();
        let driven = worker.tick(Utc::now()).await.unwrap();
        assert_eq!(driven, 1);
        assert_eq!(runner.ran(), vec![good, bad]);
    }
}
