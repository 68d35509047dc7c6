//! The workflow execution ledger entry and its status state machine.
//!
//! One `WorkflowExecution` row is created per rule firing and mutated
//! through an explicit transition table as the attempt chain progresses.
//! Rows are never deleted; `completed` and `failed` are terminal for the
//! engine. The operator's manual retry action is the single exception
//! that re-enters `running` from `failed`.

use crate::error::ExecutionError;
use chrono::{DateTime, Utc};
use closetrack_core::{ExecutionId, RuleId, TransactionId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Ledger row created, work not yet started.
    Pending,
    /// An attempt is actively executing.
    Running,
    /// Terminal success.
    Completed,
    /// Terminal failure (retries exhausted).
    Failed,
    /// A failed attempt is waiting for its scheduled retry.
    Retrying,
}

impl ExecutionStatus {
    /// Returns the storage representation of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }

    /// Parses the storage representation of a status.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "retrying" => Some(Self::Retrying),
            _ => None,
        }
    }

    /// Returns true if this is a terminal state for the automatic path.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the transition `self -> to` is permitted.
    ///
    /// `failed -> running` exists only for the operator's manual retry;
    /// the automatic path never leaves a terminal state.
    #[must_use]
    pub fn can_transition(&self, to: ExecutionStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Retrying)
                | (Self::Running, Self::Failed)
                | (Self::Retrying, Self::Running)
                | (Self::Retrying, Self::Retrying)
                | (Self::Retrying, Self::Failed)
                | (Self::Failed, Self::Running)
        )
    }
}

/// Audit metadata captured when an execution is created.
///
/// The trigger payload is persisted here so a retry can reconstruct the
/// original `TriggerContext` after the triggering event is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Name of the rule at firing time.
    pub rule_name: String,
    /// The trigger payload the rule fired with.
    pub trigger_context: JsonValue,
}

/// A single attempt chain to apply one rule to one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Unique identifier for this execution.
    pub id: ExecutionId,
    /// The rule that fired.
    pub rule_id: RuleId,
    /// The transaction this execution acts upon.
    pub transaction_id: TransactionId,
    /// Current status.
    pub status: ExecutionStatus,
    /// Number of failure-triggered retries so far.
    pub retry_count: u32,
    /// When the ledger row was created.
    pub executed_at: DateTime<Utc>,
    /// When the execution reached terminal success.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the next automatic retry is due, while status is `retrying`.
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Last failure reason.
    pub error_message: Option<String>,
    /// Audit metadata (rule name and trigger payload).
    pub metadata: ExecutionMetadata,
}

impl WorkflowExecution {
    /// Creates a new execution in `pending` state.
    #[must_use]
    pub fn new(rule_id: RuleId, transaction_id: TransactionId, metadata: ExecutionMetadata) -> Self {
        Self {
            id: ExecutionId::new(),
            rule_id,
            transaction_id,
            status: ExecutionStatus::Pending,
            retry_count: 0,
            executed_at: Utc::now(),
            completed_at: None,
            next_retry_at: None,
            error_message: None,
            metadata,
        }
    }

    fn transition(&mut self, to: ExecutionStatus) -> Result<(), ExecutionError> {
        if !self.status.can_transition(to) {
            return Err(ExecutionError::InvalidTransition {
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// Marks an attempt as actively executing.
    pub fn mark_running(&mut self) -> Result<(), ExecutionError> {
        self.transition(ExecutionStatus::Running)?;
        self.next_retry_at = None;
        Ok(())
    }

    /// Records terminal success.
    pub fn complete(&mut self) -> Result<(), ExecutionError> {
        self.transition(ExecutionStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.next_retry_at = None;
        Ok(())
    }

    /// Records a failed attempt with a retry still available.
    ///
    /// `attempt` is the failure count as computed by the retry policy;
    /// `retry_count` is monotonically non-decreasing across the lifetime
    /// of the row.
    pub fn schedule_retry(
        &mut self,
        error: String,
        attempt: u32,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), ExecutionError> {
        debug_assert!(attempt >= self.retry_count);
        self.transition(ExecutionStatus::Retrying)?;
        self.retry_count = attempt;
        self.error_message = Some(error);
        self.next_retry_at = Some(next_retry_at);
        Ok(())
    }

    /// Records terminal failure after retries are exhausted.
    pub fn fail(&mut self, error: String, attempt: u32) -> Result<(), ExecutionError> {
        debug_assert!(attempt >= self.retry_count);
        self.transition(ExecutionStatus::Failed)?;
        self.retry_count = attempt;
        self.error_message = Some(error);
        self.next_retry_at = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_execution() -> WorkflowExecution {
        WorkflowExecution::new(
            RuleId::new(),
            TransactionId::new(),
            ExecutionMetadata {
                rule_name: "Under contract kickoff".to_string(),
                trigger_context: json!({"new_status": "under_contract"}),
            },
        )
    }

    #[test]
    fn status_terminal() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::Retrying.is_terminal());
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
    }

    #[test]
    fn successful_lifecycle() {
        let mut exec = new_execution();
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert!(exec.completed_at.is_none());

        exec.mark_running().unwrap();
        assert_eq!(exec.status, ExecutionStatus::Running);

        exec.complete().unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert!(exec.completed_at.is_some());
        assert_eq!(exec.retry_count, 0);
    }

    #[test]
    fn retry_lifecycle() {
        let mut exec = new_execution();
        exec.mark_running().unwrap();

        exec.schedule_retry("timeout".to_string(), 1, Utc::now())
            .unwrap();
        assert_eq!(exec.status, ExecutionStatus::Retrying);
        assert_eq!(exec.retry_count, 1);
        assert!(exec.next_retry_at.is_some());
        assert_eq!(exec.error_message.as_deref(), Some("timeout"));

        exec.mark_running().unwrap();
        assert!(exec.next_retry_at.is_none());

        exec.fail("timeout again".to_string(), 2).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.retry_count, 2);
        assert!(exec.completed_at.is_none());
    }

    #[test]
    fn completed_is_terminal() {
        let mut exec = new_execution();
        exec.mark_running().unwrap();
        exec.complete().unwrap();

        assert!(exec.mark_running().is_err());
        assert!(exec.fail("late".to_string(), 1).is_err());
        assert!(exec.schedule_retry("late".to_string(), 1, Utc::now()).is_err());
    }

    #[test]
    fn failed_allows_manual_rerun_only() {
        let mut exec = new_execution();
        exec.mark_running().unwrap();
        exec.fail("boom".to_string(), 3).unwrap();

        // The operator retry path re-enters running.
        assert!(exec.mark_running().is_ok());
        // No direct failed -> completed shortcut exists.
        exec.fail("boom".to_string(), 3).unwrap();
        assert!(exec.complete().is_err());
    }

    #[test]
    fn pending_cannot_complete_directly() {
        let mut exec = new_execution();
        let err = exec.complete().unwrap_err();
        match err {
            ExecutionError::InvalidTransition { from, to } => {
                assert_eq!(from, "pending");
                assert_eq!(to, "completed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn status_storage_roundtrip() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Retrying,
        ] {
            assert_eq!(ExecutionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ExecutionStatus::parse("unknown"), None);
    }

    #[test]
    fn execution_serde_roundtrip() {
        let exec = new_execution();
        let json = serde_json::to_string(&exec).expect("serialize");
        let parsed: WorkflowExecution = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(exec, parsed);
    }
}
