//! Postgres execution ledger.

use crate::db::decode_reason;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use closetrack_automation::{
    ExecutionFilter, ExecutionMetadata, ExecutionStatus, ExecutionStore, ExecutionStoreError,
    WorkflowExecution,
};
use closetrack_core::{ExecutionId, RuleId, TransactionId};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for execution queries.
#[derive(FromRow)]
struct ExecutionRow {
    id: String,
    rule_id: String,
    transaction_id: String,
    status: String,
    retry_count: i32,
    executed_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    next_retry_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    metadata: serde_json::Value,
}

impl ExecutionRow {
    fn try_into_record(self) -> Result<WorkflowExecution, ExecutionStoreError> {
        let id = ExecutionId::from_str(&self.id).map_err(|e| ExecutionStoreError::StorageFailed {
            reason: decode_reason("execution id", &self.id, e),
        })?;
        let rule_id = RuleId::from_str(&self.rule_id).map_err(|e| {
            ExecutionStoreError::StorageFailed {
                reason: decode_reason("rule id", &self.rule_id, e),
            }
        })?;
        let transaction_id = TransactionId::from_str(&self.transaction_id).map_err(|e| {
            ExecutionStoreError::StorageFailed {
                reason: decode_reason("transaction id", &self.transaction_id, e),
            }
        })?;
        let status = ExecutionStatus::parse(&self.status).ok_or_else(|| {
            ExecutionStoreError::StorageFailed {
                reason: decode_reason("execution status", &self.status, "unknown value"),
            }
        })?;
        let retry_count = u32::try_from(self.retry_count).map_err(|e| {
            ExecutionStoreError::StorageFailed {
                reason: decode_reason("retry count", &self.retry_count.to_string(), e),
            }
        })?;
        let metadata: ExecutionMetadata = serde_json::from_value(self.metadata).map_err(|e| {
            ExecutionStoreError::StorageFailed {
                reason: format!("invalid execution metadata: {e}"),
            }
        })?;

        Ok(WorkflowExecution {
            id,
            rule_id,
            transaction_id,
            status,
            retry_count,
            executed_at: self.executed_at,
            completed_at: self.completed_at,
            next_retry_at: self.next_retry_at,
            error_message: self.error_message,
            metadata,
        })
    }
}

fn storage_failed(e: sqlx::Error) -> ExecutionStoreError {
    ExecutionStoreError::StorageFailed {
        reason: e.to_string(),
    }
}

const EXECUTION_COLUMNS: &str = "id, rule_id, transaction_id, status, retry_count, \
     executed_at, completed_at, next_retry_at, error_message, metadata";

/// Postgres-backed execution ledger.
#[derive(Clone)]
pub struct PgExecutionStore {
    pool: PgPool,
}

impl PgExecutionStore {
    /// Creates a new store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionStore for PgExecutionStore {
    async fn create(&self, execution: &WorkflowExecution) -> Result<(), ExecutionStoreError> {
        let metadata =
            serde_json::to_value(&execution.metadata).map_err(|e| {
                ExecutionStoreError::StorageFailed {
                    reason: format!("metadata serialization failed: {e}"),
                }
            })?;
        sqlx::query(
            r#"
            INSERT INTO workflow_executions
                (id, rule_id, transaction_id, status, retry_count,
                 executed_at, completed_at, next_retry_at, error_message, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(execution.id.to_string())
        .bind(execution.rule_id.to_string())
        .bind(execution.transaction_id.to_string())
        .bind(execution.status.as_str())
        .bind(i32::try_from(execution.retry_count).unwrap_or(i32::MAX))
        .bind(execution.executed_at)
        .bind(execution.completed_at)
        .bind(execution.next_retry_at)
        .bind(&execution.error_message)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(storage_failed)?;

        Ok(())
    }

    async fn get(&self, id: ExecutionId) -> Result<WorkflowExecution, ExecutionStoreError> {
        let row: Option<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM workflow_executions WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_failed)?;

        match row {
            Some(row) => row.try_into_record(),
            None => Err(ExecutionStoreError::NotFound { id }),
        }
    }

    async fn update(&self, execution: &WorkflowExecution) -> Result<(), ExecutionStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = $2, retry_count = $3, completed_at = $4,
                next_retry_at = $5, error_message = $6
            WHERE id = $1
            "#,
        )
        .bind(execution.id.to_string())
        .bind(execution.status.as_str())
        .bind(i32::try_from(execution.retry_count).unwrap_or(i32::MAX))
        .bind(execution.completed_at)
        .bind(execution.next_retry_at)
        .bind(&execution.error_message)
        .execute(&self.pool)
        .await
        .map_err(storage_failed)?;

        if result.rows_affected() == 0 {
            return Err(ExecutionStoreError::NotFound { id: execution.id });
        }
        Ok(())
    }

    async fn claim_for_attempt(
        &self,
        id: ExecutionId,
    ) -> Result<Option<WorkflowExecution>, ExecutionStoreError> {
        // Conditional write: the row is claimed only while still in a
        // retryable status, so racing retries cannot both run.
        let row: Option<ExecutionRow> = sqlx::query_as(&format!(
            r#"
            UPDATE workflow_executions
            SET status = 'running', next_retry_at = NULL
            WHERE id = $1 AND status IN ('retrying', 'failed')
            RETURNING {EXECUTION_COLUMNS}
            "#
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_failed)?;

        row.map(ExecutionRow::try_into_record).transpose()
    }

    async fn list(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<WorkflowExecution>, ExecutionStoreError> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {EXECUTION_COLUMNS}
            FROM workflow_executions
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR rule_id = $2)
              AND ($3::text IS NULL OR transaction_id = $3)
            ORDER BY executed_at DESC
            "#
        ))
        .bind(filter.status.map(|s| s.as_str().to_string()))
        .bind(filter.rule_id.map(|r| r.to_string()))
        .bind(filter.transaction_id.map(|t| t.to_string()))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_failed)?;

        rows.into_iter().map(|r| r.try_into_record()).collect()
    }

    async fn due_retries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExecutionId>, ExecutionStoreError> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM workflow_executions
            WHERE status = 'retrying' AND next_retry_at <= $1
            ORDER BY next_retry_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_failed)?;

        ids.iter()
            .map(|id| {
                ExecutionId::from_str(id).map_err(|e| ExecutionStoreError::StorageFailed {
                    reason: decode_reason("execution id", id, e),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(status: &str, retry_count: i32) -> ExecutionRow {
        ExecutionRow {
            id: ExecutionId::new().to_string(),
            rule_id: RuleId::new().to_string(),
            transaction_id: TransactionId::new().to_string(),
            status: status.to_string(),
            retry_count,
            executed_at: Utc::now(),
            completed_at: None,
            next_retry_at: None,
            error_message: None,
            metadata: json!({
                "rule_name": "Under contract kickoff",
                "trigger_context": {"new_status": "under_contract"},
            }),
        }
    }

    #[test]
    fn row_converts_to_record() {
        let record = row("retrying", 2).try_into_record().expect("valid row");
        assert_eq!(record.status, ExecutionStatus::Retrying);
        assert_eq!(record.retry_count, 2);
        assert_eq!(record.metadata.rule_name, "Under contract kickoff");
    }

    #[test]
    fn unknown_status_is_a_storage_error() {
        let err = row("exploded", 0).try_into_record().unwrap_err();
        assert!(err.to_string().contains("execution status"));
    }

    #[test]
    fn bad_id_is_a_storage_error() {
        let mut bad = row("pending", 0);
        bad.rule_id = "not-a-ulid".to_string();
        let err = bad.try_into_record().unwrap_err();
        assert!(err.to_string().contains("rule id"));
    }

    #[test]
    fn negative_retry_count_is_a_storage_error() {
        let err = row("pending", -1).try_into_record().unwrap_err();
        assert!(err.to_string().contains("retry count"));
    }
}
