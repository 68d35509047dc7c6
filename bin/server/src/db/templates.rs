//! Postgres workflow template application.
//!
//! Applying a template copies the template's task definitions onto the
//! transaction as fresh `transaction_tasks` rows, all tagged with one
//! workflow-instance id. Re-invoking creates a new instance with its own
//! tag; the copy runs in a single database transaction so a half-applied
//! template never becomes visible.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use closetrack_automation::{TemplateApplicator, TemplateError};
use closetrack_core::{TaskId, TemplateId, TransactionId, UserId, WorkflowInstanceId};
use sqlx::{FromRow, PgPool};

/// Row type for template task queries.
#[derive(FromRow)]
struct TemplateTaskRow {
    title: String,
    description: Option<String>,
    due_in_days: Option<i32>,
    sort_order: i32,
}

fn apply_failed(template_id: TemplateId, e: impl std::fmt::Display) -> TemplateError {
    TemplateError::ApplyFailed {
        template_id,
        reason: e.to_string(),
    }
}

/// Postgres-backed template applicator.
#[derive(Clone)]
pub struct PgTemplateApplicator {
    pool: PgPool,
}

impl PgTemplateApplicator {
    /// Creates a new applicator.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateApplicator for PgTemplateApplicator {
    async fn apply(
        &self,
        transaction_id: TransactionId,
        template_id: TemplateId,
        applied_by: UserId,
    ) -> Result<WorkflowInstanceId, TemplateError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| apply_failed(template_id, e))?;

        let exists: Option<String> =
            sqlx::query_scalar("SELECT id FROM workflow_templates WHERE id = $1")
                .bind(template_id.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| apply_failed(template_id, e))?;
        if exists.is_none() {
            return Err(TemplateError::NotFound { template_id });
        }

        let tasks: Vec<TemplateTaskRow> = sqlx::query_as(
            r#"
            SELECT title, description, due_in_days, sort_order
            FROM template_tasks
            WHERE template_id = $1
            ORDER BY sort_order ASC
            "#,
        )
        .bind(template_id.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| apply_failed(template_id, e))?;

        let instance = WorkflowInstanceId::new();
        let now = Utc::now();
        for task in &tasks {
            let due_date = task
                .due_in_days
                .map(|days| now + Duration::days(i64::from(days)));
            sqlx::query(
                r#"
                INSERT INTO transaction_tasks
                    (id, transaction_id, workflow_instance_id, title, description,
                     due_date, sort_order, status, created_by, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9)
                "#,
            )
            .bind(TaskId::new().to_string())
            .bind(transaction_id.to_string())
            .bind(instance.to_string())
            .bind(&task.title)
            .bind(&task.description)
            .bind(due_date)
            .bind(task.sort_order)
            .bind(applied_by.to_string())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| apply_failed(template_id, e))?;
        }

        tx.commit().await.map_err(|e| apply_failed(template_id, e))?;
        tracing::debug!(
            template = %template_id,
            transaction = %transaction_id,
            workflow_instance = %instance,
            tasks = tasks.len(),
            "applied workflow template"
        );
        Ok(instance)
    }
}
