//! Postgres audit log.

use async_trait::async_trait;
use chrono::Utc;
use closetrack_automation::{AuditEntry, AuditError, AuditSink};
use closetrack_core::AuditEntryId;
use sqlx::PgPool;

/// Postgres-backed append-only audit log.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    /// Creates a new sink.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, actor_id, action, entity_type, entity_id, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(AuditEntryId::new().to_string())
        .bind(entry.actor.to_string())
        .bind(entry.action)
        .bind(entry.entity)
        .bind(&entry.entity_id)
        .bind(&entry.details)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::AppendFailed {
            reason: e.to_string(),
        })?;

        Ok(())
    }
}
