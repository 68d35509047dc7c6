//! Postgres notification sink.

use async_trait::async_trait;
use chrono::Utc;
use closetrack_automation::{NewNotification, NotificationSink, NotifyError};
use closetrack_core::NotificationId;
use sqlx::PgPool;

/// Postgres-backed notification sink.
///
/// Rows are inserted unread; delivery to external channels happens
/// downstream and is not this sink's concern.
#[derive(Clone)]
pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    /// Creates a new sink.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn notify(&self, notification: NewNotification) -> Result<(), NotifyError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, transaction_id, message, is_read, created_at)
            VALUES ($1, $2, $3, $4, FALSE, $5)
            "#,
        )
        .bind(NotificationId::new().to_string())
        .bind(notification.user_id.to_string())
        .bind(notification.transaction_id.to_string())
        .bind(&notification.message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| NotifyError::InsertFailed {
            reason: e.to_string(),
        })?;

        Ok(())
    }
}
