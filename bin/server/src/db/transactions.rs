//! Postgres transaction reader.

use crate::db::decode_reason;
use async_trait::async_trait;
use closetrack_automation::{TransactionReadError, TransactionReader, TransactionSnapshot};
use closetrack_core::{TransactionId, UserId};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for snapshot queries.
#[derive(FromRow)]
struct TransactionRow {
    id: String,
    address: String,
    agent_id: String,
    status: String,
}

impl TransactionRow {
    fn try_into_snapshot(self) -> Result<TransactionSnapshot, TransactionReadError> {
        let id =
            TransactionId::from_str(&self.id).map_err(|e| TransactionReadError::ReadFailed {
                reason: decode_reason("transaction id", &self.id, e),
            })?;
        let agent_id =
            UserId::from_str(&self.agent_id).map_err(|e| TransactionReadError::ReadFailed {
                reason: decode_reason("agent id", &self.agent_id, e),
            })?;

        Ok(TransactionSnapshot {
            id,
            display_address: self.address,
            agent_id,
            status: self.status,
        })
    }
}

/// Postgres-backed transaction reader.
#[derive(Clone)]
pub struct PgTransactionReader {
    pool: PgPool,
}

impl PgTransactionReader {
    /// Creates a new reader.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionReader for PgTransactionReader {
    async fn snapshot(
        &self,
        id: TransactionId,
    ) -> Result<TransactionSnapshot, TransactionReadError> {
        let row: Option<TransactionRow> = sqlx::query_as(
            "SELECT id, address, agent_id, status FROM transactions WHERE id = $1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TransactionReadError::ReadFailed {
            reason: e.to_string(),
        })?;

        match row {
            Some(row) => row.try_into_snapshot(),
            None => Err(TransactionReadError::NotFound { id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_snapshot() {
        let row = TransactionRow {
            id: TransactionId::new().to_string(),
            address: "123 Main St".to_string(),
            agent_id: UserId::new().to_string(),
            status: "under_contract".to_string(),
        };
        let snapshot = row.try_into_snapshot().expect("valid row");
        assert_eq!(snapshot.display_address, "123 Main St");
    }
}
