//! Postgres rule store.

use crate::db::decode_reason;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use closetrack_automation::{AutomationRule, RuleStore, RuleStoreError, TriggerEvent};
use closetrack_core::{RuleId, TemplateId};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for rule queries.
#[derive(FromRow)]
struct RuleRow {
    id: String,
    name: String,
    trigger_event: String,
    trigger_condition: serde_json::Value,
    template_id: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RuleRow {
    fn try_into_record(self) -> Result<AutomationRule, RuleStoreError> {
        let id = RuleId::from_str(&self.id).map_err(|e| RuleStoreError::StorageFailed {
            reason: decode_reason("rule id", &self.id, e),
        })?;
        let template_id =
            TemplateId::from_str(&self.template_id).map_err(|e| RuleStoreError::StorageFailed {
                reason: decode_reason("template id", &self.template_id, e),
            })?;
        let trigger_event = TriggerEvent::parse(&self.trigger_event).ok_or_else(|| {
            RuleStoreError::StorageFailed {
                reason: decode_reason("trigger event", &self.trigger_event, "unknown value"),
            }
        })?;

        Ok(AutomationRule {
            id,
            name: self.name,
            trigger_event,
            trigger_condition: self.trigger_condition,
            template_id,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn storage_failed(e: sqlx::Error) -> RuleStoreError {
    RuleStoreError::StorageFailed {
        reason: e.to_string(),
    }
}

const RULE_COLUMNS: &str =
    "id, name, trigger_event, trigger_condition, template_id, is_active, created_at, updated_at";

/// Postgres-backed rule store.
#[derive(Clone)]
pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    /// Creates a new store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists every rule, newest first.
    pub async fn list_all(&self) -> Result<Vec<AutomationRule>, RuleStoreError> {
        let rows: Vec<RuleRow> = sqlx::query_as(&format!(
            "SELECT {RULE_COLUMNS} FROM automation_rules ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_failed)?;

        rows.into_iter().map(|r| r.try_into_record()).collect()
    }

    /// Flips a rule's active flag and returns the updated rule.
    pub async fn toggle(&self, id: RuleId) -> Result<AutomationRule, RuleStoreError> {
        let row: Option<RuleRow> = sqlx::query_as(&format!(
            r#"
            UPDATE automation_rules
            SET is_active = NOT is_active, updated_at = NOW()
            WHERE id = $1
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_failed)?;

        match row {
            Some(row) => row.try_into_record(),
            None => Err(RuleStoreError::NotFound { id }),
        }
    }
}

#[async_trait]
impl RuleStore for PgRuleStore {
    async fn get(&self, id: RuleId) -> Result<AutomationRule, RuleStoreError> {
        let row: Option<RuleRow> = sqlx::query_as(&format!(
            "SELECT {RULE_COLUMNS} FROM automation_rules WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_failed)?;

        match row {
            Some(row) => row.try_into_record(),
            None => Err(RuleStoreError::NotFound { id }),
        }
    }

    async fn list_active(
        &self,
        event: TriggerEvent,
    ) -> Result<Vec<AutomationRule>, RuleStoreError> {
        let rows: Vec<RuleRow> = sqlx::query_as(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM automation_rules
            WHERE is_active AND trigger_event = $1
            ORDER BY created_at ASC
            "#
        ))
        .bind(event.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_failed)?;

        rows.into_iter().map(|r| r.try_into_record()).collect()
    }
}
