//! Automation rule and execution-ledger endpoints.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Router;
use closetrack_automation::{
    AutomationRule, ExecutionFilter, ExecutionOutcome, ExecutionStatus, ExecutionStore,
    WorkflowExecution,
};
use closetrack_core::{ExecutionId, RuleId, TransactionId};
use serde::Deserialize;
use std::str::FromStr;

/// Routes under `/api/automation`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/automation/rules", get(list_rules))
        .route("/api/automation/rules/{id}/toggle", post(toggle_rule))
        .route("/api/automation/executions", get(list_executions))
        .route("/api/automation/executions/{id}/retry", post(retry_execution))
}

/// GET /api/automation/rules
async fn list_rules(State(state): State<AppState>) -> Result<Json<Vec<AutomationRule>>, ApiError> {
    let rules = state.rules.list_all().await?;
    Ok(Json(rules))
}

/// POST /api/automation/rules/{id}/toggle
async fn toggle_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AutomationRule>, ApiError> {
    let id = RuleId::from_str(&id).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let rule = state.rules.toggle(id).await?;
    tracing::info!(rule = %rule.id, is_active = rule.is_active, "rule toggled");
    Ok(Json(rule))
}

/// Query parameters for the ledger listing.
#[derive(Debug, Default, Deserialize)]
pub struct ExecutionListQuery {
    status: Option<String>,
    rule_id: Option<String>,
    transaction_id: Option<String>,
}

impl ExecutionListQuery {
    fn try_into_filter(self) -> Result<ExecutionFilter, ApiError> {
        let status = self
            .status
            .map(|s| {
                ExecutionStatus::parse(&s)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown status '{s}'")))
            })
            .transpose()?;
        let rule_id = self
            .rule_id
            .map(|r| RuleId::from_str(&r).map_err(|e| ApiError::bad_request(e.to_string())))
            .transpose()?;
        let transaction_id = self
            .transaction_id
            .map(|t| {
                TransactionId::from_str(&t).map_err(|e| ApiError::bad_request(e.to_string()))
            })
            .transpose()?;

        Ok(ExecutionFilter {
            status,
            rule_id,
            transaction_id,
        })
    }
}

/// GET /api/automation/executions?status=&rule_id=&transaction_id=
async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ExecutionListQuery>,
) -> Result<Json<Vec<WorkflowExecution>>, ApiError> {
    let filter = query.try_into_filter()?;
    let executions = state.executions.list(&filter).await?;
    Ok(Json(executions))
}

/// POST /api/automation/executions/{id}/retry
async fn retry_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionOutcome>, ApiError> {
    let id = ExecutionId::from_str(&id).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let outcome = state.manager.run_retry(id).await?;
    Ok(Json(outcome))
}
