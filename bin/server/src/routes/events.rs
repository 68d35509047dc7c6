//! Trigger-event ingest.
//!
//! Platform services report domain events here; matching rules are
//! dispatched synchronously and the created executions returned. An
//! execution that failed its first attempt is still returned; its retry
//! proceeds in the background.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use closetrack_automation::{ExecutionOutcome, TransactionReader, TriggerContext, TriggerEvent};
use closetrack_core::TransactionId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Routes under `/api/automation/events`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/automation/events", post(ingest_event))
}

/// Request body for event ingest.
#[derive(Debug, Deserialize)]
pub struct IngestEventRequest {
    /// Event type, storage form (`status_change`, ...).
    pub event: String,
    /// The transaction the event occurred on.
    pub transaction_id: String,
    /// Event payload matched against rule conditions.
    #[serde(default)]
    pub trigger_data: serde_json::Value,
}

/// Response body for event ingest.
#[derive(Debug, Serialize)]
pub struct IngestEventResponse {
    /// One outcome per matched rule.
    pub executions: Vec<ExecutionOutcome>,
}

/// POST /api/automation/events
async fn ingest_event(
    State(state): State<AppState>,
    Json(request): Json<IngestEventRequest>,
) -> Result<(StatusCode, Json<IngestEventResponse>), ApiError> {
    let event = TriggerEvent::parse(&request.event)
        .ok_or_else(|| ApiError::bad_request(format!("unknown event '{}'", request.event)))?;
    let transaction_id = TransactionId::from_str(&request.transaction_id)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let snapshot = state.transactions.snapshot(transaction_id).await?;
    let context = TriggerContext::new(snapshot, request.trigger_data);

    let outcomes = state
        .dispatcher
        .dispatch(event, &context, &state.manager)
        .await?;
    tracing::info!(
        event = event.as_str(),
        transaction = %transaction_id,
        executions = outcomes.len(),
        "trigger event dispatched"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestEventResponse {
            executions: outcomes,
        }),
    ))
}
