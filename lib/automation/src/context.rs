//! Trigger context: the event payload and transaction snapshot that
//! caused a rule to fire.
//!
//! A context is consumed once per execution attempt. The triggering
//! payload is persisted into the execution's metadata so retries can
//! reconstruct an equivalent context after the original event is gone.

use closetrack_core::{TransactionId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The subset of a transaction the automation engine needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    /// Transaction ID.
    pub id: TransactionId,
    /// Display address shown in notifications (e.g., "123 Main St").
    pub display_address: String,
    /// The agent responsible for this transaction.
    pub agent_id: UserId,
    /// Current transaction status.
    pub status: String,
}

/// The ephemeral context a rule fires with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerContext {
    /// The transaction the event occurred on.
    pub transaction_id: TransactionId,
    /// Snapshot of the transaction at trigger time.
    pub transaction: TransactionSnapshot,
    /// The event payload that caused the rule to fire.
    pub trigger_data: JsonValue,
}

impl TriggerContext {
    /// Creates a context from a transaction snapshot and event payload.
    #[must_use]
    pub fn new(transaction: TransactionSnapshot, trigger_data: JsonValue) -> Self {
        Self {
            transaction_id: transaction.id,
            transaction,
            trigger_data,
        }
    }

    /// Rebuilds a context for a retry from a fresh transaction snapshot
    /// and the trigger payload persisted in execution metadata.
    #[must_use]
    pub fn reconstructed(transaction: TransactionSnapshot, persisted_data: JsonValue) -> Self {
        Self::new(transaction, persisted_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> TransactionSnapshot {
        TransactionSnapshot {
            id: TransactionId::new(),
            display_address: "123 Main St".to_string(),
            agent_id: UserId::new(),
            status: "under_contract".to_string(),
        }
    }

    #[test]
    fn context_carries_transaction_id() {
        let snap = snapshot();
        let ctx = TriggerContext::new(snap.clone(), json!({"new_status": "under_contract"}));
        assert_eq!(ctx.transaction_id, snap.id);
        assert_eq!(ctx.trigger_data["new_status"], "under_contract");
    }

    #[test]
    fn reconstructed_context_preserves_payload() {
        let original = TriggerContext::new(snapshot(), json!({"document": "inspection.pdf"}));
        let rebuilt =
            TriggerContext::reconstructed(original.transaction.clone(), original.trigger_data.clone());
        assert_eq!(original, rebuilt);
    }
}
