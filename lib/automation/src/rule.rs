//! Automation rules: trigger-event to workflow-template bindings.
//!
//! Rules are authored by coordinators and read-only to the execution
//! engine; the only mutation the platform performs on them outside the
//! editor is the enable/disable toggle.

use chrono::{DateTime, Utc};
use closetrack_core::{RuleId, TemplateId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The event type a rule listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    /// A transaction's status changed.
    StatusChange,
    /// A document was uploaded to a transaction.
    DocumentUploaded,
    /// A tracked date (e.g., inspection deadline) was reached.
    DateReached,
    /// A transaction task was completed.
    TaskCompleted,
    /// Fired explicitly by a coordinator.
    Manual,
}

impl TriggerEvent {
    /// Returns the storage representation of this event.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusChange => "status_change",
            Self::DocumentUploaded => "document_uploaded",
            Self::DateReached => "date_reached",
            Self::TaskCompleted => "task_completed",
            Self::Manual => "manual",
        }
    }

    /// Parses the storage representation of an event.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "status_change" => Some(Self::StatusChange),
            "document_uploaded" => Some(Self::DocumentUploaded),
            "date_reached" => Some(Self::DateReached),
            "task_completed" => Some(Self::TaskCompleted),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// A configured automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRule {
    /// Unique identifier for this rule.
    pub id: RuleId,
    /// Human-readable label.
    pub name: String,
    /// The event type that fires this rule.
    pub trigger_event: TriggerEvent,
    /// Structured predicate evaluated against the trigger payload.
    ///
    /// A JSON object; every key/value pair must match the payload for the
    /// rule to apply. An empty object (or null) matches every payload.
    pub trigger_condition: JsonValue,
    /// The workflow template this rule applies.
    pub template_id: TemplateId,
    /// Whether this rule is currently dispatched.
    pub is_active: bool,
    /// When this rule was created.
    pub created_at: DateTime<Utc>,
    /// When this rule was last updated.
    pub updated_at: DateTime<Utc>,
}

impl AutomationRule {
    /// Creates a new active rule.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        trigger_event: TriggerEvent,
        trigger_condition: JsonValue,
        template_id: TemplateId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RuleId::new(),
            name: name.into(),
            trigger_event,
            trigger_condition,
            template_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Enables this rule.
    pub fn activate(&mut self) {
        self.is_active = true;
        self.updated_at = Utc::now();
    }

    /// Disables this rule.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    /// Returns true if this rule applies to the given event and payload.
    ///
    /// Inactive rules never match.
    #[must_use]
    pub fn matches(&self, event: TriggerEvent, trigger_data: &JsonValue) -> bool {
        self.is_active && self.trigger_event == event && self.condition_matches(trigger_data)
    }

    fn condition_matches(&self, trigger_data: &JsonValue) -> bool {
        match self.trigger_condition.as_object() {
            // Every condition entry must be present and equal in the payload.
            Some(condition) => condition
                .iter()
                .all(|(key, expected)| trigger_data.get(key) == Some(expected)),
            // No condition object means the rule matches unconditionally.
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status_rule(condition: JsonValue) -> AutomationRule {
        AutomationRule::new(
            "Under contract kickoff",
            TriggerEvent::StatusChange,
            condition,
            TemplateId::new(),
        )
    }

    #[test]
    fn rule_matches_event_and_condition() {
        let rule = status_rule(json!({"new_status": "under_contract"}));

        assert!(rule.matches(
            TriggerEvent::StatusChange,
            &json!({"new_status": "under_contract", "old_status": "active"}),
        ));
        assert!(!rule.matches(
            TriggerEvent::StatusChange,
            &json!({"new_status": "closed"}),
        ));
        assert!(!rule.matches(
            TriggerEvent::DocumentUploaded,
            &json!({"new_status": "under_contract"}),
        ));
    }

    #[test]
    fn empty_condition_matches_any_payload() {
        let rule = status_rule(json!({}));
        assert!(rule.matches(TriggerEvent::StatusChange, &json!({"anything": 1})));

        let rule = status_rule(JsonValue::Null);
        assert!(rule.matches(TriggerEvent::StatusChange, &json!({})));
    }

    #[test]
    fn inactive_rule_never_matches() {
        let mut rule = status_rule(json!({}));
        rule.deactivate();
        assert!(!rule.matches(TriggerEvent::StatusChange, &json!({})));

        rule.activate();
        assert!(rule.matches(TriggerEvent::StatusChange, &json!({})));
    }

    #[test]
    fn condition_requires_all_entries() {
        let rule = status_rule(json!({"new_status": "under_contract", "side": "buyer"}));

        assert!(rule.matches(
            TriggerEvent::StatusChange,
            &json!({"new_status": "under_contract", "side": "buyer", "extra": true}),
        ));
        assert!(!rule.matches(
            TriggerEvent::StatusChange,
            &json!({"new_status": "under_contract"}),
        ));
    }

    #[test]
    fn trigger_event_storage_roundtrip() {
        for event in [
            TriggerEvent::StatusChange,
            TriggerEvent::DocumentUploaded,
            TriggerEvent::DateReached,
            TriggerEvent::TaskCompleted,
            TriggerEvent::Manual,
        ] {
            assert_eq!(TriggerEvent::parse(event.as_str()), Some(event));
        }
        assert_eq!(TriggerEvent::parse("unknown"), None);
    }

    #[test]
    fn rule_serde_roundtrip() {
        let rule = status_rule(json!({"new_status": "closed"}));
        let json = serde_json::to_string(&rule).expect("serialize");
        let parsed: AutomationRule = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(rule, parsed);
    }
}
