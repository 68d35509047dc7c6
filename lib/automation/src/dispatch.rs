//! Trigger dispatch: fan a platform event out to every matching rule.
//!
//! Dispatch is synchronous with the triggering request. Each matched
//! rule gets its own independent execution; one rule's failure is
//! recorded on its own ledger row and never blocks a sibling.

use crate::context::TriggerContext;
use crate::error::DispatchError;
use crate::manager::{
    AuditSink, ExecutionManager, ExecutionOutcome, ExecutionStore, NotificationSink, RuleStore,
    TemplateApplicator, TransactionReader,
};
use crate::rule::{AutomationRule, TriggerEvent};
use serde_json::Value as JsonValue;

/// Matches trigger events against the active rule set and runs the
/// matches through an [`ExecutionManager`].
pub struct Dispatcher<R>
where
    R: RuleStore,
{
    rules: R,
}

impl<R> Dispatcher<R>
where
    R: RuleStore,
{
    /// Creates a dispatcher over a rule store.
    pub fn new(rules: R) -> Self {
        Self { rules }
    }

    /// Returns the active rules matching an event and payload.
    pub async fn matching(
        &self,
        event: TriggerEvent,
        trigger_data: &JsonValue,
    ) -> Result<Vec<AutomationRule>, DispatchError> {
        let active = self.rules.list_active(event).await?;
        Ok(active
            .into_iter()
            .filter(|rule| rule.matches(event, trigger_data))
            .collect())
    }

    /// Executes every matching rule against the trigger context.
    ///
    /// Attempt failures land on each rule's own ledger row; a rule whose
    /// ledger could not be driven at all is logged and skipped so the
    /// remaining rules still run.
    pub async fn dispatch<S, M, T, X, N, A>(
        &self,
        event: TriggerEvent,
        context: &TriggerContext,
        manager: &ExecutionManager<S, M, T, X, N, A>,
    ) -> Result<Vec<ExecutionOutcome>, DispatchError>
    where
        S: ExecutionStore,
        M: RuleStore,
        T: TransactionReader,
        X: TemplateApplicator,
        N: NotificationSink,
        A: AuditSink,
    {
        let matched = self.matching(event, &context.trigger_data).await?;
        tracing::debug!(
            event = event.as_str(),
            transaction = %context.transaction_id,
            matched = matched.len(),
            "dispatching trigger event"
        );

        let mut outcomes = Vec::with_capacity(matched.len());
        for rule in &matched {
            match manager.execute_rule(rule, context).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(
                        rule = %rule.id,
                        transaction = %context.transaction_id,
                        error = %e,
                        "rule execution could not be driven"
                    );
                }
            }
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TransactionSnapshot;
    use crate::execution::ExecutionStatus;
    use crate::manager::test_support::*;
    use closetrack_core::{TemplateId, TransactionId, UserId};
    use serde_json::json;

    fn context() -> TriggerContext {
        let snapshot = TransactionSnapshot {
            id: TransactionId::new(),
            display_address: "42 Elm Ave".to_string(),
            agent_id: UserId::new(),
            status: "under_contract".to_string(),
        };
        TriggerContext::new(snapshot, json!({"new_status": "under_contract"}))
    }

    fn manager(
        executions: InMemoryExecutionStore,
        rules: InMemoryRuleStore,
        context: &TriggerContext,
    ) -> ExecutionManager<
        InMemoryExecutionStore,
        InMemoryRuleStore,
        InMemoryTransactionReader,
        ScriptedApplicator,
        RecordingNotificationSink,
        RecordingAuditSink,
    > {
        let transactions = InMemoryTransactionReader::new();
        transactions.insert(context.transaction.clone());
        ExecutionManager::new(
            executions,
            rules,
            transactions,
            ScriptedApplicator::succeeding(),
            RecordingNotificationSink::new(),
            RecordingAuditSink::new(),
            UserId::new(),
        )
    }

    #[tokio::test]
    async fn matching_filters_by_event_condition_and_active_flag() {
        let rules = InMemoryRuleStore::new();
        rules.insert(AutomationRule::new(
            "Under contract kickoff",
            TriggerEvent::StatusChange,
            json!({"new_status": "under_contract"}),
            TemplateId::new(),
        ));
        rules.insert(AutomationRule::new(
            "Closing prep",
            TriggerEvent::StatusChange,
            json!({"new_status": "closing"}),
            TemplateId::new(),
        ));
        let mut disabled = AutomationRule::new(
            "Disabled kickoff",
            TriggerEvent::StatusChange,
            json!({"new_status": "under_contract"}),
            TemplateId::new(),
        );
        disabled.deactivate();
        rules.insert(disabled);
        rules.insert(AutomationRule::new(
            "Document intake",
            TriggerEvent::DocumentUploaded,
            json!({}),
            TemplateId::new(),
        ));

        let dispatcher = Dispatcher::new(rules);
        let matched = dispatcher
            .matching(
                TriggerEvent::StatusChange,
                &json!({"new_status": "under_contract"}),
            )
            .await
            .unwrap();

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "Under contract kickoff");
    }

    #[tokio::test]
    async fn two_matching_rules_get_independent_executions() {
        let rules = InMemoryRuleStore::new();
        let first = AutomationRule::new(
            "Under contract kickoff",
            TriggerEvent::StatusChange,
            json!({"new_status": "under_contract"}),
            TemplateId::new(),
        );
        let second = AutomationRule::new(
            "Compliance checklist",
            TriggerEvent::StatusChange,
            json!({}),
            TemplateId::new(),
        );
        rules.insert(first.clone());
        rules.insert(second.clone());

        let executions = InMemoryExecutionStore::new();
        let ctx = context();
        let manager = manager(executions.clone(), rules.clone(), &ctx);
        let dispatcher = Dispatcher::new(rules);

        let outcomes = dispatcher
            .dispatch(TriggerEvent::StatusChange, &ctx, &manager)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.status == ExecutionStatus::Completed));

        let rows = executions.all();
        assert_eq!(rows.len(), 2);
        let mut rule_ids: Vec<_> = rows.iter().map(|r| r.rule_id).collect();
        rule_ids.sort();
        let mut expected = vec![first.id, second.id];
        expected.sort();
        assert_eq!(rule_ids, expected);
    }

    #[tokio::test]
    async fn one_failing_rule_does_not_block_a_sibling() {
        let rules = InMemoryRuleStore::new();
        rules.insert(AutomationRule::new(
            "First",
            TriggerEvent::DocumentUploaded,
            json!({}),
            TemplateId::new(),
        ));
        rules.insert(AutomationRule::new(
            "Second",
            TriggerEvent::DocumentUploaded,
            json!({}),
            TemplateId::new(),
        ));

        let executions = InMemoryExecutionStore::new();
        let ctx = context();
        let transactions = InMemoryTransactionReader::new();
        transactions.insert(ctx.transaction.clone());
        // The first template application fails; the second succeeds.
        let manager = ExecutionManager::new(
            executions.clone(),
            rules.clone(),
            transactions,
            ScriptedApplicator::with_script(vec![Err(crate::error::TemplateError::ApplyFailed {
                template_id: TemplateId::new(),
                reason: "timeout".to_string(),
            })]),
            RecordingNotificationSink::new(),
            RecordingAuditSink::new(),
            UserId::new(),
        );
        let dispatcher = Dispatcher::new(rules);

        let outcomes = dispatcher
            .dispatch(TriggerEvent::DocumentUploaded, &ctx, &manager)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        let statuses: Vec<_> = outcomes.iter().map(|o| o.status).collect();
        assert!(statuses.contains(&ExecutionStatus::Retrying));
        assert!(statuses.contains(&ExecutionStatus::Completed));
        assert_eq!(executions.all().len(), 2);
    }

    #[tokio::test]
    async fn no_matching_rules_dispatches_nothing() {
        let rules = InMemoryRuleStore::new();
        let executions = InMemoryExecutionStore::new();
        let ctx = context();
        let manager = manager(executions.clone(), rules.clone(), &ctx);
        let dispatcher = Dispatcher::new(rules);

        let outcomes = dispatcher
            .dispatch(TriggerEvent::DateReached, &ctx, &manager)
            .await
            .unwrap();

        assert!(outcomes.is_empty());
        assert!(executions.all().is_empty());
    }
}
