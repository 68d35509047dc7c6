//! Execution manager: runs one matched rule against one transaction.
//!
//! The manager owns the full attempt chain for an execution:
//!
//! 1. Create the ledger row (`pending`), then mark it `running`.
//! 2. Apply the rule's workflow template to the transaction.
//! 3. Notify the transaction's responsible agent (best-effort).
//! 4. Mark the row `completed` and append an audit entry.
//!
//! Any failure in the core steps routes through the retry accounting:
//! with budget remaining the row moves to `retrying` with a
//! `next_retry_at` computed by the policy; otherwise it is terminally
//! `failed`. The row never stays `running` past an attempt.
//!
//! Retries are durable: the scheduled time lives on the ledger row and
//! [`ExecutionManager::run_retry`] re-fetches the execution, its rule,
//! and the target transaction fresh from the stores, reconstructing the
//! trigger context from persisted metadata.

use crate::context::{TransactionSnapshot, TriggerContext};
use crate::error::{
    AttemptError, AuditError, ExecutionError, ExecutionStoreError, NotifyError, RuleStoreError,
    TemplateError, TransactionReadError,
};
use crate::execution::{ExecutionMetadata, ExecutionStatus, WorkflowExecution};
use crate::retry::RetryPolicy;
use crate::rule::{AutomationRule, TriggerEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use closetrack_core::{ExecutionId, RuleId, TemplateId, TransactionId, UserId};
use serde::Serialize;
use serde_json::json;

/// Filter for ledger listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionFilter {
    /// Restrict to one status.
    pub status: Option<ExecutionStatus>,
    /// Restrict to one rule.
    pub rule_id: Option<RuleId>,
    /// Restrict to one transaction.
    pub transaction_id: Option<TransactionId>,
}

/// Persistent ledger of workflow executions.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Inserts a new execution row.
    async fn create(&self, execution: &WorkflowExecution) -> Result<(), ExecutionStoreError>;

    /// Fetches an execution by id.
    async fn get(&self, id: ExecutionId) -> Result<WorkflowExecution, ExecutionStoreError>;

    /// Updates an execution row by id.
    async fn update(&self, execution: &WorkflowExecution) -> Result<(), ExecutionStoreError>;

    /// Atomically claims an execution for a new attempt.
    ///
    /// Moves a `retrying` or `failed` row to `running` in a single
    /// conditional write and returns the claimed row. Returns `None`
    /// when the row is missing or no longer in a claimable status, so
    /// two racing retries of the same id cannot both proceed.
    async fn claim_for_attempt(
        &self,
        id: ExecutionId,
    ) -> Result<Option<WorkflowExecution>, ExecutionStoreError>;

    /// Lists executions matching a filter, most recent first.
    async fn list(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<WorkflowExecution>, ExecutionStoreError>;

    /// Lists executions in `retrying` status whose `next_retry_at` has passed.
    async fn due_retries(&self, now: DateTime<Utc>)
    -> Result<Vec<ExecutionId>, ExecutionStoreError>;
}

/// Read-only rule lookup.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Fetches a rule by id.
    async fn get(&self, id: RuleId) -> Result<AutomationRule, RuleStoreError>;

    /// Lists active rules for a trigger event.
    async fn list_active(&self, event: TriggerEvent)
    -> Result<Vec<AutomationRule>, RuleStoreError>;
}

/// External template application procedure.
///
/// Applying a template instantiates tasks/workflow state on the
/// transaction and returns the created workflow instance id. The call
/// must be safe to re-invoke with the same inputs, since retries do.
#[async_trait]
pub trait TemplateApplicator: Send + Sync {
    /// Applies `template_id` to `transaction_id` on behalf of `applied_by`.
    async fn apply(
        &self,
        transaction_id: TransactionId,
        template_id: TemplateId,
        applied_by: UserId,
    ) -> Result<closetrack_core::WorkflowInstanceId, TemplateError>;
}

/// Read access to transactions.
#[async_trait]
pub trait TransactionReader: Send + Sync {
    /// Fetches a snapshot of a transaction.
    async fn snapshot(&self, id: TransactionId) -> Result<TransactionSnapshot, TransactionReadError>;
}

/// A notification to be inserted, unread, for a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNotification {
    /// The recipient.
    pub user_id: UserId,
    /// The transaction the notification is about.
    pub transaction_id: TransactionId,
    /// Display message.
    pub message: String,
}

/// Sink for user-facing notifications.
///
/// Implementations insert the row with `is_read = false`. Delivery to
/// external channels (email/SMS) is downstream of this sink and out of
/// scope for the engine.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Inserts a notification row.
    async fn notify(&self, notification: NewNotification) -> Result<(), NotifyError>;
}

/// An append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    /// The acting user (the automation system user for engine writes).
    pub actor: UserId,
    /// Action verb.
    pub action: &'static str,
    /// Entity type.
    pub entity: &'static str,
    /// Entity id, display-formatted.
    pub entity_id: String,
    /// Structured details.
    pub details: serde_json::Value,
}

/// Append-only audit log.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends an entry.
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// The result of driving one execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    /// The ledger row this attempt belongs to.
    pub execution_id: ExecutionId,
    /// Status after the attempt.
    pub status: ExecutionStatus,
    /// The workflow instance created, on success.
    pub workflow_instance: Option<closetrack_core::WorkflowInstanceId>,
    /// The failure message, when the attempt failed.
    pub error: Option<String>,
}

/// Orchestrates rule executions against the boundary seams.
pub struct ExecutionManager<S, R, T, X, N, A>
where
    S: ExecutionStore,
    R: RuleStore,
    T: TransactionReader,
    X: TemplateApplicator,
    N: NotificationSink,
    A: AuditSink,
{
    executions: S,
    rules: R,
    transactions: T,
    templates: X,
    notifications: N,
    audit: A,
    policy: RetryPolicy,
    /// System user recorded as `applied_by` and audit actor.
    automation_user: UserId,
}

impl<S, R, T, X, N, A> ExecutionManager<S, R, T, X, N, A>
where
    S: ExecutionStore,
    R: RuleStore,
    T: TransactionReader,
    X: TemplateApplicator,
    N: NotificationSink,
    A: AuditSink,
{
    /// Creates a manager with the default retry policy.
    pub fn new(
        executions: S,
        rules: R,
        transactions: T,
        templates: X,
        notifications: N,
        audit: A,
        automation_user: UserId,
    ) -> Self {
        Self {
            executions,
            rules,
            transactions,
            templates,
            notifications,
            audit,
            policy: RetryPolicy::default(),
            automation_user,
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the retry policy in effect.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Executes a matched rule against its trigger context.
    ///
    /// Creates the ledger row and drives the first attempt. Attempt
    /// failures are recovered into the ledger and reported through the
    /// returned outcome's status, not as `Err`; `Err` means the ledger
    /// itself could not be driven.
    pub async fn execute_rule(
        &self,
        rule: &AutomationRule,
        context: &TriggerContext,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let metadata = ExecutionMetadata {
            rule_name: rule.name.clone(),
            trigger_context: context.trigger_data.clone(),
        };
        let mut execution =
            WorkflowExecution::new(rule.id, context.transaction_id, metadata);
        self.executions.create(&execution).await?;

        execution.mark_running()?;
        self.executions.update(&execution).await?;
        tracing::info!(
            execution = %execution.id,
            rule = %rule.id,
            transaction = %context.transaction_id,
            "automation execution started"
        );

        self.run_attempt(rule, context, execution).await
    }

    /// Re-runs an execution whose retry is due, or a failed execution the
    /// operator retried manually.
    ///
    /// State is re-fetched fresh from the stores; nothing is carried over
    /// from the attempt that scheduled the retry.
    pub async fn run_retry(&self, id: ExecutionId) -> Result<ExecutionOutcome, ExecutionError> {
        let execution = self.executions.get(id).await?;
        match execution.status {
            ExecutionStatus::Retrying | ExecutionStatus::Failed => {}
            status => {
                return Err(ExecutionError::NotRetryable {
                    id,
                    status: status.as_str(),
                });
            }
        }

        let rule = match self.rules.get(execution.rule_id).await {
            Ok(rule) => rule,
            Err(e) => return self.retry_lookup_failed(execution, e.to_string()).await,
        };
        let snapshot = match self.transactions.snapshot(execution.transaction_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.retry_lookup_failed(execution, e.to_string()).await,
        };
        let context =
            TriggerContext::reconstructed(snapshot, execution.metadata.trigger_context.clone());

        // The claim is a conditional write on the stored row; of two
        // racing retries only one gets past this point.
        let Some(execution) = self.executions.claim_for_attempt(id).await? else {
            let status = self.executions.get(id).await?.status;
            return Err(ExecutionError::NotRetryable {
                id,
                status: status.as_str(),
            });
        };
        tracing::info!(
            execution = %execution.id,
            attempt = execution.retry_count + 1,
            "automation retry started"
        );

        self.run_attempt(&rule, &context, execution).await
    }

    /// Lists executions whose scheduled retry has become due.
    pub async fn due_retries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExecutionId>, ExecutionError> {
        Ok(self.executions.due_retries(now).await?)
    }

    /// Runs the core attempt steps and settles the ledger row.
    async fn run_attempt(
        &self,
        rule: &AutomationRule,
        context: &TriggerContext,
        mut execution: WorkflowExecution,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let applied = self
            .templates
            .apply(context.transaction_id, rule.template_id, self.automation_user)
            .await;

        match applied {
            Ok(instance) => {
                self.send_notification(rule, context).await;

                let running = execution.clone();
                execution.complete()?;
                if let Err(e) = self.executions.update(&execution).await {
                    // Completion was not durably recorded; the stored row
                    // is still running, so settle the retained running
                    // copy through the retry accounting.
                    let mut execution = running;
                    return self
                        .handle_failure(&mut execution, AttemptError::Ledger(e))
                        .await;
                }

                self.record_audit(rule, &execution, instance).await;
                tracing::info!(
                    execution = %execution.id,
                    workflow_instance = %instance,
                    retry_count = execution.retry_count,
                    "automation execution completed"
                );
                Ok(ExecutionOutcome {
                    execution_id: execution.id,
                    status: execution.status,
                    workflow_instance: Some(instance),
                    error: None,
                })
            }
            Err(e) => {
                self.handle_failure(&mut execution, AttemptError::Template(e))
                    .await
            }
        }
    }

    /// Retry accounting for a failed attempt.
    ///
    /// The failure is durably recorded before any retry becomes visible
    /// to the scheduler: `next_retry_at` only exists on the stored row.
    async fn handle_failure(
        &self,
        execution: &mut WorkflowExecution,
        err: AttemptError,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let attempt = execution.retry_count + 1;
        let kind = err.kind();
        let message = err.to_string();

        if self.policy.should_retry(attempt, kind) {
            let next_retry_at = self.policy.next_retry_at(Utc::now(), attempt);
            execution.schedule_retry(message.clone(), attempt, next_retry_at)?;
            self.executions.update(execution).await?;
            tracing::warn!(
                execution = %execution.id,
                attempt,
                next_retry_at = %next_retry_at,
                error = %message,
                "automation attempt failed, retry scheduled"
            );
        } else {
            let recorded = self.policy.recorded_attempt(attempt);
            execution.fail(message.clone(), recorded)?;
            self.executions.update(execution).await?;
            tracing::error!(
                execution = %execution.id,
                retry_count = execution.retry_count,
                error = %message,
                "automation execution failed, retries exhausted"
            );
        }

        Ok(ExecutionOutcome {
            execution_id: execution.id,
            status: execution.status,
            workflow_instance: None,
            error: Some(message),
        })
    }

    /// Settles a scheduled retry whose rule or transaction lookup failed.
    ///
    /// For an automatic retry the failure still runs through the retry
    /// accounting. A manual retry of a `failed` execution surfaces the
    /// lookup error to the operator instead.
    async fn retry_lookup_failed(
        &self,
        mut execution: WorkflowExecution,
        reason: String,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        if execution.status == ExecutionStatus::Retrying {
            return self
                .handle_failure(&mut execution, AttemptError::RetryLookup { reason })
                .await;
        }
        Err(ExecutionError::LookupFailed {
            id: execution.id,
            reason,
        })
    }

    /// Notifies the transaction's responsible agent. Best-effort: failures
    /// are logged and never affect the execution's status.
    async fn send_notification(&self, rule: &AutomationRule, context: &TriggerContext) {
        let notification = NewNotification {
            user_id: context.transaction.agent_id,
            transaction_id: context.transaction_id,
            message: format!(
                "Automation '{}' applied a workflow to {}",
                rule.name, context.transaction.display_address
            ),
        };
        if let Err(e) = self.notifications.notify(notification).await {
            tracing::warn!(
                rule = %rule.id,
                transaction = %context.transaction_id,
                error = %e,
                "notification insert failed"
            );
        }
    }

    /// Appends the completion audit entry. Best-effort, like notifications.
    async fn record_audit(
        &self,
        rule: &AutomationRule,
        execution: &WorkflowExecution,
        instance: closetrack_core::WorkflowInstanceId,
    ) {
        let entry = AuditEntry {
            actor: self.automation_user,
            action: "update",
            entity: "workflow_execution",
            entity_id: execution.id.to_string(),
            details: json!({
                "rule_name": rule.name,
                "template_id": rule.template_id.to_string(),
                "workflow_instance_id": instance.to_string(),
                "transaction_id": execution.transaction_id.to_string(),
            }),
        };
        if let Err(e) = self.audit.append(entry).await {
            tracing::warn!(
                execution = %execution.id,
                error = %e,
                "audit append failed"
            );
        }
    }
}
