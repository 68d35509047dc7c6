//! Workflow automation engine for the closetrack platform.
//!
//! This crate implements the rule-driven automation core:
//!
//! - **Rules**: trigger-event to workflow-template bindings ([`rule`])
//! - **Execution ledger**: one persistent record per automation attempt
//!   chain, with an explicit status state machine ([`execution`])
//! - **Execution manager**: applies a template to a transaction, notifies
//!   the responsible agent, and drives bounded retry with linear backoff
//!   ([`manager`])
//! - **Dispatch**: matches active rules against trigger events ([`dispatch`])
//!
//! Storage, template application, notifications, and audit logging are
//! trait seams implemented by the server crate.

pub mod context;
pub mod dispatch;
pub mod error;
pub mod execution;
pub mod manager;
pub mod retry;
pub mod rule;

pub use context::{TransactionSnapshot, TriggerContext};
pub use dispatch::Dispatcher;
pub use error::{
    AttemptError, AuditError, DispatchError, ExecutionError, ExecutionStoreError, NotifyError,
    RuleStoreError, TemplateError, TransactionReadError,
};
pub use execution::{ExecutionMetadata, ExecutionStatus, WorkflowExecution};
pub use manager::{
    AuditEntry, AuditSink, ExecutionFilter, ExecutionManager, ExecutionOutcome, ExecutionStore,
    NewNotification, NotificationSink, RuleStore, TemplateApplicator, TransactionReader,
};
pub use retry::{FailureKind, RetryPolicy};
pub use rule::{AutomationRule, TriggerEvent};
