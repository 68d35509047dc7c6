//! Postgres implementations of the automation engine's seams.
//!
//! Every repository wraps a `PgPool` (cheap to clone) and converts rows
//! through a `FromRow` struct plus `try_into_record`, so a corrupt row
//! surfaces as a storage error instead of a panic.

pub mod audit;
pub mod executions;
pub mod notifications;
pub mod rules;
pub mod templates;
pub mod transactions;

pub use audit::PgAuditSink;
pub use executions::PgExecutionStore;
pub use notifications::PgNotificationSink;
pub use rules::PgRuleStore;
pub use templates::PgTemplateApplicator;
pub use transactions::PgTransactionReader;

/// Formats a row-decode failure for a storage error reason.
pub(crate) fn decode_reason(field: &str, value: &str, err: impl std::fmt::Display) -> String {
    format!("invalid {field} '{value}': {err}")
}
