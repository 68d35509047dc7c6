//! Error types for the automation crate.
//!
//! Errors are layered the same way the seams are:
//! - Per-seam errors (`ExecutionStoreError`, `TemplateError`, ...) carry
//!   only information available at that boundary.
//! - `AttemptError` is what a single execution attempt can fail with; it
//!   feeds the retry accounting in the manager.
//! - `ExecutionError` and `DispatchError` are the manager/dispatcher
//!   surface errors.

use closetrack_core::{ExecutionId, RuleId, TemplateId, TransactionId};
use std::fmt;

/// Errors from execution ledger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStoreError {
    /// Execution record not found.
    NotFound { id: ExecutionId },
    /// Storage operation failed.
    StorageFailed { reason: String },
}

impl fmt::Display for ExecutionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "execution not found: {id}"),
            Self::StorageFailed { reason } => {
                write!(f, "execution storage failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ExecutionStoreError {}

/// Errors from rule lookup operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleStoreError {
    /// Rule not found.
    NotFound { id: RuleId },
    /// Storage operation failed.
    StorageFailed { reason: String },
}

impl fmt::Display for RuleStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "rule not found: {id}"),
            Self::StorageFailed { reason } => write!(f, "rule storage failed: {reason}"),
        }
    }
}

impl std::error::Error for RuleStoreError {}

/// Errors from template application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Template not found.
    NotFound { template_id: TemplateId },
    /// Template application failed.
    ApplyFailed {
        template_id: TemplateId,
        reason: String,
    },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { template_id } => {
                write!(f, "workflow template not found: {template_id}")
            }
            Self::ApplyFailed {
                template_id,
                reason,
            } => {
                write!(f, "failed to apply template {template_id}: {reason}")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Errors from transaction snapshot reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionReadError {
    /// Transaction not found.
    NotFound { id: TransactionId },
    /// Read failed.
    ReadFailed { reason: String },
}

impl fmt::Display for TransactionReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "transaction not found: {id}"),
            Self::ReadFailed { reason } => write!(f, "transaction read failed: {reason}"),
        }
    }
}

impl std::error::Error for TransactionReadError {}

/// Errors from the notification sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Insert failed.
    InsertFailed { reason: String },
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsertFailed { reason } => write!(f, "notification insert failed: {reason}"),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Errors from the audit log sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// Append failed.
    AppendFailed { reason: String },
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppendFailed { reason } => write!(f, "audit append failed: {reason}"),
        }
    }
}

impl std::error::Error for AuditError {}

/// Failure of a single execution attempt.
///
/// Every variant routes through the manager's retry accounting; the
/// rendered message is what lands in the ledger's `error_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// Template lookup or application failed.
    Template(TemplateError),
    /// Ledger read/write failed mid-attempt.
    Ledger(ExecutionStoreError),
    /// A retry-path lookup (rule or transaction) failed.
    RetryLookup { reason: String },
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(e) => write!(f, "{e}"),
            Self::Ledger(e) => write!(f, "{e}"),
            Self::RetryLookup { reason } => write!(f, "retry lookup failed: {reason}"),
        }
    }
}

impl std::error::Error for AttemptError {}

impl From<TemplateError> for AttemptError {
    fn from(e: TemplateError) -> Self {
        Self::Template(e)
    }
}

impl From<ExecutionStoreError> for AttemptError {
    fn from(e: ExecutionStoreError) -> Self {
        Self::Ledger(e)
    }
}

/// Errors from execution manager operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Ledger operation failed before an attempt could be accounted.
    Store(ExecutionStoreError),
    /// The execution is not in a retryable state.
    NotRetryable {
        id: ExecutionId,
        status: &'static str,
    },
    /// A manual retry could not resolve its rule or transaction.
    LookupFailed { id: ExecutionId, reason: String },
    /// Invalid status transition.
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "execution store error: {e}"),
            Self::NotRetryable { id, status } => {
                write!(f, "execution {id} is not retryable from status '{status}'")
            }
            Self::LookupFailed { id, reason } => {
                write!(f, "retry lookup failed for execution {id}: {reason}")
            }
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid execution transition from '{from}' to '{to}'")
            }
        }
    }
}

impl std::error::Error for ExecutionError {}

impl From<ExecutionStoreError> for ExecutionError {
    fn from(e: ExecutionStoreError) -> Self {
        Self::Store(e)
    }
}

/// Errors from trigger dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Rule lookup failed.
    Rules(RuleStoreError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rules(e) => write!(f, "rule lookup failed: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<RuleStoreError> for DispatchError {
    fn from(e: RuleStoreError) -> Self {
        Self::Rules(e)
    }
}
