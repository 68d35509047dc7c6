//! Core domain types and utilities for the closetrack platform.
//!
//! This crate provides the foundational identifier types and error
//! handling shared by the transaction-coordination services.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{
    AuditEntryId, ExecutionId, NotificationId, RuleId, TaskId, TemplateId, TransactionId, UserId,
    WorkflowInstanceId,
};
