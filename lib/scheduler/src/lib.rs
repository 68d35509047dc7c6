//! Background retry scheduling for closetrack automation.
//!
//! Retries are durable: the due time lives on the execution's ledger row,
//! not in an in-process timer. This crate provides the polling worker
//! that periodically asks a [`RetryRunner`] for due executions and runs
//! them. Missed polls (crashes, restarts, deploys) lose nothing; the next
//! poll picks the rows up.

pub mod error;
pub mod worker;

pub use error::RunnerError;
pub use worker::{RetryRunner, RetryWorker};
