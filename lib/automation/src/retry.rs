//! Retry policy: bounded attempts with linear backoff.

use crate::error::AttemptError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Classification of an attempt failure.
///
/// Not-found failures consume retry budget exactly like transient ones;
/// the classification is kept so a fail-fast policy for permanently
/// invalid configuration stays a localized change in
/// [`RetryPolicy::should_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The rule references a template that does not exist.
    TemplateNotFound,
    /// Template application raised.
    TemplateApplication,
    /// Ledger read/write failed.
    Ledger,
    /// A retry-path lookup (execution, rule, or transaction) failed.
    RetryLookup,
}

impl AttemptError {
    /// Classifies this failure for the retry policy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Template(crate::error::TemplateError::NotFound { .. }) => {
                FailureKind::TemplateNotFound
            }
            Self::Template(_) => FailureKind::TemplateApplication,
            Self::Ledger(_) => FailureKind::Ledger,
            Self::RetryLookup { .. } => FailureKind::RetryLookup,
        }
    }
}

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum failure count before an execution is terminally failed.
    pub max_retries: u32,
    /// Base delay in milliseconds; attempt `n` waits `n * base`.
    pub base_delay_ms: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit limits.
    #[must_use]
    pub fn new(max_retries: u32, base_delay_ms: i64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
        }
    }

    /// Returns true if failure number `attempt` leaves a retry available.
    ///
    /// Every failure kind is treated uniformly.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, _kind: FailureKind) -> bool {
        attempt < self.max_retries
    }

    /// Returns the backoff delay before retry number `attempt` runs.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::milliseconds(self.base_delay_ms * i64::from(attempt))
    }

    /// Returns when retry number `attempt` becomes due.
    #[must_use]
    pub fn next_retry_at(&self, now: DateTime<Utc>, attempt: u32) -> DateTime<Utc> {
        now + self.delay(attempt)
    }

    /// Caps a failure count at the recordable maximum.
    #[must_use]
    pub fn recorded_attempt(&self, attempt: u32) -> u32 {
        attempt.min(self.max_retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateError;
    use closetrack_core::TemplateId;

    #[test]
    fn default_policy_limits() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay_ms, 1_000);
    }

    #[test]
    fn linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::milliseconds(1_000));
        assert_eq!(policy.delay(2), Duration::milliseconds(2_000));
        assert_eq!(policy.delay(3), Duration::milliseconds(3_000));
    }

    #[test]
    fn retry_budget() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1, FailureKind::TemplateApplication));
        assert!(policy.should_retry(2, FailureKind::TemplateApplication));
        assert!(!policy.should_retry(3, FailureKind::TemplateApplication));
        assert!(!policy.should_retry(4, FailureKind::TemplateApplication));
    }

    #[test]
    fn not_found_consumes_budget_like_transient() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.should_retry(2, FailureKind::TemplateNotFound),
            policy.should_retry(2, FailureKind::TemplateApplication),
        );
    }

    #[test]
    fn recorded_attempt_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.recorded_attempt(2), 2);
        assert_eq!(policy.recorded_attempt(3), 3);
        assert_eq!(policy.recorded_attempt(4), 3);
    }

    #[test]
    fn attempt_error_classification() {
        let template_id = TemplateId::new();
        let not_found = AttemptError::from(TemplateError::NotFound { template_id });
        assert_eq!(not_found.kind(), FailureKind::TemplateNotFound);

        let apply_failed = AttemptError::from(TemplateError::ApplyFailed {
            template_id,
            reason: "timeout".to_string(),
        });
        assert_eq!(apply_failed.kind(), FailureKind::TemplateApplication);

        let lookup = AttemptError::RetryLookup {
            reason: "rule missing".to_string(),
        };
        assert_eq!(lookup.kind(), FailureKind::RetryLookup);
    }
}
