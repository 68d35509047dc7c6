//! Shared application state.

use crate::config::AutomationConfig;
use crate::db::{
    PgAuditSink, PgExecutionStore, PgNotificationSink, PgRuleStore, PgTemplateApplicator,
    PgTransactionReader,
};
use crate::error::StartupError;
use closetrack_automation::{Dispatcher, ExecutionManager};
use closetrack_core::UserId;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;

/// The execution manager over the Postgres seams.
pub type AppManager = ExecutionManager<
    PgExecutionStore,
    PgRuleStore,
    PgTransactionReader,
    PgTemplateApplicator,
    PgNotificationSink,
    PgAuditSink,
>;

/// State shared across request handlers and the retry worker.
#[derive(Clone)]
pub struct AppState {
    /// The execution manager.
    pub manager: Arc<AppManager>,
    /// The trigger dispatcher.
    pub dispatcher: Arc<Dispatcher<PgRuleStore>>,
    /// Ledger access for listings.
    pub executions: PgExecutionStore,
    /// Rule access for listings and toggling.
    pub rules: PgRuleStore,
    /// Transaction access for event ingest.
    pub transactions: PgTransactionReader,
}

/// Resolves the automation system user from configuration.
///
/// A configured id must parse; without one a fresh id is generated for
/// this process.
fn automation_user(config: &AutomationConfig) -> closetrack_core::Result<UserId, StartupError> {
    let user = match &config.automation_user {
        Some(raw) => UserId::from_str(raw).map_err(|e| StartupError::InvalidAutomationUser {
            value: raw.clone(),
            reason: e.to_string(),
        })?,
        None => UserId::new(),
    };
    Ok(user)
}

impl AppState {
    /// Builds the state from a pool and automation settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured automation user id is invalid.
    pub fn new(
        pool: PgPool,
        config: &AutomationConfig,
    ) -> closetrack_core::Result<Self, StartupError> {
        let automation_user = automation_user(config)?;

        let manager = ExecutionManager::new(
            PgExecutionStore::new(pool.clone()),
            PgRuleStore::new(pool.clone()),
            PgTransactionReader::new(pool.clone()),
            PgTemplateApplicator::new(pool.clone()),
            PgNotificationSink::new(pool.clone()),
            PgAuditSink::new(pool.clone()),
            automation_user,
        )
        .with_policy(config.retry_policy());

        Ok(Self {
            manager: Arc::new(manager),
            dispatcher: Arc::new(Dispatcher::new(PgRuleStore::new(pool.clone()))),
            executions: PgExecutionStore::new(pool.clone()),
            rules: PgRuleStore::new(pool.clone()),
            transactions: PgTransactionReader::new(pool),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_automation_user_is_kept() {
        let id = UserId::new();
        let config = AutomationConfig {
            automation_user: Some(id.to_string()),
            ..Default::default()
        };
        assert_eq!(automation_user(&config).unwrap(), id);
    }

    #[test]
    fn unconfigured_automation_user_is_generated() {
        let config = AutomationConfig::default();
        assert!(automation_user(&config).is_ok());
    }

    #[test]
    fn malformed_automation_user_fails_startup() {
        let config = AutomationConfig {
            automation_user: Some("not-a-user".to_string()),
            ..Default::default()
        };
        let report = automation_user(&config).unwrap_err();
        assert!(format!("{report:?}").contains("not-a-user"));
    }
}
