//! Centralized server configuration.
//!
//! Strongly-typed configuration loaded via the `config` crate from
//! environment variables, with a `__` separator for nesting
//! (`AUTOMATION__MAX_RETRIES=5`).

use closetrack_automation::RetryPolicy;
use serde::Deserialize;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Automation engine configuration.
    #[serde(default)]
    pub automation: AutomationConfig,
}

/// Automation engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AutomationConfig {
    /// Maximum failure count before an execution is terminally failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry backoff in milliseconds; attempt `n` waits `n * base`.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: i64,

    /// Interval between retry poll cycles, in seconds.
    #[serde(default = "default_retry_poll_interval_seconds")]
    pub retry_poll_interval_seconds: u64,

    /// The system user recorded as the actor of engine writes.
    /// Generated per-process when unset.
    #[serde(default)]
    pub automation_user: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> i64 {
    1_000
}

fn default_retry_poll_interval_seconds() -> u64 {
    5
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_poll_interval_seconds: default_retry_poll_interval_seconds(),
            automation_user: None,
        }
    }
}

impl AutomationConfig {
    /// Returns the retry policy these settings describe.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_delay_ms)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn automation_config_has_correct_defaults() {
        let config = AutomationConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay_ms, 1_000);
        assert_eq!(config.retry_poll_interval_seconds, 5);
        assert!(config.automation_user.is_none());
    }

    #[test]
    fn automation_config_builds_the_policy() {
        let config = AutomationConfig {
            max_retries: 5,
            retry_base_delay_ms: 250,
            ..Default::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay_ms, 250);
    }
}
