//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{env_var_or_default, env_var_or_default_str};
use crate::constants::{
    DEFAULT_BACKOFF_MAX_MS, DEFAULT_BACKOFF_START_MS, DEFAULT_CONFLICT_RETRY_ATTEMPTS,
    DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS, DEFAULT_RESYNC_SECS,
    DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Requeue interval used by the error policy before backoff kicks in (seconds)
    pub reconciliation_error_requeue_secs: u64,
    /// Watch stream backoff starting value (milliseconds)
    pub backoff_start_ms: u64,
    /// Watch stream backoff maximum value (milliseconds)
    pub backoff_max_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Resync interval for converged projects (seconds)
    pub default_sync_interval_secs: u64,
    /// Read-modify-write attempts before a conflict is surfaced
    pub conflict_retry_attempts: u32,
    /// Namespace the controller runs in
    pub controller_namespace: String,
    /// Namespace to watch; empty means all namespaces
    pub watch_namespace: Option<String>,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            default_sync_interval_secs: DEFAULT_RESYNC_SECS,
            conflict_retry_attempts: DEFAULT_CONFLICT_RETRY_ATTEMPTS,
            controller_namespace: "octopilot-system".to_string(),
            watch_namespace: None,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            reconciliation_error_requeue_secs: env_var_or_default(
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                defaults.reconciliation_error_requeue_secs,
            ),
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", defaults.backoff_start_ms),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", defaults.backoff_max_ms),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                defaults.watch_restart_delay_after_end_secs,
            ),
            default_sync_interval_secs: std::env::var("DEFAULT_SYNC_INTERVAL")
                .ok()
                .and_then(|v| {
                    crate::controller::reconciler::validation::parse_kubernetes_duration(&v).ok()
                })
                .map_or(defaults.default_sync_interval_secs, |d| d.as_secs()),
            conflict_retry_attempts: env_var_or_default(
                "CONFLICT_RETRY_ATTEMPTS",
                defaults.conflict_retry_attempts,
            )
            .max(1),
            controller_namespace: env_var_or_default_str(
                "POD_NAMESPACE",
                &defaults.controller_namespace,
            ),
            watch_namespace: std::env::var("WATCH_NAMESPACE")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            log_level: env_var_or_default_str("LOG_LEVEL", &defaults.log_level),
            log_format: env_var_or_default_str("LOG_FORMAT", &defaults.log_format),
        }
    }

    /// Get watch stream backoff start duration
    #[must_use]
    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    /// Get watch stream backoff max duration
    #[must_use]
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Get steady-state resync duration
    #[must_use]
    pub fn default_sync_interval(&self) -> Duration {
        Duration::from_secs(self.default_sync_interval_secs)
    }

    /// Whether log output should be JSON
    #[must_use]
    pub fn json_logs(&self) -> bool {
        !self.log_format.eq_ignore_ascii_case("text")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.conflict_retry_attempts, 5);
        assert_eq!(config.default_sync_interval(), Duration::from_secs(300));
        assert!(config.watch_namespace.is_none());
        assert!(config.json_logs());
    }

    #[test]
    fn test_text_log_format() {
        let config = ControllerConfig {
            log_format: "TEXT".to_string(),
            ..Default::default()
        };
        assert!(!config.json_logs());
    }
}
