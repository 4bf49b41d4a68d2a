//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::*;
use std::time::Duration;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") {
            LogFormat::Text
        } else {
            LogFormat::Json
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Name reported on events (`CONTROLLER_NAME`)
    pub controller_name: String,
    /// Requeue interval once a cluster has converged (`RESYNC_INTERVAL_SECS`)
    pub resync_interval_secs: u64,
    /// Delay applied when a facet asks to be requeued immediately (`SECRET_WAIT_REQUEUE_SECS`)
    pub secret_wait_requeue_secs: u64,
    /// Fibonacci backoff bounds after failed passes (`BACKOFF_MIN_SECS`, `BACKOFF_MAX_SECS`)
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    /// Upper bound on clusters reconciled at the same time (`MAX_CONCURRENT_RECONCILIATIONS`)
    pub max_concurrent_reconciliations: u16,
    /// Port of the metrics/probe server (`METRICS_PORT`)
    pub metrics_port: u16,
    /// Image override for the securityconfig update job (`SECURITYCONFIG_JOB_IMAGE`)
    pub securityconfig_job_image: Option<String>,
    /// `backoffLimit` of the update job (`SECURITYCONFIG_JOB_BACKOFF_LIMIT`)
    pub securityconfig_job_backoff_limit: i32,
    /// `ttlSecondsAfterFinished` of the update job (`SECURITYCONFIG_JOB_TTL_SECS`)
    pub securityconfig_job_ttl_secs: i32,
    /// Global log level (`LOG_LEVEL`), used when `RUST_LOG` is not set
    pub log_level: String,
    /// Log format (`LOG_FORMAT`: json, text)
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            controller_name: DEFAULT_CONTROLLER_NAME.to_string(),
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            secret_wait_requeue_secs: DEFAULT_SECRET_WAIT_REQUEUE_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            metrics_port: DEFAULT_METRICS_PORT,
            securityconfig_job_image: None,
            securityconfig_job_backoff_limit: DEFAULT_SECURITYCONFIG_JOB_BACKOFF_LIMIT,
            securityconfig_job_ttl_secs: DEFAULT_SECURITYCONFIG_JOB_TTL_SECS,
            log_level: "INFO".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str, default: u64| -> u64 {
            lookup(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        };
        Self {
            controller_name: lookup("CONTROLLER_NAME")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.controller_name),
            resync_interval_secs: parsed("RESYNC_INTERVAL_SECS", defaults.resync_interval_secs),
            secret_wait_requeue_secs: parsed(
                "SECRET_WAIT_REQUEUE_SECS",
                defaults.secret_wait_requeue_secs,
            ),
            backoff_min_secs: parsed("BACKOFF_MIN_SECS", defaults.backoff_min_secs),
            backoff_max_secs: parsed("BACKOFF_MAX_SECS", defaults.backoff_max_secs),
            max_concurrent_reconciliations: lookup("MAX_CONCURRENT_RECONCILIATIONS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_concurrent_reconciliations),
            metrics_port: lookup("METRICS_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.metrics_port),
            securityconfig_job_image: lookup("SECURITYCONFIG_JOB_IMAGE").filter(|v| !v.is_empty()),
            securityconfig_job_backoff_limit: lookup("SECURITYCONFIG_JOB_BACKOFF_LIMIT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.securityconfig_job_backoff_limit),
            securityconfig_job_ttl_secs: lookup("SECURITYCONFIG_JOB_TTL_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.securityconfig_job_ttl_secs),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map_or(defaults.log_format, |v| LogFormat::parse(&v)),
        }
    }

    /// Get resync interval duration
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Get secret wait requeue duration
    pub fn secret_wait_requeue(&self) -> Duration {
        Duration::from_secs(self.secret_wait_requeue_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = ControllerConfig::from_lookup(|_| None);
        assert_eq!(config.controller_name, "opensearch-operator");
        assert_eq!(config.resync_interval(), Duration::from_secs(300));
        assert_eq!(config.secret_wait_requeue(), Duration::from_secs(10));
        assert_eq!(config.securityconfig_job_image, None);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("RESYNC_INTERVAL_SECS", "60"),
            ("METRICS_PORT", "9090"),
            ("SECURITYCONFIG_JOB_IMAGE", "registry.local/opensearch:2.11.0"),
            ("LOG_FORMAT", "TEXT"),
        ]));
        assert_eq!(config.resync_interval_secs, 60);
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(
            config.securityconfig_job_image.as_deref(),
            Some("registry.local/opensearch:2.11.0")
        );
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("RESYNC_INTERVAL_SECS", "five minutes"),
            ("MAX_CONCURRENT_RECONCILIATIONS", "-1"),
            ("SECURITYCONFIG_JOB_IMAGE", ""),
        ]));
        assert_eq!(config.resync_interval_secs, 300);
        assert_eq!(config.max_concurrent_reconciliations, 10);
        assert_eq!(config.securityconfig_job_image, None);
    }
}
