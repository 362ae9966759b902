//! # Configuration Settings
//!
//! Defines the configuration structure for the Strongbox host.

use crate::errors::{Result, StrongboxError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Default interval between periodic rollback sweeps
pub const DEFAULT_ROLLBACK_PERIOD_SECS: u64 = 60;

/// Default upper bound on a single backend request
pub const DEFAULT_MAX_REQUEST_DURATION_SECS: u64 = 90;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Rollback subsystem configuration
    #[validate(nested)]
    pub rollback: RollbackConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(StrongboxError::from)
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config =
            Self { rollback: RollbackConfig::from_env()?, observability: ObservabilityConfig::from_env()? };
        config.validate()?;
        Ok(config)
    }
}

/// Rollback subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RollbackConfig {
    /// Seconds between periodic sweeps
    #[validate(range(min = 1, max = 86400, message = "Rollback period must be between 1 second and 1 day"))]
    pub period_secs: u64,

    /// Seconds a single backend rollback call may run
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Max request duration must be between 1 and 3600 seconds"
    ))]
    pub max_request_duration_secs: u64,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            period_secs: DEFAULT_ROLLBACK_PERIOD_SECS,
            max_request_duration_secs: DEFAULT_MAX_REQUEST_DURATION_SECS,
        }
    }
}

impl RollbackConfig {
    /// Sweep period as Duration
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    /// Per-request bound as Duration
    pub fn max_request_duration(&self) -> Duration {
        Duration::from_secs(self.max_request_duration_secs)
    }

    /// Create RollbackConfig from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            period_secs: env_u64("STRONGBOX_ROLLBACK_PERIOD_SECS", DEFAULT_ROLLBACK_PERIOD_SECS)?,
            max_request_duration_secs: env_u64(
                "STRONGBOX_MAX_REQUEST_DURATION_SECS",
                DEFAULT_MAX_REQUEST_DURATION_SECS,
            )?,
        })
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Service name reported in logs and metrics
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Default log filter when `RUST_LOG` is unset
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Emit JSON formatted logs
    pub json_logs: bool,

    /// Enable metrics collection
    pub enable_metrics: bool,

    /// Prometheus exporter port (0 = no exporter)
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "strongbox".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            enable_metrics: false,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    /// Exporter bind address, if an exporter port is configured
    pub fn metrics_bind_address(&self) -> Option<String> {
        if self.metrics_port == 0 {
            None
        } else {
            Some(format!("0.0.0.0:{}", self.metrics_port))
        }
    }

    /// Create ObservabilityConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let log_level = std::env::var("STRONGBOX_LOG_LEVEL").unwrap_or(defaults.log_level);

        let json_logs = std::env::var("STRONGBOX_JSON_LOGS")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(defaults.json_logs);

        let enable_metrics = std::env::var("STRONGBOX_ENABLE_METRICS")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(defaults.enable_metrics);

        let metrics_port =
            env_u64("STRONGBOX_METRICS_PORT", u64::from(defaults.metrics_port))?;
        let metrics_port = u16::try_from(metrics_port).map_err(|_| {
            StrongboxError::config(format!("Invalid metrics port: {}", metrics_port))
        })?;

        Ok(Self {
            service_name: defaults.service_name,
            log_level,
            json_logs,
            enable_metrics,
            metrics_port,
        })
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| StrongboxError::config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
