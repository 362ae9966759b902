//! # Structured Logging
//!
//! Subscriber setup and span helpers built on the tracing ecosystem.
//!
//! Log output honours `RUST_LOG` when set and falls back to the configured
//! level otherwise. JSON output is available for log shippers.

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Create a tracing span for one rollback attempt.
///
/// ```rust,ignore
/// let span = rollback_span!("team-a/secret/");
/// let span = rollback_span!("secret/", trigger = "periodic");
/// ```
#[macro_export]
macro_rules! rollback_span {
    ($path:expr) => {
        tracing::info_span!(
            "rollback_attempt",
            path = %$path,
            attempt_id = %uuid::Uuid::new_v4()
        )
    };
    ($path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "rollback_attempt",
            path = %$path,
            attempt_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global tracing subscriber.
///
/// Installing twice is not an error: the first subscriber stays in place,
/// which keeps tests that share a process from failing on setup.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_logs {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }

    Ok(())
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        rollback_period_secs = config.rollback.period_secs,
        max_request_duration_secs = config.rollback.max_request_duration_secs,
        log_level = %config.observability.log_level,
        json_logs = config.observability.json_logs,
        metrics_enabled = %config.observability.enable_metrics,
        "Strongbox configuration"
    );
}
