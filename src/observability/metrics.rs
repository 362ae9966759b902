//! # Metrics Collection
//!
//! Rollback metrics through the `metrics` facade, with an optional
//! Prometheus exporter.

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use ::tracing::info;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics recorder for the rollback subsystem
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record one finished rollback attempt, keyed by sanitized path
    pub fn record_rollback_attempt(&self, path_key: &str, duration: f64, success: bool) {
        let path_labels = [("path", path_key.to_string())];
        histogram!("rollback_attempt_duration_seconds", &path_labels).record(duration);

        let status = if success { "success" } else { "error" };
        let labels = [("path", path_key.to_string()), ("status", status.to_string())];
        counter!("rollback_attempts_total", &labels).increment(1);
    }

    /// Update the gauge of attempts currently in flight
    pub fn set_inflight_rollbacks(&self, count: usize) {
        gauge!("rollback_inflight_attempts").set(count as f64);
    }

    /// Record one periodic sweep over `mount_count` mounts
    pub fn record_rollback_sweep(&self, mount_count: usize) {
        counter!("rollback_sweeps_total").increment(1);
        gauge!("rollback_sweep_mounts").set(mount_count as f64);
    }

    /// Register rollback metrics so exports appear before the first sweep.
    pub fn register_rollback_metrics(&self) {
        describe_histogram!(
            "rollback_attempt_duration_seconds",
            Unit::Seconds,
            "Duration of rollback attempts per mount path"
        );
        describe_counter!(
            "rollback_attempts_total",
            Unit::Count,
            "Rollback attempts grouped by path and outcome"
        );
        describe_gauge!(
            "rollback_inflight_attempts",
            Unit::Count,
            "Rollback attempts currently in flight"
        );
        describe_counter!("rollback_sweeps_total", Unit::Count, "Periodic rollback sweeps started");
        describe_gauge!(
            "rollback_sweep_mounts",
            Unit::Count,
            "Mounts enumerated by the most recent sweep"
        );

        counter!("rollback_sweeps_total").absolute(0);
        gauge!("rollback_inflight_attempts").set(0.0);
    }
}

/// Initialize metrics collection and, when enabled, the Prometheus exporter
pub async fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.enable_metrics {
        return Ok(());
    }

    let recorder = MetricsRecorder::new();

    #[cfg(feature = "prometheus")]
    {
        use crate::errors::StrongboxError;
        use ::tracing::warn;
        use metrics_exporter_prometheus::PrometheusBuilder;
        use std::net::SocketAddr;

        let metrics_addr = match config.metrics_bind_address() {
            Some(addr) => addr,
            None => {
                warn!("Metrics exporter disabled: no bind address configured");
                recorder.register_rollback_metrics();
                return Ok(());
            }
        };

        let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
            StrongboxError::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e))
        })?;

        PrometheusBuilder::new()
            .with_http_listener(socket_addr)
            .add_global_label("service", &config.service_name)
            .install()
            .map_err(|e| {
                StrongboxError::config(format!("Failed to initialize metrics exporter: {}", e))
            })?;

        info!(metrics_addr = %metrics_addr, "Prometheus exporter listening");
    }

    recorder.register_rollback_metrics();

    info!(service_name = %config.service_name, "Metrics collection initialized");

    Ok(())
}
