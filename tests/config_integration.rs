//! Integration tests for configuration management
//!
//! These tests validate that the configuration system reads environment
//! variables and that the core honours the configured rollback settings.

use std::env;
use std::sync::Mutex;
use std::time::Duration;
use strongbox::config::{AppConfig, RollbackConfig};
use strongbox::{Core, Result, StrongboxError};
use tokio::time::timeout;

// Use a mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const VARS: [&str; 3] = [
    "STRONGBOX_ROLLBACK_PERIOD_SECS",
    "STRONGBOX_MAX_REQUEST_DURATION_SECS",
    "STRONGBOX_METRICS_PORT",
];

fn restore(saved: Vec<(&str, Option<String>)>) {
    for (key, value) in saved {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}

/// Test that configuration properly reads environment variables
#[test]
fn test_config_environment_integration() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    let saved: Vec<_> = VARS.iter().map(|k| (*k, env::var(k).ok())).collect();

    env::set_var("STRONGBOX_ROLLBACK_PERIOD_SECS", "30");
    env::set_var("STRONGBOX_MAX_REQUEST_DURATION_SECS", "15");
    let config = AppConfig::from_env()?;
    assert_eq!(config.rollback.period(), Duration::from_secs(30));
    assert_eq!(config.rollback.max_request_duration(), Duration::from_secs(15));

    // Out of range values fail validation
    env::set_var("STRONGBOX_ROLLBACK_PERIOD_SECS", "0");
    assert!(matches!(AppConfig::from_env(), Err(StrongboxError::Validation(_))));

    // Unparseable values are configuration errors
    env::set_var("STRONGBOX_ROLLBACK_PERIOD_SECS", "soon");
    assert!(matches!(AppConfig::from_env(), Err(StrongboxError::Config(_))));

    env::set_var("STRONGBOX_ROLLBACK_PERIOD_SECS", "30");
    env::set_var("STRONGBOX_METRICS_PORT", "70000");
    assert!(matches!(AppConfig::from_env(), Err(StrongboxError::Config(_))));

    restore(saved);
    Ok(())
}

/// Test that a core built from configuration unseals and seals cleanly
#[tokio::test]
async fn test_core_lifecycle_with_config() -> Result<()> {
    let config = RollbackConfig { period_secs: 1, max_request_duration_secs: 1 };
    let core = Core::new(config);

    core.unseal().await?;
    let manager = core.rollback_manager().await.expect("manager after unseal");
    assert_eq!(manager.inflight_count(), 0);

    timeout(Duration::from_secs(5), core.seal()).await.expect("seal should not hang")?;
    assert!(core.is_sealed());
    Ok(())
}
