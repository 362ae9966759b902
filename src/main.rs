use anyhow::{Context, Result};
use clap::Parser;
use strongbox::{
    config::AppConfig,
    observability::{init_observability, log_config_info},
    Core, APP_NAME, VERSION,
};
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "strongbox")]
#[command(about = "Strongbox secrets platform core")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Seconds between rollback sweeps (overrides STRONGBOX_ROLLBACK_PERIOD_SECS)
    #[arg(long)]
    rollback_period_secs: Option<u64>,

    /// Seconds a single rollback request may run
    #[arg(long)]
    max_request_duration_secs: Option<u64>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON formatted logs
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply(self, config: &mut AppConfig) {
        if let Some(period) = self.rollback_period_secs {
            config.rollback.period_secs = period;
        }
        if let Some(duration) = self.max_request_duration_secs {
            config.rollback.max_request_duration_secs = duration;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if self.json_logs {
            config.observability.json_logs = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (optional - won't fail if missing)
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let args = Args::parse();
    let mut config = AppConfig::from_env().context("failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    init_observability(&config.observability).await.context("failed to initialize observability")?;
    info!(app_name = APP_NAME, version = VERSION, "Starting Strongbox");
    log_config_info(&config);

    let core = Core::new(config.rollback.clone());
    core.unseal().await.context("failed to unseal")?;

    signal::ctrl_c().await.context("failed to install CTRL+C signal handler")?;
    info!("Shutdown signal received");

    if let Err(e) = core.seal().await {
        error!(error = %e, "Error sealing core");
        return Err(e.into());
    }

    info!("Strongbox shutdown completed");
    Ok(())
}
