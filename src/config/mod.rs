//! # Configuration Management
//!
//! Configuration for the Strongbox host, read from `STRONGBOX_*`
//! environment variables and validated with `validator`.

pub mod settings;

pub use settings::{
    AppConfig, ObservabilityConfig, RollbackConfig, DEFAULT_MAX_REQUEST_DURATION_SECS,
    DEFAULT_ROLLBACK_PERIOD_SECS,
};
