//! # Strongbox
//!
//! Strongbox is the core of a secrets platform whose storage backends can fail
//! mid-operation. Failed operations may leave "partial secrets" behind that
//! were never returned to a caller but must still be purged. This crate
//! coordinates that cleanup.
//!
//! ## Architecture
//!
//! ```text
//! Core (seal/unseal) ──▶ RollbackManager ──▶ InflightRegistry (one attempt per path)
//!        │                     │                      │
//!   StateLock ◀── LockGrabber ─┘                      ▼
//!        │                                   Router ──▶ LogicalBackend
//!   Mount tables ──────────────────────────────▲
//! ```
//!
//! ## Core Components
//!
//! - **Rollback manager**: periodic sweep over every mount plus a synchronous
//!   "roll back now" entry point, with start/stop tied to unseal/seal
//! - **In-flight registry**: deduplicates attempts so concurrent triggers join
//! - **Lock grabber**: acquires the state lock in the background, abandonable
//!   when a caller already holds the lock on the attempt's behalf
//! - **Router**: resolves a namespace-qualified path to its backend
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use strongbox::{config::RollbackConfig, Core, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let core = Core::new(RollbackConfig::default());
//!     core.unseal().await?;
//!     // ... serve requests ...
//!     core.seal().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod errors;
pub mod logical;
pub mod mount;
pub mod namespace;
pub mod observability;
pub mod rollback;
pub mod router;
pub mod state_lock;

// Re-export commonly used types and traits
pub use crate::core::Core;
pub use config::AppConfig;
pub use errors::{Result, StrongboxError};
pub use rollback::{RollbackError, RollbackManager};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
