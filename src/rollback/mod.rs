//! Rollback coordination
//!
//! Backends can fail part-way through an operation and leave "partial
//! secrets" behind: data that was never returned to a caller but still has
//! to be purged. This module drives the backends' rollback operation:
//!
//! - **[`RollbackManager`]**: periodic sweep over all mounts, synchronous
//!   rollback entry point, start/stop lifecycle
//! - **[`InflightRegistry`]**: at most one attempt per path, joinable
//! - **[`LockGrabber`]**: cancellable acquisition of the state lock
//!
//! ```rust,ignore
//! let manager = RollbackManager::new(&config.rollback, mounts_fn, router, state_lock.clone());
//! manager.start().await;
//!
//! // Later, while holding the state lock:
//! let guard = state_lock.write().await;
//! manager.rollback(&ctx, "secret/", &guard).await?;
//!
//! manager.stop().await;
//! ```

pub mod error;
pub mod lock_grabber;
pub mod manager;
pub mod state;

pub use error::RollbackError;
pub use lock_grabber::{GrabOutcome, LockGrabber};
pub use manager::{metrics_key, MountsFn, RollbackManager, RollbackPhase};
pub use state::{AttemptResult, AttemptState, InflightRegistry, Registration};
