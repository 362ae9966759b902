//! Process-wide state lock
//!
//! A readers-writer lock over broad structural state (seal status, mount
//! tables). Guards are RAII: dropping a guard releases the lock.

use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Shared handle to the process-wide state lock
#[derive(Debug, Clone, Default)]
pub struct StateLock {
    lock: Arc<RwLock<()>>,
}

impl StateLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the read side
    pub async fn read(&self) -> StateLockGuard {
        StateLockGuard::Read(self.acquire_read().await)
    }

    /// Acquire the write side
    pub async fn write(&self) -> StateLockGuard {
        StateLockGuard::Write(Arc::clone(&self.lock).write_owned().await)
    }

    /// Raw read acquisition, suitable for handing to a background task.
    ///
    /// The returned future is cancel-safe: dropping it before completion
    /// leaves the lock untouched.
    pub fn acquire_read(&self) -> impl std::future::Future<Output = OwnedRwLockReadGuard<()>> + Send + 'static {
        Arc::clone(&self.lock).read_owned()
    }

    /// Non-blocking write attempt, used by tests to observe whether any
    /// reader or writer currently holds the lock.
    pub fn try_write(&self) -> Option<StateLockGuard> {
        Arc::clone(&self.lock).try_write_owned().ok().map(StateLockGuard::Write)
    }
}

/// Proof that the caller holds the state lock, in either mode.
#[derive(Debug)]
pub enum StateLockGuard {
    Read(OwnedRwLockReadGuard<()>),
    Write(OwnedRwLockWriteGuard<()>),
}

impl StateLockGuard {
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}
