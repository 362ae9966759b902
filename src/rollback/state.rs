//! Per-path attempt state and the in-flight registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::error::RollbackError;

/// Terminal result of one attempt
pub type AttemptResult = Result<(), RollbackError>;

/// State of one rollback attempt for one path.
///
/// Joiners share the same `Arc<AttemptState>` and all wake together when
/// [`AttemptState::complete`] publishes the result.
#[derive(Debug)]
pub struct AttemptState {
    path: String,
    done: watch::Sender<Option<AttemptResult>>,
    lock_grab_cancel: CancellationToken,
}

impl AttemptState {
    /// A fresh, pending attempt. `lock_grab_cancel` should be a child of the
    /// manager's shutdown token so that shutdown also stops the lock wait.
    pub fn new(path: impl Into<String>, lock_grab_cancel: CancellationToken) -> Self {
        let (done, _) = watch::channel(None);
        Self { path: path.into(), done, lock_grab_cancel }
    }

    /// An attempt that is already over, never registered.
    pub fn finished(path: impl Into<String>, result: AttemptResult) -> Self {
        let (done, _) = watch::channel(Some(result));
        Self { path: path.into(), done, lock_grab_cancel: CancellationToken::new() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Tell the attempt to stop waiting for the state lock because the
    /// caller already holds it.
    pub fn cancel_lock_grab(&self) {
        self.lock_grab_cancel.cancel();
    }

    pub fn lock_grab_cancel(&self) -> &CancellationToken {
        &self.lock_grab_cancel
    }

    /// Record the terminal result and release every waiter at once.
    ///
    /// Only the first call has an effect.
    pub fn complete(&self, result: AttemptResult) {
        self.done.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(result);
            true
        });
    }

    /// Wait for the attempt to finish and return its result.
    pub async fn wait(&self) -> AttemptResult {
        let mut rx = self.done.subscribe();
        let result = match rx.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone(),
            // The sender lives in `self`, so the channel cannot close while
            // we are borrowing it.
            Err(_) => None,
        };
        result.unwrap_or(Err(RollbackError::ShuttingDown))
    }
}

/// Outcome of [`InflightRegistry::start_or_join`]
#[derive(Debug)]
pub enum Registration {
    /// A new attempt was registered and started.
    Created(Arc<AttemptState>),
    /// An attempt was already in flight for the path.
    Joined(Arc<AttemptState>),
    /// The registry is closed; nothing was started.
    Closed,
}

#[derive(Debug, Default)]
struct RegistryInner {
    attempts: HashMap<String, Arc<AttemptState>>,
    closed: bool,
}

/// Mapping from fully-qualified path to its in-flight attempt.
///
/// Insert-if-absent and remove are the only mutations, each under a single
/// short-lived mutex that is never held across an await point.
#[derive(Debug, Default)]
pub struct InflightRegistry {
    inner: Mutex<RegistryInner>,
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the attempt for `path`, or register a new one built by
    /// `make_state` and hand it to `start` before the lock is released.
    ///
    /// Running `start` under the lock means the attempt is visible to
    /// joiners, and to [`InflightRegistry::close`], before its task can run.
    pub fn start_or_join<M, S>(&self, path: &str, make_state: M, start: S) -> Registration
    where
        M: FnOnce() -> AttemptState,
        S: FnOnce(Arc<AttemptState>),
    {
        let mut inner = self.lock();
        if let Some(existing) = inner.attempts.get(path) {
            return Registration::Joined(Arc::clone(existing));
        }
        if inner.closed {
            return Registration::Closed;
        }

        let state = Arc::new(make_state());
        inner.attempts.insert(path.to_string(), Arc::clone(&state));
        start(Arc::clone(&state));
        Registration::Created(state)
    }

    /// Remove `state` from the registry if it is still the entry for its
    /// path.
    pub fn remove(&self, state: &Arc<AttemptState>) -> bool {
        let mut inner = self.lock();
        match inner.attempts.get(state.path()) {
            Some(current) if Arc::ptr_eq(current, state) => {
                inner.attempts.remove(state.path());
                true
            }
            _ => false,
        }
    }

    /// Refuse all future registrations. Existing entries stay joinable
    /// until they complete.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().attempts.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.lock().attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().attempts.is_empty()
    }
}
