//! Rollback manager
//!
//! Periodically asks every mounted backend to purge partial secrets, and
//! serves synchronous "roll back now" requests. At most one attempt runs per
//! fully-qualified path; later triggers for the same path join it and share
//! its result.
//!
//! ## State lock handling
//!
//! Sweep-triggered attempts take the read side of the state lock themselves,
//! on a [`LockGrabber`] raced against shutdown and against the attempt's own
//! cancellation token. [`RollbackManager::rollback`] is called by a task that
//! already holds the state lock (read or write). It joins or creates the
//! attempt and then cancels the attempt's lock wait, so the attempt runs
//! under the caller's lock instead of queueing behind it. An attempt never
//! releases a lock it did not acquire.
//!
//! A caller of [`RollbackManager::rollback`] may receive the result of an
//! attempt that was started by the periodic sweep, including one that was
//! almost finished when the caller arrived. The contract is "a cleanup for
//! this path has completed", not "a cleanup ran exclusively for this call".

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn, Instrument};

use super::error::RollbackError;
use super::lock_grabber::{GrabOutcome, LockGrabber};
use super::state::{AttemptResult, AttemptState, InflightRegistry, Registration};
use crate::config::RollbackConfig;
use crate::logical::{LogicalError, Request, Response};
use crate::mount::MountEntry;
use crate::namespace::RequestContext;
use crate::observability::MetricsRecorder;
use crate::rollback_span;
use crate::router::Router;
use crate::state_lock::{StateLock, StateLockGuard};

/// Supplies the current mount entries. Called once per sweep; it takes
/// whatever locks protect the mount tables itself.
pub type MountsFn = Arc<dyn Fn() -> Vec<MountEntry> + Send + Sync>;

/// Lifecycle phase of a [`RollbackManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackPhase {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Metric key for a path: `/` is not allowed in our metric label scheme.
pub fn metrics_key(path: &str) -> String {
    path.replace('/', "-")
}

struct Shared {
    backends: MountsFn,
    router: Arc<Router>,
    state_lock: StateLock,
    period: Duration,
    max_request_duration: Duration,
    registry: InflightRegistry,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    stop_ticker: CancellationToken,
    metrics: MetricsRecorder,
}

struct Lifecycle {
    phase: RollbackPhase,
    run_handle: Option<JoinHandle<()>>,
}

/// Coordinates rollback attempts across all mounts
pub struct RollbackManager {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
}

impl std::fmt::Debug for RollbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackManager")
            .field("period", &self.shared.period)
            .field("max_request_duration", &self.shared.max_request_duration)
            .field("inflight", &self.shared.registry.len())
            .field("shutdown", &self.shared.shutdown.is_cancelled())
            .finish()
    }
}

impl RollbackManager {
    pub fn new(
        config: &RollbackConfig,
        backends: MountsFn,
        router: Arc<Router>,
        state_lock: StateLock,
    ) -> Self {
        Self::with_durations(
            config.period(),
            config.max_request_duration(),
            backends,
            router,
            state_lock,
        )
    }

    /// Build a manager with explicit durations, bypassing config validation.
    /// Tests use sub-second periods through this.
    pub fn with_durations(
        period: Duration,
        max_request_duration: Duration,
        backends: MountsFn,
        router: Arc<Router>,
        state_lock: StateLock,
    ) -> Self {
        let shared = Shared {
            backends,
            router,
            state_lock,
            period,
            max_request_duration,
            registry: InflightRegistry::new(),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            stop_ticker: CancellationToken::new(),
            metrics: MetricsRecorder::new(),
        };
        Self {
            shared: Arc::new(shared),
            lifecycle: Mutex::new(Lifecycle { phase: RollbackPhase::Idle, run_handle: None }),
        }
    }

    /// Start the periodic sweep loop. Has no effect unless the manager is
    /// idle.
    pub async fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.phase != RollbackPhase::Idle {
            warn!(phase = ?lifecycle.phase, "Rollback manager already started");
            return;
        }
        let shared = Arc::clone(&self.shared);
        lifecycle.run_handle = Some(tokio::spawn(shared.run()));
        lifecycle.phase = RollbackPhase::Running;
    }

    /// Stop the manager and wait for all background work to finish.
    ///
    /// No new attempt is created once this begins. Returns after the sweep
    /// loop has exited and every attempt, whatever triggered it, has
    /// published its result. Safe to call repeatedly and concurrently.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if matches!(lifecycle.phase, RollbackPhase::Idle | RollbackPhase::Running) {
            lifecycle.phase = RollbackPhase::Stopping;
            self.shared.registry.close();
            self.shared.shutdown.cancel();

            if let Some(handle) = lifecycle.run_handle.take() {
                if let Err(e) = handle.await {
                    error!(error = %e, "Rollback sweep loop terminated abnormally");
                }
            }
        }

        self.shared.tracker.close();
        self.shared.tracker.wait().await;
        self.shared.metrics.set_inflight_rollbacks(0);
        lifecycle.phase = RollbackPhase::Stopped;
    }

    /// Pause the periodic trigger without affecting shutdown.
    ///
    /// Only for tests that need a backend's own periodic behaviour without
    /// racing the sweep.
    pub fn stop_ticker(&self) {
        self.shared.stop_ticker.cancel();
    }

    /// Roll back `path` now, or join the attempt already in flight for it.
    ///
    /// `path` is relative to the context's namespace. The `held` guard is
    /// proof that the caller holds the state lock; the attempt runs under
    /// that lock for its whole duration.
    pub async fn rollback(
        &self,
        ctx: &RequestContext,
        path: &str,
        held: &StateLockGuard,
    ) -> AttemptResult {
        let namespace = ctx.namespace().ok_or(RollbackError::NoNamespace)?;
        let full_path = namespace.qualify(path);
        debug!(
            path = %full_path,
            write_lock = held.is_write(),
            "rollback requested under caller's state lock"
        );

        let state = self.shared.start_or_lookup(ctx.clone(), &full_path, false);

        // Our lock covers the attempt; stop it waiting for its own.
        state.cancel_lock_grab();

        state.wait().await
    }

    pub async fn phase(&self) -> RollbackPhase {
        self.lifecycle.lock().await.phase
    }

    /// Number of attempts currently in flight
    pub fn inflight_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Whether an attempt is in flight for a fully-qualified path
    pub fn is_inflight(&self, full_path: &str) -> bool {
        self.shared.registry.contains(full_path)
    }

    /// Run one sweep immediately, outside the timer. Returns the number of
    /// paths for which an attempt was started or joined.
    pub async fn trigger_rollbacks(&self) -> usize {
        self.shared.trigger_rollbacks().await
    }
}

impl Shared {
    async fn run(self: Arc<Self>) {
        info!(period_secs = self.period.as_secs_f64(), "starting rollback manager");

        let period = self.period.max(Duration::from_millis(1));
        let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticker_stopped = false;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("stopping rollback manager");
                    return;
                }
                _ = self.stop_ticker.cancelled(), if !ticker_stopped => {
                    info!("stopping rollback manager ticker for tests");
                    ticker_stopped = true;
                }
                _ = tick.tick(), if !ticker_stopped => {
                    self.trigger_rollbacks().await;
                }
            }
        }
    }

    /// Start or join an attempt for every resolvable mount; never waits for
    /// the attempts themselves.
    async fn trigger_rollbacks(self: &Arc<Self>) -> usize {
        let backends = (self.backends)();
        self.metrics.record_rollback_sweep(backends.len());

        let mut triggered = 0;
        for entry in backends {
            let path = entry.route_path();
            let ctx = RequestContext::with_namespace(Arc::clone(&entry.namespace));

            // Filtered mounts resolve to no backend
            if self.router.matching_backend(&ctx, &path).await.is_none() {
                continue;
            }

            let full_path = entry.namespace.qualify(&path);
            self.start_or_lookup(ctx, &full_path, true);
            triggered += 1;
        }
        triggered
    }

    fn start_or_lookup(
        self: &Arc<Self>,
        ctx: RequestContext,
        full_path: &str,
        grab_state_lock: bool,
    ) -> Arc<AttemptState> {
        let registration = self.registry.start_or_join(
            full_path,
            || AttemptState::new(full_path, self.shutdown.child_token()),
            |state| {
                let shared = Arc::clone(self);
                let span = rollback_span!(full_path, grab_state_lock);
                self.tracker.spawn(
                    async move { shared.attempt_rollback(ctx, state, grab_state_lock).await }
                        .instrument(span),
                );
            },
        );

        match registration {
            Registration::Created(state) => {
                self.metrics.set_inflight_rollbacks(self.registry.len());
                state
            }
            Registration::Joined(state) => {
                debug!(path = %full_path, "joining in-flight rollback");
                state
            }
            Registration::Closed => {
                debug!(path = %full_path, "rollback manager shutting down, not starting attempt");
                Arc::new(AttemptState::finished(full_path, Err(RollbackError::ShuttingDown)))
            }
        }
    }

    async fn attempt_rollback(
        self: Arc<Self>,
        ctx: RequestContext,
        state: Arc<AttemptState>,
        grab_state_lock: bool,
    ) {
        let started = Instant::now();

        // A panicking backend must still publish and deregister, or every
        // joiner for this path waits forever.
        let work = {
            let shared = Arc::clone(&self);
            let state = Arc::clone(&state);
            async move { shared.execute(&ctx, &state, grab_state_lock).await }.in_current_span()
        };
        let result = match self.tracker.spawn(work).await {
            Ok(result) => result,
            Err(e) => {
                error!(path = %state.path(), error = %e, "rollback attempt aborted");
                Err(RollbackError::Logical(LogicalError::backend(format!(
                    "rollback panicked: {}",
                    e
                ))))
            }
        };

        self.metrics.record_rollback_attempt(
            &metrics_key(state.path()),
            started.elapsed().as_secs_f64(),
            result.is_ok(),
        );

        // Publish before deregistering: a joiner that wakes and triggers
        // again must be able to start a fresh attempt.
        state.complete(result);
        self.registry.remove(&state);
        self.metrics.set_inflight_rollbacks(self.registry.len());
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        state: &AttemptState,
        grab_state_lock: bool,
    ) -> AttemptResult {
        let Some(namespace) = ctx.namespace() else {
            error!(path = %state.path(), "rollback found no namespace");
            return Err(RollbackError::NoNamespace);
        };

        let request = Request::rollback(namespace.trimmed_path(state.path()));

        let mut held = None;
        if grab_state_lock {
            let grabber = LockGrabber::spawn(
                &self.tracker,
                self.state_lock.acquire_read(),
                state.lock_grab_cancel().clone(),
            );
            match grabber.lock_or_stop().await {
                GrabOutcome::Acquired(guard) => held = Some(guard),
                GrabOutcome::Stopped if self.shutdown.is_cancelled() => {
                    return Err(RollbackError::ShuttingDown);
                }
                GrabOutcome::Stopped => {
                    debug!(path = %state.path(), "state lock held by joining caller, proceeding under it");
                }
            }
        }

        // Fixed bound for every joiner alike; a caller's own deadline does
        // not shorten a shared attempt.
        let bounded = RequestContext::with_namespace(Arc::clone(namespace))
            .with_timeout(self.max_request_duration);
        let outcome = self.router.route(&bounded, request).await;
        drop(held);

        let result = interpret_outcome(outcome);
        if let Err(e) = &result {
            error!(path = %state.path(), error = %e, "error rolling back");
        }
        result
    }
}

/// Map a backend outcome to the attempt's terminal result.
///
/// Unsupported operations and read-only storage are steady-state
/// conditions, not failures.
fn interpret_outcome(outcome: Result<Response, LogicalError>) -> AttemptResult {
    match outcome {
        Err(LogicalError::UnsupportedOperation) => Ok(()),
        Err(e) if e.is_read_only() => Ok(()),
        Err(e) => Err(RollbackError::Logical(e)),
        Ok(response) => {
            if let Some(e) = response.error() {
                if !e.is_read_only() {
                    warn!(error = %e, "backend reported an error in its rollback response");
                }
            }
            Ok(())
        }
    }
}
