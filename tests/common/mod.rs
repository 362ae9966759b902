//! Common test utilities for all integration tests.
//!
//! Provides a scriptable logical backend and a harness that wires a
//! rollback manager to a router and state lock.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strongbox::logical::{LogicalBackend, LogicalError, Request, Response};
use strongbox::mount::MountEntry;
use strongbox::namespace::{Namespace, RequestContext};
use strongbox::rollback::{MountsFn, RollbackManager};
use strongbox::router::Router;
use strongbox::state_lock::StateLock;
use tokio::sync::watch;

/// Backend that records every request and answers with a fixed outcome.
///
/// A gated backend parks each call until [`MockBackend::release`] is
/// called, so tests can hold attempts mid-flight.
#[derive(Debug)]
pub struct MockBackend {
    calls: AtomicUsize,
    outcome: Result<Response, LogicalError>,
    gate: watch::Sender<bool>,
    requests: Mutex<Vec<Request>>,
}

impl MockBackend {
    pub fn new(outcome: Result<Response, LogicalError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcome,
            gate: watch::Sender::new(true),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::new(Ok(Response::default()))
    }

    /// A backend whose calls block until released
    pub fn gated(outcome: Result<Response, LogicalError>) -> Arc<Self> {
        let backend = Self::new(outcome);
        backend.gate.send_replace(false);
        backend
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogicalBackend for MockBackend {
    async fn handle_request(
        &self,
        _ctx: &RequestContext,
        request: Request,
    ) -> Result<Response, LogicalError> {
        self.requests.lock().unwrap().push(request);
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        self.outcome.clone()
    }

    fn backend_type(&self) -> &str {
        "mock"
    }
}

/// Router, state lock and manager over a fixed set of mounts
pub struct Harness {
    pub router: Arc<Router>,
    pub state_lock: StateLock,
    pub manager: Arc<RollbackManager>,
}

impl Harness {
    /// Build a harness; the manager is not started.
    pub async fn new(
        mounts: Vec<(MountEntry, Arc<MockBackend>)>,
        period: Duration,
        max_request_duration: Duration,
    ) -> Self {
        let router = Arc::new(Router::new());
        let mut entries = Vec::new();
        for (entry, backend) in mounts {
            router.mount(entry.clone(), backend).await;
            entries.push(entry);
        }

        let state_lock = StateLock::new();
        let backends: MountsFn = Arc::new(move || entries.clone());
        let manager = Arc::new(RollbackManager::with_durations(
            period,
            max_request_duration,
            backends,
            Arc::clone(&router),
            state_lock.clone(),
        ));

        Self { router, state_lock, manager }
    }

    /// One secret mount at `secret/` in the root namespace, long period
    pub async fn single(backend: Arc<MockBackend>) -> Self {
        Self::new(
            vec![(secret_mount("secret/"), backend)],
            Duration::from_secs(3600),
            Duration::from_secs(5),
        )
        .await
    }
}

pub fn root() -> Arc<Namespace> {
    Arc::new(Namespace::root())
}

pub fn root_ctx() -> RequestContext {
    RequestContext::with_namespace(root())
}

pub fn secret_mount(path: &str) -> MountEntry {
    MountEntry::secret(path, "mock", root())
}

/// Poll `condition` until it holds or `limit` elapses.
pub async fn wait_until<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
