//! Request router
//!
//! Resolves fully-qualified paths to mounted logical backends using longest
//! prefix matching, and dispatches requests to them. Mounts may be marked as
//! filtered, in which case they stay in the table but resolve to nothing.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::logical::{LogicalBackend, LogicalError, Request, Response};
use crate::mount::MountEntry;
use crate::namespace::RequestContext;

#[derive(Debug, Clone)]
struct RouteEntry {
    entry: MountEntry,
    backend: Arc<dyn LogicalBackend>,
    filtered: bool,
}

/// Path router over mounted backends
#[derive(Debug, Default)]
pub struct Router {
    routes: RwLock<HashMap<String, RouteEntry>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `backend` at the entry's fully-qualified path.
    ///
    /// Re-mounting an existing path replaces the previous backend.
    pub async fn mount(&self, entry: MountEntry, backend: Arc<dyn LogicalBackend>) {
        let full_path = entry.full_path();
        info!(path = %full_path, backend_type = %backend.backend_type(), "Mounting backend");
        self.routes
            .write()
            .await
            .insert(full_path, RouteEntry { entry, backend, filtered: false });
    }

    /// Remove the mount at a fully-qualified path
    pub async fn unmount(&self, full_path: &str) -> Option<MountEntry> {
        let removed = self.routes.write().await.remove(full_path).map(|r| r.entry);
        if removed.is_some() {
            info!(path = %full_path, "Unmounted backend");
        }
        removed
    }

    /// Mark a mount as filtered (or not). Returns false when nothing is
    /// mounted at `full_path`.
    pub async fn set_filtered(&self, full_path: &str, filtered: bool) -> bool {
        match self.routes.write().await.get_mut(full_path) {
            Some(route) => {
                route.filtered = filtered;
                true
            }
            None => false,
        }
    }

    /// Resolve the backend serving `path` within the context's namespace.
    ///
    /// Returns `None` for unmounted paths, filtered mounts, and contexts
    /// without a namespace.
    pub async fn matching_backend(
        &self,
        ctx: &RequestContext,
        path: &str,
    ) -> Option<Arc<dyn LogicalBackend>> {
        let namespace = ctx.namespace()?;
        let full_path = namespace.qualify(path);
        let routes = self.routes.read().await;
        let (_, route) = Self::longest_match(&routes, &full_path)?;
        if route.filtered {
            debug!(path = %full_path, "Mount is filtered");
            return None;
        }
        Some(Arc::clone(&route.backend))
    }

    /// Dispatch a request whose path is relative to the context's namespace.
    ///
    /// The deadline carried by `ctx`, if any, bounds the backend call.
    pub async fn route(&self, ctx: &RequestContext, mut request: Request) -> Result<Response, LogicalError> {
        let namespace = ctx
            .namespace()
            .ok_or_else(|| LogicalError::backend("no namespace in request context"))?;
        let full_path = namespace.qualify(&request.path);

        let (mount_path, backend) = {
            let routes = self.routes.read().await;
            match Self::longest_match(&routes, &full_path) {
                Some((prefix, route)) if !route.filtered => {
                    (prefix.to_string(), Arc::clone(&route.backend))
                }
                _ => return Err(LogicalError::unsupported_path(full_path)),
            }
        };

        request.path = full_path[mount_path.len()..].to_string();
        debug!(
            mount = %mount_path,
            path = %request.path,
            operation = %request.operation,
            "Routing request"
        );

        match ctx.deadline() {
            Some(deadline) => {
                let started = Instant::now();
                match tokio::time::timeout_at(deadline, backend.handle_request(ctx, request)).await {
                    Ok(result) => result,
                    Err(_) => Err(LogicalError::Timeout {
                        duration_ms: started.elapsed().as_millis() as u64,
                    }),
                }
            }
            None => backend.handle_request(ctx, request).await,
        }
    }

    /// Number of mounted routes, filtered ones included
    pub async fn len(&self) -> usize {
        self.routes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.routes.read().await.is_empty()
    }

    fn longest_match<'a>(
        routes: &'a HashMap<String, RouteEntry>,
        full_path: &str,
    ) -> Option<(&'a str, &'a RouteEntry)> {
        routes
            .iter()
            .filter(|(prefix, _)| full_path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, route)| (prefix.as_str(), route))
    }
}
