//! Core host
//!
//! Owns the process-wide state lock, the secret and credential mount tables,
//! the router, and the rollback manager for the current unseal phase. The
//! manager is created on unseal and torn down before seal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::RollbackConfig;
use crate::errors::{Result, StrongboxError};
use crate::logical::LogicalBackend;
use crate::mount::{MountEntry, MountTable, MountTableType};
use crate::namespace::RequestContext;
use crate::rollback::{MountsFn, RollbackManager};
use crate::router::Router;
use crate::state_lock::{StateLock, StateLockGuard};

type SharedTable = Arc<RwLock<Option<MountTable>>>;

/// The secrets platform core
pub struct Core {
    state_lock: StateLock,
    mounts: SharedTable,
    auth: SharedTable,
    router: Arc<Router>,
    rollback_config: RollbackConfig,
    rollback: Mutex<Option<Arc<RollbackManager>>>,
    sealed: AtomicBool,
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("sealed", &self.is_sealed())
            .field("rollback_config", &self.rollback_config)
            .finish()
    }
}

impl Core {
    /// A sealed core with empty mount tables
    pub fn new(rollback_config: RollbackConfig) -> Self {
        Self {
            state_lock: StateLock::new(),
            mounts: Arc::new(RwLock::new(Some(MountTable::default()))),
            auth: Arc::new(RwLock::new(Some(MountTable::default()))),
            router: Arc::new(Router::new()),
            rollback_config,
            rollback: Mutex::new(None),
            sealed: AtomicBool::new(true),
        }
    }

    pub fn state_lock(&self) -> &StateLock {
        &self.state_lock
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    fn table(&self, table: MountTableType) -> &SharedTable {
        match table {
            MountTableType::Secret => &self.mounts,
            MountTableType::Credential => &self.auth,
        }
    }

    /// Record `entry` in its mount table and route to `backend`.
    pub async fn mount(&self, entry: MountEntry, backend: Arc<dyn LogicalBackend>) {
        {
            let mut table = self.table(entry.table).write().unwrap_or_else(PoisonError::into_inner);
            table.get_or_insert_with(MountTable::default).push(entry.clone());
        }
        self.router.mount(entry, backend).await;
    }

    /// Remove the mount at `path` in `entry`'s namespace and table.
    pub async fn unmount(&self, entry: &MountEntry) -> Option<MountEntry> {
        let removed = {
            let mut table = self.table(entry.table).write().unwrap_or_else(PoisonError::into_inner);
            table.as_mut().and_then(|t| t.remove(&entry.namespace, &entry.path))
        };
        self.router.unmount(&entry.full_path()).await;
        removed
    }

    /// Drop both mount tables, as happens between a teardown and the next
    /// setup. Sweeps see no mounts until the tables are reloaded.
    pub fn clear_mount_tables(&self) {
        *self.mounts.write().unwrap_or_else(PoisonError::into_inner) = None;
        *self.auth.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Snapshot of secret mounts followed by credential mounts.
    pub fn mount_entries(&self) -> Vec<MountEntry> {
        collect_entries(&self.mounts, &self.auth)
    }

    /// Create and start the rollback manager. Called after unseal.
    pub async fn start_rollback(&self) -> Result<()> {
        let mounts = Arc::clone(&self.mounts);
        let auth = Arc::clone(&self.auth);
        let backends: MountsFn = Arc::new(move || collect_entries(&mounts, &auth));

        let manager = Arc::new(RollbackManager::new(
            &self.rollback_config,
            backends,
            Arc::clone(&self.router),
            self.state_lock.clone(),
        ));
        manager.start().await;

        let previous = self.rollback.lock().await.replace(manager);
        if let Some(previous) = previous {
            warn!("Replacing a running rollback manager");
            previous.stop().await;
        }
        Ok(())
    }

    /// Stop and discard the rollback manager. Called before seal.
    pub async fn stop_rollback(&self) -> Result<()> {
        let manager = self.rollback.lock().await.take();
        if let Some(manager) = manager {
            manager.stop().await;
        }
        Ok(())
    }

    pub async fn rollback_manager(&self) -> Option<Arc<RollbackManager>> {
        self.rollback.lock().await.clone()
    }

    /// Unseal: start background services.
    pub async fn unseal(&self) -> Result<()> {
        let _guard = self.state_lock.write().await;
        if !self.is_sealed() {
            return Ok(());
        }
        self.start_rollback().await?;
        self.sealed.store(false, Ordering::SeqCst);
        info!("Core unsealed");
        Ok(())
    }

    /// Seal: take the state lock exclusively, then stop background services
    /// while holding it. Attempts still waiting for the read side observe
    /// the shutdown and give up instead of blocking the seal.
    pub async fn seal(&self) -> Result<()> {
        let _guard = self.state_lock.write().await;
        if self.is_sealed() {
            return Ok(());
        }
        self.stop_rollback().await?;
        self.sealed.store(true, Ordering::SeqCst);
        info!("Core sealed");
        Ok(())
    }

    /// Roll back `path` now while the caller holds the state lock.
    pub async fn rollback(&self, ctx: &RequestContext, path: &str, held: &StateLockGuard) -> Result<()> {
        let manager = self.rollback_manager().await.ok_or(StrongboxError::Sealed)?;
        manager.rollback(ctx, path, held).await.map_err(StrongboxError::from)
    }
}

fn collect_entries(mounts: &SharedTable, auth: &SharedTable) -> Vec<MountEntry> {
    let mut entries = Vec::new();
    // Either table can be absent during setup or teardown
    if let Some(table) = mounts.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
        entries.extend(table.entries.iter().cloned());
    }
    if let Some(table) = auth.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
        entries.extend(table.entries.iter().cloned());
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical::{LogicalError, Request, Response};
    use crate::namespace::Namespace;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct NoopBackend;

    #[async_trait]
    impl LogicalBackend for NoopBackend {
        async fn handle_request(
            &self,
            _ctx: &RequestContext,
            _request: Request,
        ) -> std::result::Result<Response, LogicalError> {
            Err(LogicalError::UnsupportedOperation)
        }

        fn backend_type(&self) -> &str {
            "noop"
        }
    }

    #[tokio::test]
    async fn test_mount_entries_orders_secret_before_credential() {
        let core = Core::new(RollbackConfig::default());
        let root = Arc::new(Namespace::root());
        core.mount(MountEntry::credential("userpass/", "noop", root.clone()), Arc::new(NoopBackend))
            .await;
        core.mount(MountEntry::secret("secret/", "noop", root), Arc::new(NoopBackend)).await;

        let entries = core.mount_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].table, MountTableType::Secret);
        assert_eq!(entries[1].table, MountTableType::Credential);
    }

    #[tokio::test]
    async fn test_absent_tables_yield_no_entries() {
        let core = Core::new(RollbackConfig::default());
        let root = Arc::new(Namespace::root());
        core.mount(MountEntry::secret("secret/", "noop", root), Arc::new(NoopBackend)).await;

        core.clear_mount_tables();
        assert!(core.mount_entries().is_empty());
    }

    #[tokio::test]
    async fn test_unmount_removes_table_entry_and_route() {
        let core = Core::new(RollbackConfig::default());
        let root = Arc::new(Namespace::root());
        let entry = MountEntry::secret("secret/", "noop", root);
        core.mount(entry.clone(), Arc::new(NoopBackend)).await;

        assert!(core.unmount(&entry).await.is_some());
        assert!(core.mount_entries().is_empty());
        assert!(core.router().is_empty().await);
    }

    #[tokio::test]
    async fn test_seal_unseal_lifecycle() {
        let core = Core::new(RollbackConfig::default());
        assert!(core.is_sealed());
        assert!(core.rollback_manager().await.is_none());

        core.unseal().await.unwrap();
        assert!(!core.is_sealed());
        assert!(core.rollback_manager().await.is_some());

        core.seal().await.unwrap();
        assert!(core.is_sealed());
        assert!(core.rollback_manager().await.is_none());

        // Both transitions are idempotent
        core.seal().await.unwrap();
        core.unseal().await.unwrap();
        core.unseal().await.unwrap();
        assert!(core.rollback_manager().await.is_some());
        core.seal().await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_while_sealed() {
        let core = Core::new(RollbackConfig::default());
        let guard = core.state_lock().read().await;
        let ctx = RequestContext::with_namespace(Arc::new(Namespace::root()));

        let err = core.rollback(&ctx, "secret/", &guard).await.unwrap_err();
        assert!(matches!(err, StrongboxError::Sealed));
    }

    #[tokio::test]
    async fn test_rollback_through_core() {
        let core = Core::new(RollbackConfig::default());
        let root = Arc::new(Namespace::root());
        core.mount(MountEntry::secret("secret/", "noop", root.clone()), Arc::new(NoopBackend)).await;
        core.unseal().await.unwrap();

        {
            let guard = core.state_lock().write().await;
            let ctx = RequestContext::with_namespace(root);
            core.rollback(&ctx, "secret/", &guard).await.unwrap();
        }

        core.seal().await.unwrap();
    }
}
