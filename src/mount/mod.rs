//! Mount table types
//!
//! A mount entry binds a path prefix inside a namespace to a backend. Secret
//! mounts and credential mounts live in separate tables; credential mounts
//! are routed underneath [`CREDENTIAL_ROUTE_PREFIX`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::namespace::Namespace;

/// Routing prefix under which credential mounts are reachable
pub const CREDENTIAL_ROUTE_PREFIX: &str = "auth/";

/// Which mount table an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountTableType {
    /// Secret engines
    Secret,
    /// Credential (auth) methods
    Credential,
}

impl MountTableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secret => "mounts",
            Self::Credential => "auth",
        }
    }
}

impl fmt::Display for MountTableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single mounted backend
#[derive(Debug, Clone, PartialEq)]
pub struct MountEntry {
    /// Mount path relative to the namespace, always ending with `/`
    pub path: String,
    pub table: MountTableType,
    pub backend_type: String,
    pub namespace: Arc<Namespace>,
}

impl MountEntry {
    pub fn new(
        path: impl Into<String>,
        table: MountTableType,
        backend_type: impl Into<String>,
        namespace: Arc<Namespace>,
    ) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self { path, table, backend_type: backend_type.into(), namespace }
    }

    /// A secret-engine mount
    pub fn secret(path: impl Into<String>, backend_type: impl Into<String>, namespace: Arc<Namespace>) -> Self {
        Self::new(path, MountTableType::Secret, backend_type, namespace)
    }

    /// A credential mount
    pub fn credential(path: impl Into<String>, backend_type: impl Into<String>, namespace: Arc<Namespace>) -> Self {
        Self::new(path, MountTableType::Credential, backend_type, namespace)
    }

    pub fn is_credential(&self) -> bool {
        self.table == MountTableType::Credential
    }

    /// Namespace-relative routing path; credential mounts get the
    /// `auth/` prefix.
    pub fn route_path(&self) -> String {
        if self.is_credential() {
            format!("{}{}", CREDENTIAL_ROUTE_PREFIX, self.path)
        } else {
            self.path.clone()
        }
    }

    /// Fully-qualified routing path including the namespace prefix
    pub fn full_path(&self) -> String {
        self.namespace.qualify(&self.route_path())
    }
}

/// An ordered set of mount entries of one table type
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    pub entries: Vec<MountEntry>,
}

impl MountTable {
    pub fn push(&mut self, entry: MountEntry) {
        self.entries.push(entry);
    }

    /// Remove the entry mounted at `path` in `namespace`, returning it
    pub fn remove(&mut self, namespace: &Namespace, path: &str) -> Option<MountEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.namespace.as_ref() == namespace && e.path == path)?;
        Some(self.entries.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
