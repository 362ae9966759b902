//! Namespaces and the ambient request context that carries them.
//!
//! Every request is evaluated inside exactly one namespace. The namespace is
//! propagated explicitly through [`RequestContext`] rather than through
//! task-local state, so a missing namespace is visible at the call site.

use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// Identifier of the root namespace
pub const ROOT_NAMESPACE_ID: &str = "root";

/// A namespace: a tenant-scoped prefix over the mount table.
///
/// `path` is either empty (root) or ends with a `/`, so that
/// `namespace.path + mount_path` yields a fully-qualified path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub id: String,
    pub path: String,
}

impl Namespace {
    /// The root namespace
    pub fn root() -> Self {
        Self { id: ROOT_NAMESPACE_ID.to_string(), path: String::new() }
    }

    /// Create a child namespace; a trailing `/` is appended when missing.
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.is_empty() && !path.ends_with('/') {
            path.push('/');
        }
        Self { id: id.into(), path }
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Strip this namespace's prefix from a fully-qualified path.
    ///
    /// Paths outside the namespace are returned unchanged.
    pub fn trimmed_path<'a>(&self, full_path: &'a str) -> &'a str {
        full_path.strip_prefix(self.path.as_str()).unwrap_or(full_path)
    }

    /// Qualify a namespace-relative path with this namespace's prefix.
    pub fn qualify(&self, path: &str) -> String {
        format!("{}{}", self.path, path)
    }
}

/// Request-scoped context: the owning namespace and an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    namespace: Option<Arc<Namespace>>,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context with no namespace attached.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context bound to `namespace`.
    pub fn with_namespace(namespace: Arc<Namespace>) -> Self {
        Self { namespace: Some(namespace), deadline: None }
    }

    /// Derive a context whose deadline is at most `timeout` from now.
    ///
    /// An earlier existing deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self { namespace: self.namespace.clone(), deadline: Some(deadline) }
    }

    pub fn namespace(&self) -> Option<&Arc<Namespace>> {
        self.namespace.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_trimmed_path_undoes_qualify(ns in "[a-z]{1,8}", path in "[a-z/]{0,16}") {
            let namespace = Namespace::new("ns", ns);
            let full = namespace.qualify(&path);
            prop_assert!(full.starts_with(namespace.path.as_str()));
            prop_assert_eq!(namespace.trimmed_path(&full), path.as_str());
        }
    }

    #[test]
    fn test_namespace_path_normalization() {
        let ns = Namespace::new("ns1", "team-a");
        assert_eq!(ns.path, "team-a/");
        assert!(!ns.is_root());
        assert!(Namespace::root().is_root());
    }

    #[test]
    fn test_trimmed_path() {
        let ns = Namespace::new("ns1", "team-a/");
        assert_eq!(ns.trimmed_path("team-a/secret/"), "secret/");
        assert_eq!(ns.trimmed_path("other/secret/"), "other/secret/");
        assert_eq!(Namespace::root().trimmed_path("secret/"), "secret/");
        assert_eq!(ns.qualify("secret/"), "team-a/secret/");
    }

    #[tokio::test]
    async fn test_with_timeout_keeps_earlier_deadline() {
        let ctx = RequestContext::background().with_timeout(Duration::from_secs(1));
        let first = ctx.deadline().expect("deadline set");

        let widened = ctx.with_timeout(Duration::from_secs(60));
        assert_eq!(widened.deadline(), Some(first));

        let narrowed = ctx.with_timeout(Duration::from_millis(1));
        assert!(narrowed.deadline().expect("deadline set") <= first);
    }

    #[test]
    fn test_background_has_no_namespace() {
        assert!(RequestContext::background().namespace().is_none());
        let ctx = RequestContext::with_namespace(Arc::new(Namespace::root()));
        assert_eq!(ctx.namespace().map(|n| n.id.as_str()), Some(ROOT_NAMESPACE_ID));
    }
}
