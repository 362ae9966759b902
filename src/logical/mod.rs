//! Logical backend interface
//!
//! A logical backend serves every request under one mount. The rollback
//! subsystem only ever sends [`Operation::Rollback`] requests; what a backend
//! does with them is its own business.

pub mod error;
pub mod request;

pub use error::{LogicalError, READ_ONLY_MESSAGE};
pub use request::{Operation, Request, Response};

use async_trait::async_trait;

use crate::namespace::RequestContext;

/// Trait for logical backends
///
/// Implementations must be Send + Sync for use in async contexts.
#[async_trait]
pub trait LogicalBackend: Send + Sync + std::fmt::Debug {
    /// Handle a request whose path is relative to the backend's mount.
    ///
    /// Backends that do not implement an operation return
    /// [`LogicalError::UnsupportedOperation`].
    async fn handle_request(
        &self,
        ctx: &RequestContext,
        request: Request,
    ) -> error::Result<Response>;

    /// Human-readable backend type, used in logs.
    fn backend_type(&self) -> &str;
}
