//! Error types surfaced by logical backends and the router.

use thiserror::Error;

/// Canonical message for writes rejected by read-only storage.
///
/// Backends that wrap storage errors often only preserve the message, so
/// read-only detection also matches this text inside other errors.
pub const READ_ONLY_MESSAGE: &str = "cannot write to readonly storage";

/// Result type for logical backend operations.
pub type Result<T> = std::result::Result<T, LogicalError>;

/// Errors returned by a logical backend or while routing to one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogicalError {
    /// The backend does not implement the requested operation.
    #[error("unsupported operation")]
    UnsupportedOperation,

    /// Storage rejected a write because this node is not writable.
    #[error("cannot write to readonly storage")]
    ReadOnly,

    /// No mount matches the request path.
    #[error("unsupported path: {path}")]
    UnsupportedPath { path: String },

    /// The request deadline expired before the backend answered.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Any other backend failure.
    #[error("{message}")]
    Backend { message: String },
}

impl LogicalError {
    /// Create a generic backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend { message: message.into() }
    }

    /// Create an unsupported path error.
    pub fn unsupported_path(path: impl Into<String>) -> Self {
        Self::UnsupportedPath { path: path.into() }
    }

    /// Whether this error means storage is read-only, either directly or
    /// through a wrapped message.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly) || self.to_string().contains(READ_ONLY_MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_detection() {
        assert!(LogicalError::ReadOnly.is_read_only());
        assert!(LogicalError::backend(format!("put failed: {}", READ_ONLY_MESSAGE)).is_read_only());
        assert!(!LogicalError::backend("disk full").is_read_only());
        assert!(!LogicalError::UnsupportedOperation.is_read_only());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(LogicalError::UnsupportedOperation.to_string(), "unsupported operation");
        assert_eq!(LogicalError::ReadOnly.to_string(), READ_ONLY_MESSAGE);
        assert!(LogicalError::unsupported_path("nope/").to_string().contains("nope/"));
    }
}
