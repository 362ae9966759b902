//! Terminal errors of a rollback attempt.

use thiserror::Error;

use crate::logical::LogicalError;

/// Terminal error of one rollback attempt.
///
/// `Clone` because every caller joined to an attempt receives its own copy
/// of the same result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RollbackError {
    /// The triggering context carried no namespace.
    #[error("no namespace in request context")]
    NoNamespace,

    /// The manager shut down while the attempt waited for the state lock,
    /// or before the attempt could be created.
    #[error("rollback shutting down")]
    ShuttingDown,

    /// The backend's rollback operation failed.
    #[error("rollback failed: {0}")]
    Logical(#[from] LogicalError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(RollbackError::ShuttingDown.to_string(), "rollback shutting down");
        let err: RollbackError = LogicalError::backend("disk full").into();
        assert_eq!(err.to_string(), "rollback failed: disk full");
        assert_ne!(err, RollbackError::ShuttingDown);
    }
}
