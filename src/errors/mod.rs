//! # Error Handling
//!
//! Crate-wide error type for the Strongbox host process. Layer-specific
//! errors ([`crate::logical::LogicalError`], [`crate::rollback::RollbackError`])
//! convert into [`StrongboxError`] at the host boundary.

use crate::logical::LogicalError;
use crate::rollback::RollbackError;

/// Custom result type for Strongbox operations
pub type Result<T> = std::result::Result<T, StrongboxError>;

/// Main error type for the Strongbox host
#[derive(thiserror::Error, Debug)]
pub enum StrongboxError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors raised by the `validator` derive
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Errors surfaced by a logical backend or the router
    #[error(transparent)]
    Logical(#[from] LogicalError),

    /// Terminal error of a rollback attempt
    #[error(transparent)]
    Rollback(#[from] RollbackError),

    /// Core is sealed and the requested operation needs it unsealed
    #[error("Core is sealed")]
    Sealed,
}

impl StrongboxError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = StrongboxError::config("bad period");
        assert!(matches!(err, StrongboxError::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: bad period");
    }

    #[test]
    fn test_rollback_error_is_transparent() {
        let err: StrongboxError = RollbackError::ShuttingDown.into();
        assert_eq!(err.to_string(), RollbackError::ShuttingDown.to_string());
    }
}
