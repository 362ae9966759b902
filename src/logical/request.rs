//! Requests and responses exchanged with logical backends.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::LogicalError;

/// Operation requested of a logical backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Purge partial secrets left behind by failed operations
    Rollback,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request routed to a logical backend.
///
/// `path` is namespace-relative when built by callers and mount-relative by
/// the time it reaches [`super::LogicalBackend::handle_request`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub operation: Operation,
    pub path: String,
    pub data: Option<serde_json::Value>,
}

impl Request {
    pub fn new(operation: Operation, path: impl Into<String>) -> Self {
        Self { operation, path: path.into(), data: None }
    }

    /// A rollback request for a namespace-relative path.
    pub fn rollback(path: impl Into<String>) -> Self {
        Self::new(Operation::Rollback, path)
    }
}

/// Response from a logical backend.
///
/// Backends may report failure in-band through `error` instead of returning
/// an `Err`; callers check [`Response::error`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub data: Option<serde_json::Value>,
    pub warnings: Vec<String>,
    pub error: Option<LogicalError>,
}

impl Response {
    /// A response carrying an in-band error.
    pub fn error_response(error: LogicalError) -> Self {
        Self { error: Some(error), ..Default::default() }
    }

    pub fn error(&self) -> Option<&LogicalError> {
        self.error.as_ref()
    }
}
