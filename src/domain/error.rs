//! Domain errors
//!
//! Upstream failures are kept apart by kind for logging, but every one of
//! them is reported to the client as the same generic operations error.

use crate::domain::value_objects::ResultCode;

/// The upstream directory server could not be reached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to dial upstream {addr}: {reason}")]
pub struct DialError {
    pub addr: String,
    pub reason: String,
}

impl DialError {
    pub fn new(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }
}

/// An upstream bind or search was rejected or failed.
///
/// This includes any operation attempted on a handle that has already been
/// closed, e.g. after its session was evicted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("upstream {operation} failed: {reason}")]
pub struct UpstreamError {
    pub operation: &'static str,
    pub reason: String,
}

impl UpstreamError {
    pub fn new(operation: &'static str, reason: impl ToString) -> Self {
        Self {
            operation,
            reason: reason.to_string(),
        }
    }

    pub fn closed(operation: &'static str) -> Self {
        Self::new(operation, "connection closed")
    }
}

/// Failure of a proxied operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    Dial(#[from] DialError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ProxyError {
    /// Result code sent back to the client.
    pub fn result_code(&self) -> ResultCode {
        ResultCode::OperationsError
    }
}
