//! Entry Store error types

use thiserror::Error;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures of the backing store.
///
/// Absence is never an error: missing and expired keys come back as `None`
/// (or [`CasOutcome::Absent`](super::CasOutcome::Absent)).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing service could not be reached
    #[error("store connection failed: {0}")]
    Connection(String),

    /// The operation did not complete in time
    #[error("store operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A value could not be encoded or decoded
    #[error("store serialization failed: {0}")]
    Serialization(String),

    /// Any other backend-reported failure
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            StoreError::Connection(err.to_string())
        } else if err.is_timeout() {
            StoreError::Connection(format!("timed out: {}", err))
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}
