//! Error types for tessera-db-core

use crate::tracking::TrackError;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
///
/// `Clone` on purpose: iterators hold their first error sticky and surface
/// it on every subsequent `err()` call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Opaque store-side failure
    #[error("store error: {0}")]
    Store(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// A ref of an unexpected variant was passed to the store
    #[error("ref type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    /// Cancellation, deadline or fuel exhaustion
    #[error(transparent)]
    Track(#[from] TrackError),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}
