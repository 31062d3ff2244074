//! Error types for query execution

use tessera_db_core::TrackError;
use thiserror::Error;

/// Query execution errors
///
/// `Clone` on purpose: the first error an iterator observes is held sticky
/// and handed back on every `err()` call until `reset()`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Error from tessera-db-core
    #[error("core error: {0}")]
    Core(#[from] tessera_db_core::Error),

    /// A bindable shape reached iteration without passing through the binder
    #[error("query should be bound to a quad store: {0}")]
    Unbound(&'static str),

    /// An externally supplied iterator was used in more than one evaluation
    #[error("iterator already used in query")]
    IteratorReused,

    /// Reverse was called on a morphism with no inverse
    #[error("reversal is not supported for {0}")]
    UnsupportedReversal(&'static str),

    /// A value filter predicate failed
    #[error("filter evaluation failed: {0}")]
    FilterEval(String),

    /// A wildcard or regex pattern did not compile
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Cancellation, deadline or fuel exhaustion
    #[error(transparent)]
    Track(#[from] TrackError),

    /// Internal error (should not happen in normal operation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
