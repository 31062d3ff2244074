//! Error types for the in-memory store

use tessera_db_core::Quad;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, MemoryError>;

/// In-memory store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryError {
    /// Adding a quad that already exists
    #[error("quad already exists: {0}")]
    QuadExists(Quad),

    /// Deleting a quad that does not exist
    #[error("quad does not exist: {0}")]
    QuadMissing(Quad),
}

impl From<MemoryError> for tessera_db_core::Error {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::QuadExists(_) => tessera_db_core::Error::store(e.to_string()),
            MemoryError::QuadMissing(q) => {
                tessera_db_core::Error::not_found(format!("quad {q}"))
            }
        }
    }
}
