//! Execution context for query iterators
//!
//! The `ExecutionContext` is handed to every advancing iterator call. It
//! carries the execution `Tracker` (cancellation, deadline, fuel); iterators
//! check it between produced rows and surface trips as sticky errors.

use crate::error::QueryError;
use tessera_db_core::Tracker;

/// Execution context threaded through `next`/`next_path`/`contains`.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    tracker: Tracker,
}

impl ExecutionContext {
    /// Context with a disabled tracker: never cancels, never limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying the given tracker.
    pub fn with_tracker(tracker: Tracker) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Per-row cancellation and deadline check.
    #[inline]
    pub fn check(&self) -> Result<(), QueryError> {
        self.tracker.checkpoint().map_err(QueryError::from)
    }
}
