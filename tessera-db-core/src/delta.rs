//! Write deltas
//!
//! The only way data enters a store is a batch of deltas. `IgnoreOpts`
//! controls whether re-adding an existing quad or deleting a missing one is
//! an error.

use crate::quad::Quad;
use serde::{Deserialize, Serialize};

/// Whether a delta asserts or retracts its quad.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaAction {
    Add,
    Delete,
}

/// A single write: a quad plus the action to take.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub quad: Quad,
    pub action: DeltaAction,
}

impl Delta {
    pub fn add(quad: Quad) -> Self {
        Self {
            quad,
            action: DeltaAction::Add,
        }
    }

    pub fn delete(quad: Quad) -> Self {
        Self {
            quad,
            action: DeltaAction::Delete,
        }
    }
}

/// Error tolerance for delta application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IgnoreOpts {
    /// Adding a quad that already exists is not an error.
    pub ignore_dup: bool,
    /// Deleting a quad that does not exist is not an error.
    pub ignore_missing: bool,
}
