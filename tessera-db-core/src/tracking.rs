//! Query execution tracking
//!
//! The `Tracker` is the cancellation/deadline carrier threaded through every
//! advancing iterator call. It also counts fuel (one unit per emitted row)
//! against an optional limit.
//!
//! When disabled, a tracker is a single `None` pointer: cheap to clone, and
//! every check is a null test.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Tracking options for a single query execution.
#[derive(Debug, Clone, Default)]
pub struct TrackingOptions {
    /// Absolute deadline; advancing past it terminates the query.
    pub deadline: Option<Instant>,
    /// Maximum rows the query may emit. `None` and `Some(0)` are unlimited.
    pub max_fuel: Option<u64>,
}

impl TrackingOptions {
    /// Deadline `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            max_fuel: None,
        }
    }

    /// Fuel-limited execution.
    pub fn with_max_fuel(max_fuel: u64) -> Self {
        Self {
            deadline: None,
            max_fuel: Some(max_fuel),
        }
    }
}

/// Terminal tracking conditions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("query cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("fuel limit exceeded: used {used} of {limit}")]
    FuelExceeded { used: u64, limit: u64 },
}

struct TrackerInner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    fuel_total: AtomicU64,
    fuel_limit: u64, // 0 = unlimited
}

/// Execution tracker handle.
#[derive(Clone, Default)]
pub struct Tracker(Option<Arc<TrackerInner>>);

impl Tracker {
    /// Create an enabled tracker from options.
    pub fn new(options: TrackingOptions) -> Self {
        Self(Some(Arc::new(TrackerInner {
            cancelled: AtomicBool::new(false),
            deadline: options.deadline,
            fuel_total: AtomicU64::new(0),
            fuel_limit: options.max_fuel.unwrap_or(0),
        })))
    }

    /// Disabled tracker: never cancels, never limits.
    #[inline]
    pub fn disabled() -> Self {
        Self(None)
    }

    /// Enabled tracker with no deadline or fuel limit, usable as a pure
    /// cancellation handle.
    pub fn cancellable() -> Self {
        Self::new(TrackingOptions::default())
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// Request cancellation. No-op on a disabled tracker.
    pub fn cancel(&self) {
        if let Some(inner) = &self.0 {
            inner.cancelled.store(true, Ordering::Relaxed);
        }
    }

    /// Per-row cancellation and deadline check.
    #[inline]
    pub fn checkpoint(&self) -> Result<(), TrackError> {
        let Some(inner) = &self.0 else {
            return Ok(());
        };
        if inner.cancelled.load(Ordering::Relaxed) {
            return Err(TrackError::Cancelled);
        }
        if let Some(deadline) = inner.deadline {
            if Instant::now() > deadline {
                return Err(TrackError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Consume one unit of fuel for an emitted row.
    ///
    /// Allows exactly `limit` rows; errors when the total becomes
    /// `limit + 1`.
    #[inline]
    pub fn consume_fuel_one(&self) -> Result<(), TrackError> {
        let Some(inner) = &self.0 else {
            return Ok(());
        };
        let new_total = inner.fuel_total.fetch_add(1, Ordering::Relaxed) + 1;
        if inner.fuel_limit > 0 && new_total == inner.fuel_limit + 1 {
            return Err(TrackError::FuelExceeded {
                used: new_total,
                limit: inner.fuel_limit,
            });
        }
        Ok(())
    }

    /// Total fuel consumed so far.
    pub fn fuel_used(&self) -> u64 {
        self.0
            .as_ref()
            .map(|i| i.fuel_total.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_tracker_never_trips() {
        let t = Tracker::disabled();
        t.cancel();
        assert_eq!(t.checkpoint(), Ok(()));
        for _ in 0..10 {
            assert_eq!(t.consume_fuel_one(), Ok(()));
        }
        assert_eq!(t.fuel_used(), 0);
    }

    #[test]
    fn cancel_trips_checkpoint() {
        let t = Tracker::cancellable();
        assert_eq!(t.checkpoint(), Ok(()));
        let handle = t.clone();
        handle.cancel();
        assert_eq!(t.checkpoint(), Err(TrackError::Cancelled));
    }

    #[test]
    fn fuel_allows_exactly_limit() {
        let t = Tracker::new(TrackingOptions::with_max_fuel(3));
        assert_eq!(t.consume_fuel_one(), Ok(()));
        assert_eq!(t.consume_fuel_one(), Ok(()));
        assert_eq!(t.consume_fuel_one(), Ok(()));
        assert_eq!(
            t.consume_fuel_one(),
            Err(TrackError::FuelExceeded { used: 4, limit: 3 })
        );
    }

    #[test]
    fn expired_deadline_trips() {
        let t = Tracker::new(TrackingOptions {
            deadline: Some(Instant::now() - Duration::from_millis(1)),
            max_fuel: None,
        });
        assert_eq!(t.checkpoint(), Err(TrackError::DeadlineExceeded));
    }
}
