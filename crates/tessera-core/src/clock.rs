//! Clock abstraction for deterministic timestamps.

use chrono::{DateTime, SubsecRound, Utc};

/// Source of "now" for entity timestamps, outbox dispatch times and
/// housekeeping cutoffs.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
///
/// Readings are truncated to microseconds, the precision every backend
/// stores, so a timestamp orders the same way before and after a round trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
