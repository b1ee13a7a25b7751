//! Time source seam for the in-memory backend.
//!
//! The relational backend takes `NOW()` from the database server; the
//! in-memory backend takes it from a [`Clock`] so TTL expiry can be tested
//! with simulated time.

use std::fmt::Debug;

use time::OffsetDateTime;

/// Source of the current time for visibility and expiry decisions.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current instant.
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time source used outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
