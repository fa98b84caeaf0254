//! Wall-clock abstraction for testability
//!
//! Attendance logic asks "what is today?" in several places (future punch
//! validation, late-in notifications, claim expiry). Routing those questions
//! through [`Clock`] keeps the engine deterministic under test.
//!
//! # Examples
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use timekeep_common::time::{Clock, MockClock};
//!
//! let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
//! let clock = MockClock::at(start);
//! clock.advance(Duration::minutes(5));
//! assert_eq!(clock.now(), start + Duration::minutes(5));
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Source of the current UTC instant.
pub trait Clock: Send + Sync {
    /// Current wall-clock instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock. Use this in production wiring.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant.
///
/// Clones share the same underlying instant, so a test can hand one clone to
/// the service under test and keep another to move time forward.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a clock frozen at `instant`.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(instant)) }
    }

    /// Move the clock forward (or backward, with a negative duration).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::at(Utc::now())
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
