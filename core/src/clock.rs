//! Time source abstraction.
//!
//! Retry triggers read "now" in a few places (misfire recovery, fire-time queries
//! without an explicit reference time, the year cutoff). The [`Clock`] trait lets a
//! host scheduler or a test decide where that time comes from:
//! - [`SystemClock`] reads the wall clock.
//! - [`ManualClock`] is set and advanced by hand.

use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, TimeDelta, Utc};

/// Source of the current UTC time.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Shared handle to a clock, cheap to clone into every trigger.
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock.
///
/// # Example
///
/// ```rust
/// use retry_trigger::clock::{Clock, SystemClock};
///
/// let before = chrono::Utc::now();
/// assert!(SystemClock.now() >= before);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can keep one handle and
/// give another to a scheduler.
///
/// # Example
///
/// ```rust
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use retry_trigger::clock::{Clock, ManualClock};
///
/// let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
/// let clock = ManualClock::new(t0);
/// clock.advance(TimeDelta::minutes(5));
/// assert_eq!(clock.now(), t0 + TimeDelta::minutes(5));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// Start the clock at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().expect("manual clock lock poisoned") = now;
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut guard = self.now.write().expect("manual clock lock poisoned");
        *guard += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().expect("manual clock lock poisoned")
    }
}
