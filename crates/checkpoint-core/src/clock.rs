//! Time sources for the lifecycle policy.
//!
//! Every expiry and grace decision reads "now" through [`Clock`] so the
//! policy can be exercised at fixed instants.

use crate::timestamp::truncate_to_seconds;
use chrono::{Local, NaiveDateTime, TimeDelta};
use std::sync::Mutex;

/// Source of the current local time, at second precision.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the kiosk's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        truncate_to_seconds(Local::now().naive_local())
    }
}

/// Manually driven clock for tests and replays.
///
/// # Examples
///
/// ```
/// use checkpoint_core::clock::{Clock, ManualClock};
/// use checkpoint_core::timestamp::parse_timestamp;
/// use chrono::TimeDelta;
///
/// let clock = ManualClock::new(parse_timestamp("2025-03-14 09:00:00").unwrap());
/// clock.advance(TimeDelta::minutes(5));
/// assert_eq!(clock.now(), parse_timestamp("2025-03-14 09:05:00").unwrap());
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(truncate_to_seconds(start)),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: NaiveDateTime) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = truncate_to_seconds(instant);
    }

    /// Move forward (or backward, for a negative delta).
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
