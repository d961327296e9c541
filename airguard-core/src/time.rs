//! Time management for the monitor loop
//!
//! Provides a clock abstraction so every timing decision in the engine goes
//! through one seam:
//! - Local wall clock (production)
//! - Fixed, manually advanced clock (testing)
//!
//! Sleeping goes through the clock as well. A fixed clock "sleeps" by moving
//! its own time forward, which lets retry back-off and multi-hour cadences run
//! instantly and deterministically in tests.
//!
//! ## Timestamps
//!
//! Samples are stamped with local wall-clock time at second resolution. The
//! observation window is expressed in local hours, so local time is the
//! natural unit for both the gate and the stored series.
//!
//! ```text
//! 2024-07-06T14:02:00   <- TIMESTAMP_FORMAT, sortable as plain text
//! ```
//!
//! ## Daylight Saving
//!
//! Stored timestamps carry no offset. When clocks fall back, the repeated
//! hour is stamped a second time, so the series is non-decreasing except
//! across that fold, where it steps back by up to an hour:
//!
//! ```text
//! 2024-11-03T01:58:00
//! 2024-11-03T01:00:00   <- after fall-back, earlier than the line above
//! ```
//!
//! Nothing downstream relies on strict ordering: [`elapsed`] saturates at
//! zero, so cadences just wait out the repeated hour, and retention measures
//! its window from the newest timestamp wherever it sits in the file. The
//! spring-forward gap simply has no samples.

use std::cell::Cell;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};

/// Local wall-clock instant, truncated to whole seconds
pub type Timestamp = NaiveDateTime;

/// Text layout for every persisted timestamp (series records and checkpoint)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Source of time (and of waiting) for the engine
pub trait Clock {
    /// Current local time at second resolution
    fn now(&self) -> Timestamp;

    /// Block the caller for `duration`
    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Local system clock backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        truncate_to_second(Local::now().naive_local())
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Fixed time source for testing
///
/// `sleep` advances the clock instead of blocking and keeps a running total
/// of everything slept, so tests can assert on back-off delays.
#[derive(Debug)]
pub struct FixedClock {
    now: Cell<Timestamp>,
    slept: Cell<Duration>,
}

impl FixedClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Cell::new(truncate_to_second(now)),
            slept: Cell::new(Duration::ZERO),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.set(truncate_to_second(now));
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(shift(self.now.get(), by));
    }

    /// Total time passed to `sleep` since creation
    pub fn total_slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.slept.set(self.slept.get() + duration);
        self.advance(duration);
    }
}

/// Render a timestamp in the persisted text layout
pub fn format_timestamp(timestamp: &Timestamp) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp written by [`format_timestamp`]
pub fn parse_timestamp(text: &str) -> Result<Timestamp, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
}

/// Drop sub-second precision
pub fn truncate_to_second(timestamp: Timestamp) -> Timestamp {
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}

/// Time elapsed from `earlier` to `later`
///
/// A clock that moved backwards (manual adjustment, DST fold) yields zero
/// rather than a negative span, so a cadence simply waits a little longer.
pub fn elapsed(earlier: Timestamp, later: Timestamp) -> Duration {
    (later - earlier).to_std().unwrap_or(Duration::ZERO)
}

fn shift(timestamp: Timestamp, by: Duration) -> Timestamp {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|delta| timestamp.checked_add_signed(delta))
        .unwrap_or(timestamp)
}
