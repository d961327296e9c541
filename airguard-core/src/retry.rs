//! Bounded Retry with Escalating Delay
//!
//! ## Why Escalating, Not Exponential?
//!
//! The sensor sits on the same LAN as the monitor. When it is unreachable the
//! cause is almost always local and short-lived: a router reboot, a Wi-Fi
//! reassociation, the sensor's own firmware restart. Those take a minute or
//! two, not hours. A linear escalation spreads a handful of attempts over a
//! few minutes without hammering the device, and the hard cap turns a sensor
//! that is gone for good into a clean, logged exit instead of a silent
//! infinite loop.
//!
//! ```text
//! attempt index:   0        1         2          3
//! result:          fail     fail      fail       fail -> Exhausted
//! wait after:      D        D+E       D+2E       (none)
//! defaults:        90 s     180 s     270 s
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use airguard_core::retry::RetryPolicy;
//! use airguard_core::time::SystemClock;
//!
//! let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1));
//! let value: Result<u32, airguard_core::RetryError<std::io::Error>> =
//!     policy.run(&SystemClock, "answer", || Ok(42));
//! assert_eq!(value.unwrap(), 42);
//! ```

use std::fmt::Display;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_S, DEFAULT_RETRY_ESCALATION_S};
use crate::errors::{RetryError, Transient};
use crate::time::Clock;

/// Retry budget and back-off schedule
///
/// Plain configuration data; the operation and the transient predicate are
/// supplied per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Wait after the first failure (seconds)
    pub delay_secs: u64,
    /// Added to the wait for each subsequent failure (seconds)
    pub escalation_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_secs: DEFAULT_RETRY_DELAY_S,
            escalation_secs: DEFAULT_RETRY_ESCALATION_S,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from durations; sub-second parts are rounded down
    pub fn new(max_attempts: u32, delay: Duration, escalation: Duration) -> Self {
        Self {
            max_attempts,
            delay_secs: delay.as_secs(),
            escalation_secs: escalation.as_secs(),
        }
    }

    /// Wait after the failure at `attempt_index` (0-based): `D + E × index`
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let secs = self
            .delay_secs
            .saturating_add(self.escalation_secs.saturating_mul(u64::from(attempt_index)));
        Duration::from_secs(secs)
    }

    /// Worst-case time spent waiting before the budget is exhausted
    pub fn worst_case_wait(&self) -> Duration {
        (0..self.budget().saturating_sub(1))
            .map(|index| self.delay_for(index))
            .sum()
    }

    /// Effective attempt budget; a zero budget still makes one attempt
    pub fn budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Run `op`, retrying the failures the error type reports as transient
    pub fn run<T, E, F>(&self, clock: &impl Clock, operation: &str, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: Transient + Display,
    {
        self.run_with(clock, operation, op, E::is_transient)
    }

    /// Run `op`, retrying the failures `is_transient` accepts
    ///
    /// Returns the first success immediately. A failure the predicate rejects
    /// is returned as [`RetryError::Permanent`] without waiting. After
    /// `max_attempts` transient failures one "max attempts reached" error is
    /// logged and [`RetryError::Exhausted`] is returned; no wait follows the
    /// final attempt.
    pub fn run_with<T, E, F, P>(
        &self,
        clock: &impl Clock,
        operation: &str,
        mut op: F,
        is_transient: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let budget = self.budget();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match op() {
                Ok(value) => {
                    log::debug!("{operation}: attempt={attempt}/{budget} result=ok");
                    return Ok(value);
                }
                Err(error) if !is_transient(&error) => {
                    log::error!("{operation}: attempt={attempt}/{budget} non-transient failure: {error}");
                    return Err(RetryError::Permanent {
                        operation: operation.to_string(),
                        error,
                    });
                }
                Err(error) => {
                    log::warn!("{operation}: attempt={attempt}/{budget} failed: {error}");
                    if attempt >= budget {
                        log::error!("{operation}: max of {budget} attempts reached");
                        return Err(RetryError::Exhausted {
                            operation: operation.to_string(),
                            attempts: attempt,
                            last: error,
                        });
                    }
                    let wait = self.delay_for(attempt - 1);
                    log::info!("{operation}: retrying in {}s", wait.as_secs());
                    clock.sleep(wait);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedClock;
    use chrono::NaiveDate;
    use std::io;

    fn clock() -> FixedClock {
        FixedClock::new(
            NaiveDate::from_ymd_opt(2024, 7, 6)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
    }

    fn timeout() -> io::Error {
        io::Error::from(io::ErrorKind::TimedOut)
    }

    #[test]
    fn delay_escalates_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(90));
        assert_eq!(policy.delay_for(1), Duration::from_secs(180));
        assert_eq!(policy.delay_for(2), Duration::from_secs(270));

        // Three waits between four attempts
        assert_eq!(policy.worst_case_wait(), Duration::from_secs(540));
    }

    #[test]
    fn success_on_first_attempt_never_sleeps() {
        let clock = clock();
        let mut calls = 0;
        let result: Result<&str, RetryError<io::Error>> =
            RetryPolicy::default().run(&clock, "fetch", || {
                calls += 1;
                Ok("payload")
            });

        assert_eq!(result.unwrap(), "payload");
        assert_eq!(calls, 1);
        assert_eq!(clock.total_slept(), Duration::ZERO);
    }

    #[test]
    fn recovers_after_transient_failures() {
        let clock = clock();
        let mut calls = 0;
        let result = RetryPolicy::default().run(&clock, "fetch", || {
            calls += 1;
            if calls < 3 {
                Err(timeout())
            } else {
                Ok(calls)
            }
        });

        assert_eq!(result.unwrap(), 3);
        // Waited 90 s after the first failure and 180 s after the second
        assert_eq!(clock.total_slept(), Duration::from_secs(270));
    }

    #[test]
    fn exhausts_budget_without_trailing_sleep() {
        let clock = clock();
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::default().run(&clock, "fetch", || {
            calls += 1;
            Err(timeout())
        });

        match result {
            Err(RetryError::Exhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last.kind(), io::ErrorKind::TimedOut);
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(calls, 4);
        assert_eq!(clock.total_slept(), Duration::from_secs(90 + 180 + 270));
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let clock = clock();
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::default().run(&clock, "fetch", || {
            calls += 1;
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        });

        assert!(matches!(result, Err(RetryError::Permanent { .. })));
        assert_eq!(calls, 1);
        assert_eq!(clock.total_slept(), Duration::ZERO);
    }

    #[test]
    fn custom_predicate_overrides_error_classification() {
        let clock = clock();
        let mut calls = 0;
        let policy = RetryPolicy::new(2, Duration::from_secs(1), Duration::ZERO);
        let result: Result<(), RetryError<String>> = policy.run_with(
            &clock,
            "fetch",
            || {
                calls += 1;
                Err("busy".to_string())
            },
            |error| error == "busy",
        );

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 2, .. })));
        assert_eq!(calls, 2);
    }

    #[test]
    fn zero_budget_still_attempts_once() {
        let clock = clock();
        let policy = RetryPolicy::new(0, Duration::from_secs(5), Duration::from_secs(5));
        let result: Result<(), _> = policy.run(&clock, "fetch", || Err(timeout()));

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
        assert_eq!(clock.total_slept(), Duration::ZERO);
    }
}
