//! Multi-Cadence Scheduler
//!
//! ## Overview
//!
//! One sequential loop drives everything. Every tick (1 second by default) it
//! checks three independent cadences and runs whichever are due:
//!
//! ```text
//!            ┌──────────── tick ────────────┐
//!            │ hour in [start, finish)?     │── no ──> sleep
//!            └──────────────┬───────────────┘
//!                           │ yes
//!   log due?    ── fetch (retry) → normalize → convert → append
//!   render due? ── read_all → render sink
//!   truncate due (checkpointed)? ── truncate → record checkpoint
//!                           │
//!                         sleep
//! ```
//!
//! ## Single Thread
//!
//! At most one poll is ever in flight and the store has exactly one writer,
//! so nothing around the series file is locked. A poll that spends minutes
//! in retry back-off delays the whole tick; the render and truncate checks
//! then run late by the same amount.
//!
//! ## Cadence Clocks
//!
//! | Cadence | Baseline at startup | Survives restart |
//! |---------|--------------------|------------------|
//! | log | now | no |
//! | render | now | no |
//! | truncate | checkpoint file | yes |
//!
//! The log cadence resets after every cycle, including skipped ones, so a
//! sensor that keeps returning a malformed payload is polled once per
//! interval instead of once per tick.

use std::time::Duration;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FINISH_HOUR, DEFAULT_LOGGING_INTERVAL_S, DEFAULT_PLOTTING_INTERVAL_S,
    DEFAULT_START_HOUR, TICK_INTERVAL_MS,
};
use crate::conversion::Converter;
use crate::errors::{MalformedPayload, RetryError, SchedulerError};
use crate::reading::ReadingNormalizer;
use crate::retention::{Retention, TruncationOutcome};
use crate::retry::RetryPolicy;
use crate::store::{Sample, SeriesStore};
use crate::time::{elapsed, format_timestamp, Clock, Timestamp};
use crate::traits::{RenderSink, SensorSource, SourceError};

/// Label used in retry log records
const FETCH_OPERATION: &str = "sensor fetch";

/// Cadence and gating settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Seconds between sensor polls
    pub logging_interval_secs: u64,
    /// Seconds between chart renders
    pub plotting_interval_secs: u64,
    /// First local hour of the observation window (inclusive)
    pub start_hour: u32,
    /// Last local hour of the observation window (exclusive)
    pub finish_hour: u32,
    /// Loop granularity in milliseconds
    pub tick_millis: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            logging_interval_secs: DEFAULT_LOGGING_INTERVAL_S,
            plotting_interval_secs: DEFAULT_PLOTTING_INTERVAL_S,
            start_hour: DEFAULT_START_HOUR,
            finish_hour: DEFAULT_FINISH_HOUR,
            tick_millis: TICK_INTERVAL_MS,
        }
    }
}

impl ScheduleConfig {
    pub fn logging_interval(&self) -> Duration {
        Duration::from_secs(self.logging_interval_secs)
    }

    pub fn plotting_interval(&self) -> Duration {
        Duration::from_secs(self.plotting_interval_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    /// Whether `hour` falls inside `[start_hour, finish_hour)`
    ///
    /// A window with `start_hour > finish_hour` wraps past midnight
    /// (22 → 6 covers 22:00–05:59).
    pub fn is_active_hour(&self, hour: u32) -> bool {
        let (start, finish) = (self.start_hour, self.finish_hour);
        if start <= finish {
            start <= hour && hour < finish
        } else {
            hour >= start || hour < finish
        }
    }
}

/// Why a log cycle did not append a sample
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The sensor answered, but not with a usable payload
    Malformed(MalformedPayload),
    /// The sample could not be written
    WriteFailed(String),
}

/// One cadence firing within a tick
#[derive(Debug, Clone, PartialEq)]
pub enum CadenceEvent {
    /// A sample was appended
    Logged(Sample),
    /// The log cycle ran but wrote nothing
    Skipped(SkipReason),
    /// The sink received the series
    Rendered { samples: usize },
    /// Reading the series or rendering it failed
    RenderFailed(String),
    /// A truncation pass ran
    Truncated(TruncationOutcome),
    /// The truncation pass failed
    TruncateFailed(String),
}

/// Everything that happened in one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Clock reading at the start of the tick
    pub at: Timestamp,
    /// True when the tick fell outside the observation window
    pub gated: bool,
    /// Cadences that fired, in evaluation order
    pub events: Vec<CadenceEvent>,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.events.is_empty()
    }

    pub fn logged(&self) -> Option<&Sample> {
        self.events.iter().find_map(|event| match event {
            CadenceEvent::Logged(sample) => Some(sample),
            _ => None,
        })
    }
}

/// Process-local cadence baselines
#[derive(Debug, Clone, Copy)]
struct CadenceState {
    last_logged: Timestamp,
    last_rendered: Timestamp,
}

/// The acquisition–retention control loop
pub struct Scheduler<C, S, K, V> {
    config: ScheduleConfig,
    retry: RetryPolicy,
    clock: C,
    source: S,
    sink: K,
    normalizer: ReadingNormalizer<V>,
    store: SeriesStore,
    retention: Retention,
    cadence: CadenceState,
}

impl<C, S, K, V> Scheduler<C, S, K, V>
where
    C: Clock,
    S: SensorSource,
    K: RenderSink,
    V: Converter,
{
    /// Assemble the loop; log and render baselines start at `clock.now()`
    pub fn new(
        config: ScheduleConfig,
        clock: C,
        source: S,
        sink: K,
        normalizer: ReadingNormalizer<V>,
        store: SeriesStore,
        retention: Retention,
    ) -> Self {
        let now = clock.now();
        Self {
            config,
            retry: RetryPolicy::default(),
            clock,
            source,
            sink,
            normalizer,
            store,
            retention,
            cadence: CadenceState {
                last_logged: now,
                last_rendered: now,
            },
        }
    }

    /// Replace the default retry policy for sensor fetches
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    pub fn retention(&self) -> &Retention {
        &self.retention
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Run forever; returns only on a fatal error
    pub fn run(&mut self) -> Result<(), SchedulerError> {
        self.run_while(|_| true)
    }

    /// Run ticks until `keep_going` returns false or a fatal error occurs
    ///
    /// The predicate sees each tick's report before the tick's sleep.
    pub fn run_while<F>(&mut self, mut keep_going: F) -> Result<(), SchedulerError>
    where
        F: FnMut(&TickReport) -> bool,
    {
        log::info!(
            "scheduler: started logging_interval={}s plotting_interval={}s window=[{}, {})",
            self.config.logging_interval_secs,
            self.config.plotting_interval_secs,
            self.config.start_hour,
            self.config.finish_hour
        );
        loop {
            let report = self.tick()?;
            if !keep_going(&report) {
                return Ok(());
            }
            self.clock.sleep(self.config.tick());
        }
    }

    /// Evaluate every cadence once
    pub fn tick(&mut self) -> Result<TickReport, SchedulerError> {
        let at = self.clock.now();
        let mut report = TickReport {
            at,
            gated: false,
            events: Vec::new(),
        };

        if !self.config.is_active_hour(at.hour()) {
            report.gated = true;
            return Ok(report);
        }

        if elapsed(self.cadence.last_logged, at) >= self.config.logging_interval() {
            let event = self.log_cycle()?;
            self.cadence.last_logged = self.clock.now();
            report.events.push(event);
        }

        // A slow poll moved the clock; later cadences see the delayed time
        let now = self.clock.now();
        if elapsed(self.cadence.last_rendered, now) >= self.config.plotting_interval() {
            report.events.push(self.render_cycle());
            self.cadence.last_rendered = self.clock.now();
        }

        let now = self.clock.now();
        if self.retention.is_due(now) {
            report.events.push(self.truncate_cycle(now));
        }

        Ok(report)
    }

    /// Poll, normalize, convert and append one sample
    fn log_cycle(&mut self) -> Result<CadenceEvent, SchedulerError> {
        let source = &mut self.source;
        let payload = match self.retry.run(&self.clock, FETCH_OPERATION, || source.fetch()) {
            Ok(payload) => payload,
            Err(RetryError::Exhausted { attempts, last, .. }) => {
                return Err(SchedulerError::RetriesExhausted {
                    attempts,
                    last: Box::new(last),
                });
            }
            Err(RetryError::Permanent { error, .. }) => {
                return match error.malformed() {
                    Some(malformed) => {
                        log::warn!("log cycle skipped: {malformed}");
                        Ok(CadenceEvent::Skipped(SkipReason::Malformed(malformed.clone())))
                    }
                    None => Err(SchedulerError::Source(Box::new(error))),
                };
            }
        };

        let value = match self.normalizer.index(&payload) {
            Ok(value) => value,
            Err(malformed) => {
                log::warn!("log cycle skipped: {malformed}");
                return Ok(CadenceEvent::Skipped(SkipReason::Malformed(malformed)));
            }
        };

        let sample = Sample::new(self.clock.now(), value);
        if let Err(e) = self.store.append(&sample) {
            log::error!("log cycle skipped: {e}");
            return Ok(CadenceEvent::Skipped(SkipReason::WriteFailed(e.to_string())));
        }

        log::info!(
            "logged timestamp={} value={}",
            format_timestamp(&sample.timestamp),
            sample.value
        );
        Ok(CadenceEvent::Logged(sample))
    }

    fn render_cycle(&mut self) -> CadenceEvent {
        let series = match self.store.read_all() {
            Ok(series) => series,
            Err(e) => {
                log::error!("render skipped: {e}");
                return CadenceEvent::RenderFailed(e.to_string());
            }
        };

        match self.sink.render(&series) {
            Ok(()) => {
                log::debug!("rendered samples={}", series.len());
                CadenceEvent::Rendered {
                    samples: series.len(),
                }
            }
            Err(e) => {
                log::error!("render failed: {e}");
                CadenceEvent::RenderFailed(e.to_string())
            }
        }
    }

    fn truncate_cycle(&mut self, now: Timestamp) -> CadenceEvent {
        match self.retention.run(&self.store, now) {
            Ok(outcome) => CadenceEvent::Truncated(outcome),
            Err(e) => {
                log::error!("truncation failed: {e}");
                CadenceEvent::TruncateFailed(e.to_string())
            }
        }
    }
}
