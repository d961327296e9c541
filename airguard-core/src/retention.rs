//! Rolling Retention Window
//!
//! The series file grows by one line per logging interval, forever, unless
//! something prunes it. The truncator keeps a rolling window measured back
//! from the newest sample (not from "now"), so a monitor that was down for a
//! week still keeps its last `W` days of data instead of discarding them all.
//!
//! ```text
//!  t-20d      t-13d            t-1d  t
//!    x          x                x   x
//!    |<-- cut --|<------ W = 14 days ------>|
//! ```
//!
//! ## Checkpoint
//!
//! Truncation runs on a cadence measured in hours or days. Restarting the
//! process must neither re-truncate immediately nor push the next run a full
//! interval into the future, so the time of the last run is persisted in a
//! small file next to the series:
//!
//! ```text
//! 2024-07-06T03:00:00
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_RETENTION_DAYS, DEFAULT_TRUNCATE_INTERVAL_H, SECONDS_PER_HOUR};
use crate::errors::StoreError;
use crate::store::{write_atomically, Sample, SeriesStore};
use crate::time::{elapsed, format_timestamp, parse_timestamp, Timestamp};

/// Retention settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    /// Days of history kept, measured back from the newest sample
    pub days_to_log: u32,
    /// Hours between truncation runs
    pub truncate_interval_hours: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days_to_log: DEFAULT_RETENTION_DAYS,
            truncate_interval_hours: DEFAULT_TRUNCATE_INTERVAL_H,
        }
    }
}

impl RetentionConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.days_to_log))
    }

    pub fn truncate_interval(&self) -> Duration {
        Duration::from_secs(self.truncate_interval_hours.saturating_mul(SECONDS_PER_HOUR))
    }
}

/// What a truncation pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationOutcome {
    /// No series file yet; nothing to truncate
    StoreMissing,
    /// Every sample is inside the window; the file was not touched
    Unchanged { kept: usize },
    /// Old samples were dropped and the file rewritten
    Truncated { removed: usize, kept: usize },
}

/// Samples with `timestamp >= newest - window`, in original order
///
/// Returns `None` when nothing would be removed, including for an empty
/// series.
pub fn retain_window(series: &[Sample], window: chrono::Duration) -> Option<Vec<Sample>> {
    let newest = series.iter().map(|s| s.timestamp).max()?;
    let cutoff = newest.checked_sub_signed(window).unwrap_or(Timestamp::MIN);

    let kept: Vec<Sample> = series
        .iter()
        .filter(|s| s.timestamp >= cutoff)
        .copied()
        .collect();

    (kept.len() != series.len()).then_some(kept)
}

/// Enforces the retention window over a [`SeriesStore`]
#[derive(Debug, Clone, Copy)]
pub struct RetentionTruncator {
    window: chrono::Duration,
}

impl RetentionTruncator {
    pub fn new(window: chrono::Duration) -> Self {
        Self { window }
    }

    pub fn from_days(days: u32) -> Self {
        Self::new(chrono::Duration::days(i64::from(days)))
    }

    pub fn window(&self) -> chrono::Duration {
        self.window
    }

    /// Prune the store, rewriting it only if something falls outside the window
    pub fn run(&self, store: &SeriesStore) -> Result<TruncationOutcome, StoreError> {
        if !store.exists() {
            log::info!(
                "retention: {} does not exist yet, nothing to truncate",
                store.path().display()
            );
            return Ok(TruncationOutcome::StoreMissing);
        }

        let series = store.read_all()?;
        match retain_window(&series, self.window) {
            None => {
                log::debug!("retention: all {} samples inside window", series.len());
                Ok(TruncationOutcome::Unchanged { kept: series.len() })
            }
            Some(kept) => {
                store.rewrite_all(&kept)?;
                let removed = series.len() - kept.len();
                log::info!(
                    "retention: removed={removed} kept={} window_days={}",
                    kept.len(),
                    self.window.num_days()
                );
                Ok(TruncationOutcome::Truncated {
                    removed,
                    kept: kept.len(),
                })
            }
        }
    }
}

/// Durable record of the last truncation run
#[derive(Debug, Clone)]
pub struct RetentionCheckpoint {
    path: PathBuf,
    last_run: Timestamp,
}

impl RetentionCheckpoint {
    /// Read the checkpoint, creating it with `now` if absent or unreadable
    pub fn load_or_init(path: impl Into<PathBuf>, now: Timestamp) -> Result<Self, StoreError> {
        let path = path.into();

        let stored = match fs::read_to_string(&path) {
            Ok(text) => match parse_timestamp(text.trim()) {
                Ok(ts) => Some(ts),
                Err(_) => {
                    log::warn!(
                        "retention checkpoint {}: unreadable contents {:?}, starting over",
                        path.display(),
                        text.trim()
                    );
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::io("read", &path, e)),
        };

        match stored {
            Some(last_run) => {
                log::info!(
                    "retention checkpoint: last truncation at {}",
                    format_timestamp(&last_run)
                );
                Ok(Self { path, last_run })
            }
            None => {
                let mut checkpoint = Self {
                    path,
                    last_run: now,
                };
                checkpoint.record(now)?;
                Ok(checkpoint)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_run(&self) -> Timestamp {
        self.last_run
    }

    /// True once `interval` has passed since the last run
    pub fn is_due(&self, now: Timestamp, interval: Duration) -> bool {
        elapsed(self.last_run, now) >= interval
    }

    /// Persist `now` as the last run
    ///
    /// The in-memory value is updated even if the write fails, so a broken
    /// disk delays the next run by one interval instead of retrying every tick.
    pub fn record(&mut self, now: Timestamp) -> Result<(), StoreError> {
        self.last_run = now;
        let mut line = format_timestamp(&now);
        line.push('\n');
        write_atomically(&self.path, &line)
    }
}

/// Truncation cadence: truncator, checkpoint and interval together
#[derive(Debug, Clone)]
pub struct Retention {
    truncator: RetentionTruncator,
    checkpoint: RetentionCheckpoint,
    interval: Duration,
}

impl Retention {
    pub fn new(config: &RetentionConfig, checkpoint: RetentionCheckpoint) -> Self {
        Self {
            truncator: RetentionTruncator::new(config.window()),
            checkpoint,
            interval: config.truncate_interval(),
        }
    }

    pub fn checkpoint(&self) -> &RetentionCheckpoint {
        &self.checkpoint
    }

    pub fn truncator(&self) -> &RetentionTruncator {
        &self.truncator
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        self.checkpoint.is_due(now, self.interval)
    }

    /// Truncate, then checkpoint `now` whatever the truncation outcome
    pub fn run(&mut self, store: &SeriesStore, now: Timestamp) -> Result<TruncationOutcome, StoreError> {
        let outcome = self.truncator.run(store);
        if let Err(e) = self.checkpoint.record(now) {
            log::error!("retention checkpoint: {e}");
        }
        outcome
    }
}
