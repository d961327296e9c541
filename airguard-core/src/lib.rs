//! Acquisition and retention engine for AirGuard
//!
//! Polls a networked particulate sensor, converts each reading to an air
//! quality index, appends it to a flat time-series file and keeps that file
//! bounded to a rolling window. One synchronous loop drives all of it.
//!
//! Key constraints:
//! - One writer per series file, no locks
//! - Every file mutation survives a kill at any instant
//! - A sensor that stays unreachable ends the process instead of hanging
//!
//! ```no_run
//! use airguard_core::{
//!     AqiConverter, Clock, NormalizerConfig, NullSink, ReadingNormalizer, Retention,
//!     RetentionCheckpoint, RetentionConfig, ScheduleConfig, Scheduler, SensorSource,
//!     SeriesStore, SourceError, SystemClock, Transient,
//! };
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("offline")]
//! struct Offline;
//!
//! impl Transient for Offline {
//!     fn is_transient(&self) -> bool {
//!         true
//!     }
//! }
//! impl SourceError for Offline {}
//!
//! struct Canned;
//!
//! impl SensorSource for Canned {
//!     type Error = Offline;
//!
//!     fn fetch(&mut self) -> Result<serde_json::Value, Offline> {
//!         Ok(serde_json::json!({
//!             "current_humidity": 40, "pm2_5_atm": 8.0, "pm2_5_atm_b": 9.0
//!         }))
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let clock = SystemClock;
//! let checkpoint = RetentionCheckpoint::load_or_init("checkpoint.txt", clock.now())?;
//!
//! let mut scheduler = Scheduler::new(
//!     ScheduleConfig::default(),
//!     clock,
//!     Canned,
//!     NullSink,
//!     ReadingNormalizer::new(NormalizerConfig::default(), AqiConverter::new()),
//!     SeriesStore::new("sensor_data.csv"),
//!     Retention::new(&RetentionConfig::default(), checkpoint),
//! );
//!
//! // Runs until the sensor stays unreachable for a whole retry budget
//! scheduler.run()?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod constants;
pub mod conversion;
pub mod errors;
pub mod reading;
pub mod retention;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod time;
pub mod traits;

// Public API
pub use conversion::{AqiConverter, Converter};
pub use errors::{BoxError, MalformedPayload, RetryError, SchedulerError, StoreError, Transient};
pub use reading::{Channel, NormalizedReading, NormalizerConfig, ReadingNormalizer};
pub use retention::{
    Retention, RetentionCheckpoint, RetentionConfig, RetentionTruncator, TruncationOutcome,
};
pub use retry::RetryPolicy;
pub use scheduler::{CadenceEvent, ScheduleConfig, Scheduler, SkipReason, TickReport};
pub use store::{ReadStats, Sample, Series, SeriesStore};
pub use time::{Clock, FixedClock, SystemClock, Timestamp};
pub use traits::{NullSink, RenderSink, SensorSource, SourceError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
