//! Default Values and Fixed Formats
//!
//! Every numeric default used by the engine lives here with a short note on
//! where it comes from. Configuration falls back to these values when a key
//! is absent.

// ===== TIME UNIT CONVERSIONS =====

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: u64 = 60;

/// Seconds per hour.
pub const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;

/// Hours per day, also the exclusive upper bound of the observation window.
pub const HOURS_PER_DAY: u32 = 24;

// ===== CADENCES =====

/// Scheduler tick granularity (milliseconds).
///
/// Every cadence is checked once per tick, so this bounds timing precision.
pub const TICK_INTERVAL_MS: u64 = 1000;

/// How often the sensor is polled and a sample appended (seconds).
///
/// The sensor itself refreshes its live reading every 2 minutes.
pub const DEFAULT_LOGGING_INTERVAL_S: u64 = 120;

/// How often the chart is redrawn (seconds).
pub const DEFAULT_PLOTTING_INTERVAL_S: u64 = 240;

/// How often retention truncation runs (hours).
pub const DEFAULT_TRUNCATE_INTERVAL_H: u64 = 24;

/// First local hour of the observation window (inclusive).
pub const DEFAULT_START_HOUR: u32 = 0;

/// Last local hour of the observation window (exclusive).
pub const DEFAULT_FINISH_HOUR: u32 = HOURS_PER_DAY;

// ===== RETENTION =====

/// Rolling history kept in the series file (days).
pub const DEFAULT_RETENTION_DAYS: u32 = 14;

// ===== RETRY =====

/// Sensor fetch attempts before the failure becomes fatal.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Wait before the second attempt (seconds).
///
/// Long enough to ride out a router reboot or a Wi-Fi reassociation.
pub const DEFAULT_RETRY_DELAY_S: u64 = 90;

/// Added to the wait for each further attempt (seconds).
///
/// With the defaults the waits are 90 s, 180 s, 270 s: about 9 minutes of
/// tolerance before the monitor gives up.
pub const DEFAULT_RETRY_ESCALATION_S: u64 = 90;

// ===== SENSOR CALIBRATION =====

/// Offset added to the sensor's reported relative humidity (percentage points).
///
/// The BME280 inside the sensor housing runs warm and reads roughly 4% low.
pub const DEFAULT_HUMIDITY_OFFSET_PCT: f64 = 4.0;

// ===== PERSISTED FORMATS =====

/// Header row of the series file, written exactly once at creation.
pub const SERIES_HEADER: &str = "datetime,value";

/// Query string asking the sensor for its live (not 2-minute averaged) reading.
pub const LIVE_QUERY: &str = "?live=true";
