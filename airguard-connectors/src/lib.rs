//! Sensor Transports for AirGuard
//!
//! ## Overview
//!
//! A transport turns "give me the current reading" into whatever the device
//! speaks on the wire and hands back the raw JSON object. Everything after
//! that (field extraction, conversion, storage) is transport-agnostic and
//! lives in `airguard-core`.
//!
//! ## Supported Devices
//!
//! ### PurpleAir (local HTTP)
//!
//! **When to use:**
//! - Sensor on the same LAN as the monitor
//! - No cloud API key available or wanted
//! - Readings needed at a two-minute cadence or faster
//!
//! **Characteristics:**
//! - `GET http://<sensor>/json?live=true`, no authentication
//! - One flat JSON object per response, a few kilobytes
//! - The sensor reboots itself now and then; brief outages are normal
//!
//! ## Failure Classification
//!
//! Every transport error implements [`airguard_core::Transient`] so the
//! retry executor can decide whether to try again:
//!
//! | Failure | Class | Why |
//! |---------|-------|-----|
//! | DNS, connect, reset, timeout | transient | network blips clear on their own |
//! | Non-2xx status | transient | sensor firmware busy or rebooting |
//! | Body not JSON | malformed | the same firmware returns the same body |
//!
//! ## Example Usage
//!
//! ```no_run
//! use airguard_connectors::http::{HttpSensor, HttpSensorConfig};
//! use airguard_core::SensorSource;
//!
//! let mut sensor = HttpSensor::new(HttpSensorConfig::new("http://192.168.1.50/json"))?;
//! let payload = sensor.fetch()?;
//! println!("humidity: {}", payload["current_humidity"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(feature = "http")]
pub mod http;

// Re-export common types
#[cfg(feature = "http")]
pub use http::{FetchError, HttpSensor, HttpSensorConfig};

/// Request statistics common to all transports
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchStats {
    /// Requests that returned a payload
    pub fetched: u64,
    /// Requests that failed, for any reason
    pub failed: u64,
    /// Response body bytes received
    pub bytes_received: u64,
    /// Last error message
    pub last_error: Option<String>,
}

impl FetchStats {
    pub(crate) fn record_success(&mut self, bytes: usize) {
        self.fetched += 1;
        self.bytes_received += bytes as u64;
    }

    pub(crate) fn record_failure(&mut self, error: &impl std::fmt::Display) {
        self.failed += 1;
        self.last_error = Some(error.to_string());
    }
}
