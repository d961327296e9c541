//! HTTP Sensor Source - PurpleAir Local JSON Endpoint
//!
//! ## Overview
//!
//! PurpleAir sensors serve their current state at `/json` on the local
//! network. Without a query string the firmware returns two-minute averages;
//! `?live=true` returns the latest instantaneous reading, which is what a
//! monitor polling every couple of minutes wants.
//!
//! ## Design Decisions
//!
//! ### Blocking client
//!
//! The monitor loop is single-threaded and never has more than one request
//! in flight, so a blocking `ureq` agent is enough:
//! - No async runtime to start or shut down
//! - Timeouts are a single agent setting
//! - The agent keeps the TCP connection alive between polls
//!
//! ### No retries here
//!
//! The connector makes exactly one request per `fetch`. Retrying, back-off
//! and giving up belong to the core retry executor, which consults
//! [`FetchError::is_transient`](airguard_core::Transient::is_transient).
//!
//! ## Example Usage
//!
//! ```no_run
//! use airguard_connectors::http::{HttpSensor, HttpSensorConfig};
//! use airguard_core::SensorSource;
//!
//! let config = HttpSensorConfig::new("http://192.168.1.50/json").timeout_secs(10);
//! let mut sensor = HttpSensor::new(config)?;
//!
//! let payload = sensor.fetch()?;
//! assert!(payload.get("pm2_5_atm").is_some());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use airguard_core::constants::LIVE_QUERY;
use airguard_core::{MalformedPayload, SensorSource, SourceError, Transient};

use crate::FetchStats;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP-specific errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connect, TLS or socket failure, including timeouts
    #[error("request failed: {0}")]
    Transport(String),

    /// Sensor answered with a non-2xx status
    #[error("sensor returned {status} {reason}")]
    Status { status: u16, reason: String },

    /// Connection dropped while reading the body
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Body arrived but is not a usable payload
    #[error(transparent)]
    Malformed(MalformedPayload),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Transport(_) | FetchError::Status { .. } | FetchError::Body(_)
        )
    }
}

impl SourceError for FetchError {
    fn malformed(&self) -> Option<&MalformedPayload> {
        match self {
            FetchError::Malformed(inner) => Some(inner),
            _ => None,
        }
    }
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => FetchError::Status {
                status,
                reason: response.status_text().to_string(),
            },
            ureq::Error::Transport(transport) => FetchError::Transport(transport.to_string()),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_live() -> bool {
    true
}

/// Sensor endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSensorConfig {
    /// JSON endpoint, e.g. `http://192.168.1.50/json`
    pub connection_url: String,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Request the instantaneous reading instead of the two-minute average
    #[serde(default = "default_live")]
    pub live: bool,
}

impl HttpSensorConfig {
    /// Create new configuration for an endpoint
    pub fn new(connection_url: impl Into<String>) -> Self {
        Self {
            connection_url: connection_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            live: true,
        }
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Ask for the averaged reading instead of the live one
    pub fn averaged(mut self) -> Self {
        self.live = false;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the URL scheme and the timeout
    pub fn validate(&self) -> Result<(), FetchError> {
        let url = self.connection_url.trim();
        let rest = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .ok_or_else(|| {
                FetchError::Config(format!(
                    "connection_url must start with http:// or https://, got {url:?}"
                ))
            })?;

        if rest.is_empty() || rest.starts_with('/') {
            return Err(FetchError::Config(format!(
                "connection_url has no host: {url:?}"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(FetchError::Config("timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Full request URL, with the live query appended when enabled
    pub fn request_url(&self) -> String {
        let url = self.connection_url.trim();
        if !self.live {
            return url.to_string();
        }
        if url.contains('?') {
            format!("{url}&{}", LIVE_QUERY.trim_start_matches('?'))
        } else {
            format!("{url}{LIVE_QUERY}")
        }
    }
}

/// Sensor source backed by a blocking `ureq` agent
pub struct HttpSensor {
    url: String,
    agent: ureq::Agent,
    stats: FetchStats,
}

impl HttpSensor {
    /// Create new HTTP sensor source
    pub fn new(config: HttpSensorConfig) -> Result<Self, FetchError> {
        config.validate()?;

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout())
            .user_agent(&format!("AirGuard/{}", airguard_core::VERSION))
            .build();

        Ok(Self {
            url: config.request_url(),
            agent,
            stats: FetchStats::default(),
        })
    }

    /// URL requested on every fetch
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    fn get(&self) -> Result<(Value, usize), FetchError> {
        let response = self
            .agent
            .get(&self.url)
            .set("Accept", "application/json")
            .call()?;

        let body = response
            .into_string()
            .map_err(|e| FetchError::Body(e.to_string()))?;

        let payload = serde_json::from_str(&body)
            .map_err(|e| FetchError::Malformed(MalformedPayload::NotJson(e.to_string())))?;

        Ok((payload, body.len()))
    }
}

impl SensorSource for HttpSensor {
    type Error = FetchError;

    fn fetch(&mut self) -> Result<Value, FetchError> {
        match self.get() {
            Ok((payload, bytes)) => {
                self.stats.record_success(bytes);
                log::debug!("fetched url={} bytes={bytes}", self.url);
                Ok(payload)
            }
            Err(e) => {
                self.stats.record_failure(&e);
                Err(e)
            }
        }
    }
}
