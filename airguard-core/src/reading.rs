//! Raw Payload Normalization
//!
//! ## Sensor Payload
//!
//! The sensor answers `GET /json?live=true` with one flat JSON object. Only a
//! handful of its fields matter here:
//!
//! ```json
//! {
//!   "current_humidity": 38,
//!   "pm2_5_atm": 4.12,   "pm2_5_atm_b": 3.87,
//!   "pm2_5_cf_1": 4.12,  "pm2_5_cf_1_b": 3.87
//! }
//! ```
//!
//! The device carries two laser counters (channel A and B) and always reports
//! both, so the usable concentration is their mean. Two calibration families
//! exist: `atm` for ambient outdoor air and `cf1` for the factory CF=1
//! calibration, which the EPA correction was fitted against.
//!
//! The humidity sensor sits inside the warm housing and reads low; a fixed
//! offset brings it back toward ambient before it reaches the converter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::DEFAULT_HUMIDITY_OFFSET_PCT;
use crate::conversion::Converter;
use crate::errors::MalformedPayload;

/// Payload key of the device-reported relative humidity
pub const HUMIDITY_FIELD: &str = "current_humidity";

/// Calibration family of the paired concentration fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Ambient ("atm") calibration
    #[default]
    Atm,
    /// Factory CF=1 calibration
    Cf1,
}

impl Channel {
    /// Payload keys of channel A and channel B
    pub fn fields(&self) -> (&'static str, &'static str) {
        match self {
            Channel::Atm => ("pm2_5_atm", "pm2_5_atm_b"),
            Channel::Cf1 => ("pm2_5_cf_1", "pm2_5_cf_1_b"),
        }
    }
}

/// Normalizer settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerConfig {
    /// Which calibration family to average
    pub channel: Channel,
    /// Added to the reported humidity (percentage points)
    pub humidity_offset: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            channel: Channel::default(),
            humidity_offset: DEFAULT_HUMIDITY_OFFSET_PCT,
        }
    }
}

/// The numeric fields the rest of the system needs from one payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedReading {
    /// Mean of channel A and B concentrations (µg/m³)
    pub concentration: f64,
    /// Reported humidity plus the calibration offset (%)
    pub humidity: f64,
}

/// Turns a raw payload into the stored index value
#[derive(Debug, Clone)]
pub struct ReadingNormalizer<V> {
    config: NormalizerConfig,
    converter: V,
}

impl<V: Converter> ReadingNormalizer<V> {
    pub fn new(config: NormalizerConfig, converter: V) -> Self {
        Self { config, converter }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Extract the averaged concentration and adjusted humidity
    pub fn normalize(&self, payload: &Value) -> Result<NormalizedReading, MalformedPayload> {
        let fields = payload.as_object().ok_or(MalformedPayload::NotAnObject)?;

        let number = |key: &str| -> Result<f64, MalformedPayload> {
            let value = fields
                .get(key)
                .ok_or_else(|| MalformedPayload::MissingField(key.to_string()))?;
            value
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| MalformedPayload::NotANumber(key.to_string()))
        };

        let (channel_a, channel_b) = self.config.channel.fields();
        let concentration = (number(channel_a)? + number(channel_b)?) / 2.0;
        let humidity = number(HUMIDITY_FIELD)? + self.config.humidity_offset;

        Ok(NormalizedReading {
            concentration,
            humidity,
        })
    }

    /// Normalize, then hand `(humidity, concentration)` to the converter
    pub fn index(&self, payload: &Value) -> Result<f64, MalformedPayload> {
        let reading = self.normalize(payload)?;
        Ok(self
            .converter
            .convert(reading.humidity, reading.concentration))
    }
}
