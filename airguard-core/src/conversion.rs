//! Concentration to Air Quality Index Conversion
//!
//! ## Overview
//!
//! The sensor reports PM2.5 mass concentration in µg/m³. People read the US
//! EPA Air Quality Index, a piecewise-linear rescaling of concentration onto
//! 0–500 with fixed breakpoints per health category:
//!
//! ```text
//! C_low  – C_high   | I_low – I_high | Category
//! ------------------|----------------|-------------------------------
//!   0.0  –  12.0    |    0 –  50     | Good
//!  12.1  –  35.4    |   51 – 100     | Moderate
//!  35.5  –  55.4    |  101 – 150     | Unhealthy for Sensitive Groups
//!  55.5  – 150.4    |  151 – 200     | Unhealthy
//! 150.5  – 250.4    |  201 – 300     | Very Unhealthy
//! 250.5  – 350.4    |  301 – 400     | Hazardous
//! 350.5  – 500.4    |  401 – 500     | Hazardous
//!
//! I = (I_high - I_low) / (C_high - C_low) × (C - C_low) + I_low
//! ```
//!
//! ## Humidity Correction
//!
//! Low-cost laser counters overestimate mass when the air is humid because
//! particles swell with water. The EPA's national correction for these
//! sensors folds relative humidity back in:
//!
//! ```text
//! PM2.5_corrected = 0.524 × PM2.5_raw − 0.0862 × RH + 5.75
//! ```
//!
//! The converter is a seam, not a canonical formula: the scheduler accepts
//! any [`Converter`], including a plain closure.

/// Pure mapping from `(humidity, concentration)` to the stored index value
pub trait Converter {
    /// Convert one reading; must be free of side effects
    fn convert(&self, humidity: f64, concentration: f64) -> f64;
}

impl<F> Converter for F
where
    F: Fn(f64, f64) -> f64,
{
    fn convert(&self, humidity: f64, concentration: f64) -> f64 {
        self(humidity, concentration)
    }
}

/// One row of the AQI breakpoint table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub conc_low: f64,
    pub conc_high: f64,
    pub index_low: f64,
    pub index_high: f64,
}

const fn bp(conc_low: f64, conc_high: f64, index_low: f64, index_high: f64) -> Breakpoint {
    Breakpoint {
        conc_low,
        conc_high,
        index_low,
        index_high,
    }
}

/// US EPA PM2.5 breakpoints, ascending
pub const PM25_BREAKPOINTS: [Breakpoint; 7] = [
    bp(0.0, 12.0, 0.0, 50.0),
    bp(12.1, 35.4, 51.0, 100.0),
    bp(35.5, 55.4, 101.0, 150.0),
    bp(55.5, 150.4, 151.0, 200.0),
    bp(150.5, 250.4, 201.0, 300.0),
    bp(250.5, 350.4, 301.0, 400.0),
    bp(350.5, 500.4, 401.0, 500.0),
];

/// Highest index the table can express
pub const AQI_MAX: f64 = 500.0;

/// PM2.5 concentration to US EPA AQI, optionally humidity-corrected first
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AqiConverter {
    epa_correction: bool,
}

impl AqiConverter {
    /// Plain breakpoint conversion
    pub fn new() -> Self {
        Self {
            epa_correction: false,
        }
    }

    /// Apply the EPA humidity correction before the breakpoint conversion
    pub fn with_epa_correction(mut self, enabled: bool) -> Self {
        self.epa_correction = enabled;
        self
    }

    pub fn epa_correction(&self) -> bool {
        self.epa_correction
    }
}

impl Converter for AqiConverter {
    fn convert(&self, humidity: f64, concentration: f64) -> f64 {
        let concentration = if self.epa_correction {
            epa_correct(humidity, concentration)
        } else {
            concentration
        };
        pm25_to_aqi(concentration)
    }
}

/// EPA national humidity correction, floored at zero
pub fn epa_correct(humidity: f64, concentration: f64) -> f64 {
    (0.524 * concentration - 0.0862 * humidity + 5.75).max(0.0)
}

/// Breakpoint conversion of a PM2.5 concentration, rounded to a whole index
///
/// The concentration is truncated to one decimal as the EPA prescribes, so
/// values between table rows (12.05) fall into the lower row. Negative or
/// non-finite input maps to 0; anything past the table clamps to 500.
pub fn pm25_to_aqi(concentration: f64) -> f64 {
    if !concentration.is_finite() || concentration <= 0.0 {
        return 0.0;
    }

    // Nudge before flooring so 35.4 stored as 35.39999 stays 35.4
    let c = ((concentration * 10.0) + 1e-9).floor() / 10.0;

    match PM25_BREAKPOINTS.iter().find(|row| c <= row.conc_high) {
        Some(row) => {
            let slope = (row.index_high - row.index_low) / (row.conc_high - row.conc_low);
            (slope * (c - row.conc_low) + row.index_low).round()
        }
        None => AQI_MAX,
    }
}
