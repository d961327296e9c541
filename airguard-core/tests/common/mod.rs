//! Common fixtures for integration tests
//!
//! This module provides:
//! - A scripted sensor source that replays queued responses
//! - A recording render sink
//! - Payload and timestamp helpers

#![allow(dead_code)]

use std::collections::VecDeque;
use std::fmt;

use chrono::NaiveDate;
use serde_json::{json, Value};

use airguard_core::{
    MalformedPayload, RenderSink, Sample, SensorSource, SourceError, Timestamp, Transient,
};

/// Failure modes a scripted source can produce
#[derive(Debug, Clone, PartialEq)]
pub enum FakeError {
    /// Network-style failure, retried
    Offline,
    /// Payload-shape failure, skips the cycle
    Garbage(MalformedPayload),
    /// Anything else, stops the loop
    Broken,
}

impl fmt::Display for FakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FakeError::Offline => write!(f, "sensor offline"),
            FakeError::Garbage(inner) => write!(f, "{inner}"),
            FakeError::Broken => write!(f, "sensor broken"),
        }
    }
}

impl std::error::Error for FakeError {}

impl Transient for FakeError {
    fn is_transient(&self) -> bool {
        matches!(self, FakeError::Offline)
    }
}

impl SourceError for FakeError {
    fn malformed(&self) -> Option<&MalformedPayload> {
        match self {
            FakeError::Garbage(inner) => Some(inner),
            _ => None,
        }
    }
}

/// Source that replays queued responses, then repeats a fallback
pub struct ScriptedSource {
    queue: VecDeque<Result<Value, FakeError>>,
    fallback: Result<Value, FakeError>,
    pub calls: usize,
}

impl ScriptedSource {
    /// Always answers with `payload`
    pub fn healthy(payload: Value) -> Self {
        Self {
            queue: VecDeque::new(),
            fallback: Ok(payload),
            calls: 0,
        }
    }

    /// Always fails with `error`
    pub fn failing(error: FakeError) -> Self {
        Self {
            queue: VecDeque::new(),
            fallback: Err(error),
            calls: 0,
        }
    }

    /// Queue one response ahead of the fallback
    pub fn then(mut self, response: Result<Value, FakeError>) -> Self {
        self.queue.push_back(response);
        self
    }
}

impl SensorSource for ScriptedSource {
    type Error = FakeError;

    fn fetch(&mut self) -> Result<Value, FakeError> {
        self.calls += 1;
        self.queue
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Debug)]
pub struct SinkFailure;

impl fmt::Display for SinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "render target unavailable")
    }
}

impl std::error::Error for SinkFailure {}

/// Sink that remembers the length of every series it receives
#[derive(Default)]
pub struct RecordingSink {
    pub renders: Vec<usize>,
    pub fail: bool,
}

impl RenderSink for RecordingSink {
    type Error = SinkFailure;

    fn render(&mut self, series: &[Sample]) -> Result<(), SinkFailure> {
        if self.fail {
            return Err(SinkFailure);
        }
        self.renders.push(series.len());
        Ok(())
    }
}

/// Live payload with equal channel readings
pub fn payload(concentration: f64, humidity: f64) -> Value {
    json!({
        "SensorId": "84:f3:eb:7b:c8:ee",
        "current_humidity": humidity,
        "pm2_5_atm": concentration,
        "pm2_5_atm_b": concentration,
    })
}

pub fn at(day: u32, hour: u32, minute: u32) -> Timestamp {
    NaiveDate::from_ymd_opt(2024, 7, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}
