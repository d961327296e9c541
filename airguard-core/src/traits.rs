//! Collaborator Traits
//!
//! The scheduler talks to the outside world through two seams:
//!
//! - [`SensorSource`]: produces one raw JSON payload per call (the live HTTP
//!   endpoint in production, a scripted fake in tests)
//! - [`RenderSink`]: consumes the full series and produces an artifact (the
//!   chart image in production, a recorder in tests)
//!
//! Both are driven from the scheduler's single thread, so neither needs to be
//! `Send` or `Sync`.

use serde_json::Value;

use crate::errors::{MalformedPayload, Transient};
use crate::store::Sample;

/// Error contract for a sensor source
///
/// Transient errors are retried by the executor. A permanent error that
/// carries a [`MalformedPayload`] skips the current cycle; any other
/// permanent error stops the monitor.
pub trait SourceError: std::error::Error + Transient + Send + Sync + 'static {
    /// The payload problem behind this error, if that is what it is
    fn malformed(&self) -> Option<&MalformedPayload> {
        None
    }
}

/// A fallible, zero-argument producer of raw sensor payloads
pub trait SensorSource {
    /// Failure type of a single fetch
    type Error: SourceError;

    /// Fetch one live payload
    fn fetch(&mut self) -> Result<Value, Self::Error>;
}

impl<S: SensorSource + ?Sized> SensorSource for &mut S {
    type Error = S::Error;

    fn fetch(&mut self) -> Result<Value, Self::Error> {
        (**self).fetch()
    }
}

/// Destination for the periodically rendered series
pub trait RenderSink {
    /// Failure type of a single render
    type Error: std::error::Error;

    /// Render the full ordered series
    fn render(&mut self, series: &[Sample]) -> Result<(), Self::Error>;
}

impl<K: RenderSink + ?Sized> RenderSink for &mut K {
    type Error = K::Error;

    fn render(&mut self, series: &[Sample]) -> Result<(), Self::Error> {
        (**self).render(series)
    }
}

/// Sink that discards every series
///
/// Used when chart output is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    type Error = std::convert::Infallible;

    fn render(&mut self, _series: &[Sample]) -> Result<(), Self::Error> {
        Ok(())
    }
}
