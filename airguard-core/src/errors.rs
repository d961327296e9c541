//! Error Types for Acquisition, Storage and Scheduling
//!
//! ## Failure Taxonomy
//!
//! The monitor runs unattended for weeks, so every failure is sorted into a
//! class that decides what the loop does next:
//!
//! | Class | Example | Response |
//! |-------|---------|----------|
//! | Transient | connection refused, timeout, HTTP 503 | retry with escalating delay; fatal once the budget is spent |
//! | Malformed data | payload without `pm2_5_atm_b` | no retry, cycle's write skipped, loop continues |
//! | Missing file | series not created yet | nothing to do yet |
//! | Bad stored record | half-written line from an old crash | skipped with a warning |
//! | Write failure | disk full | logged; append abandons the cycle, rewrite leaves the original |
//!
//! Only the first class is ever retried. Whether an error belongs to it is
//! answered by the [`Transient`] trait, which the retry executor consults.
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use airguard_core::RetryError;
//!
//! fn describe(err: &RetryError<std::io::Error>) -> &'static str {
//!     match err {
//!         RetryError::Exhausted { .. } => "sensor unreachable, shutting down",
//!         RetryError::Permanent { .. } => "not worth retrying",
//!     }
//! }
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Boxed error used where the scheduler forwards a collaborator's failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classifies a failure as likely to clear on retry
pub trait Transient {
    /// True for network, connection and timeout failures
    fn is_transient(&self) -> bool;
}

impl Transient for io::Error {
    fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
                | io::ErrorKind::TimedOut
                | io::ErrorKind::Interrupted
                | io::ErrorKind::WouldBlock
        )
    }
}

/// Outcome of a retried operation that did not succeed
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a transient error
    #[error("{operation}: max of {attempts} attempts reached: {last}")]
    Exhausted {
        /// Label of the retried operation
        operation: String,
        /// Attempts made, equal to the policy budget
        attempts: u32,
        /// Error of the final attempt
        last: E,
    },

    /// A non-transient error, returned without consuming further attempts
    #[error("{operation}: non-transient failure: {error}")]
    Permanent {
        /// Label of the retried operation
        operation: String,
        /// The error as returned by the operation
        error: E,
    },
}

impl<E> RetryError<E> {
    /// The underlying error, whichever way the retry ended
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Permanent { error, .. } => error,
        }
    }
}

/// Sensor payload did not have the expected shape
///
/// Never retried: asking again returns the same firmware's same JSON.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MalformedPayload {
    /// Response body is not JSON at all
    #[error("malformed payload: body is not JSON: {0}")]
    NotJson(String),

    /// JSON is valid but not an object
    #[error("malformed payload: expected a JSON object")]
    NotAnObject,

    /// A required field is absent
    #[error("malformed payload: missing field `{0}`")]
    MissingField(String),

    /// A required field is present but not numeric
    #[error("malformed payload: field `{0}` is not a number")]
    NotANumber(String),
}

/// Series or checkpoint file could not be read or written
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        /// What was being attempted ("append to", "replace", ...)
        action: &'static str,
        /// File involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The value has no text form that reads back (NaN or infinite)
    #[error("refusing to store non-finite value {value}")]
    NonFinite {
        /// Rejected value
        value: f64,
    },
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Conditions that stop the scheduler loop
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The sensor stayed unreachable for the whole retry budget
    #[error("sensor unreachable: max of {attempts} attempts reached")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Error of the final attempt
        #[source]
        last: BoxError,
    },

    /// The sensor source failed in a way that retrying cannot fix
    #[error("sensor source failed: {0}")]
    Source(#[source] BoxError),
}
