//! Error taxonomy for the scoring engine.
//!
//! `InputError` is the only error a caller ever sees from `analyze`. Backend
//! errors are recovered locally and surface as `ErrorKind` tags on the result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller contract violations, rejected before any backend is invoked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Text is empty or whitespace-only.
    #[error("text is empty")]
    Empty,

    /// Text exceeds the configured maximum (in chars, after trim).
    #[error("text too long: {len} chars (maximum {max})")]
    TooLong { len: usize, max: usize },

    /// Payload field was not a string.
    #[error("input must be a string")]
    NotText,
}

/// Failure of a single backend invocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Disabled, misconfigured, or the endpoint refused service.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Call or rate-limit wait exceeded its deadline.
    #[error("backend timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// Remote answered with a shape we cannot normalise.
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Unavailable(_) => ErrorKind::BackendUnavailable,
            BackendError::Timeout { .. } => ErrorKind::BackendTimeout,
            BackendError::MalformedResponse(_) => ErrorKind::BackendMalformedResponse,
        }
    }
}

/// Serializable error tag carried on results and in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BackendUnavailable,
    BackendTimeout,
    BackendMalformedResponse,
    AllBackendsExhausted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::BackendTimeout => "backend_timeout",
            ErrorKind::BackendMalformedResponse => "backend_malformed_response",
            ErrorKind::AllBackendsExhausted => "all_backends_exhausted",
        }
    }
}
