//! Centralized error types for the Vocast core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to machine-readable codes for UI transport
//! - Distinguishes user-triggered aborts from real failures

use serde::Serialize;
use thiserror::Error;

use crate::media::SinkError;

/// Application-wide error type for the Vocast playback pipeline.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum VocastError {
    /// The playback sink cannot decode the requested codec/container profile.
    ///
    /// Fatal to the session. No fallback profile is attempted.
    #[error("Unsupported audio profile: {0}")]
    UnsupportedFormat(String),

    /// The speech source declined or failed the synthesis request.
    ///
    /// Covers auth, quota, and rate-limit refusals as well as transport
    /// failures. `message` carries the upstream-provided text verbatim;
    /// `status` is the HTTP status when one was received.
    #[error("Speech request failed: {message}")]
    SourceRequestFailed {
        /// HTTP status of the refusal, if the request reached the server.
        status: Option<u16>,
        /// Upstream error text, surfaced verbatim.
        message: String,
    },

    /// An append was issued while a previous append was still pending.
    ///
    /// This is a programming defect, not a user-facing condition: the chunk
    /// pump awaits each acknowledgement before the next append.
    #[error("Buffer busy: an append is already in flight")]
    BufferBusy,

    /// The session was cancelled by the user or superseded by a new request.
    ///
    /// Expected outcome of a toggle-off; resolves the session to idle and is
    /// not reported as a failure.
    #[error("Stream aborted")]
    StreamAborted,

    /// Required configuration is missing or invalid (e.g. no API credential).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VocastError {
    /// Returns a machine-readable error code for event payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::SourceRequestFailed { .. } => "source_request_failed",
            Self::BufferBusy => "buffer_busy",
            Self::StreamAborted => "stream_aborted",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether this error is the expected result of cancellation rather
    /// than a failure. Aborts resolve a session quietly; everything else is
    /// surfaced.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::StreamAborted)
    }
}

impl From<SinkError> for VocastError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::UnsupportedMime(mime) => Self::UnsupportedFormat(mime),
            SinkError::Exhausted(count) => {
                Self::Internal(format!("live buffer budget exhausted ({count} open)"))
            }
            SinkError::Detached => Self::StreamAborted,
        }
    }
}

/// Convenient Result alias for pipeline operations.
pub type VocastResult<T> = Result<T, VocastError>;
