//! Error taxonomy for the recognition dispatch layer.
//!
//! Every failure here is a per-call value — nothing is process-fatal.  Each
//! variant carries the human-readable message surfaced to the caller;
//! [`RecognizeError::code`] exposes the machine-readable code that the
//! presentation layer and the offline queue inspect.

use thiserror::Error;

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable code attached to most [`RecognizeError`] variants.
///
/// Transport-level failures carry *no* code — that absence is half of the
/// offline-queue classification rule (see [`crate::queue::is_likely_offline`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Symbolic code, e.g. `ON_DEVICE_UNAVAILABLE`.
    Named(&'static str),
    /// Numeric HTTP status returned by the backend.
    Status(u16),
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::Named(name) => f.write_str(name),
            ErrorCode::Status(status) => write!(f, "{status}"),
        }
    }
}

// ---------------------------------------------------------------------------
// RecognizeError
// ---------------------------------------------------------------------------

/// All errors that can surface from the recognition dispatch layer.
#[derive(Debug, Clone, Error)]
pub enum RecognizeError {
    /// The on-device engine is not linked into this build, or the platform
    /// cannot run it.
    #[error("On-device recognition is not available in this build")]
    CapabilityUnavailable,

    /// The on-device engine produced something other than a structured
    /// result object.
    #[error("On-device recognizer returned an invalid response payload")]
    InvalidResponse,

    /// A guarded operation did not settle before its deadline.
    #[error("Recognition timed out before a result was produced")]
    Timeout,

    /// The backend answered with a non-success status.  `message` prefers
    /// the server-supplied message field.
    #[error("{message}")]
    Http {
        /// Numeric HTTP status.
        status: u16,
        /// Server-supplied message, or `Request failed (<status>)`.
        message: String,
    },

    /// The request never reached the backend (connection refused, DNS
    /// failure, reset …).  Carries the full transport error chain and no
    /// code.
    #[error("Network request failed: {0}")]
    Transport(String),

    /// A low-confidence on-device result was rejected and the backend
    /// fallback failed as well.
    #[error("Low-confidence on-device result rejected ({confidence:.3}). Backend fallback failed: {fallback_error}")]
    RejectedLowConfidence {
        /// The on-device confidence that fell below the hard-reject floor.
        confidence: f64,
        /// Message of the backend failure that prevented the fallback.
        fallback_error: String,
    },
}

impl RecognizeError {
    /// Machine-readable code for this failure, if it has one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            RecognizeError::CapabilityUnavailable => Some(ErrorCode::Named("ON_DEVICE_UNAVAILABLE")),
            RecognizeError::InvalidResponse => {
                Some(ErrorCode::Named("ON_DEVICE_INVALID_RESPONSE"))
            }
            RecognizeError::Timeout => Some(ErrorCode::Named("TIMEOUT")),
            RecognizeError::Http { status, .. } => Some(ErrorCode::Status(*status)),
            RecognizeError::Transport(_) => None,
            RecognizeError::RejectedLowConfidence { .. } => {
                Some(ErrorCode::Named("BACKEND_FALLBACK_FAILED"))
            }
        }
    }
}

impl From<reqwest::Error> for RecognizeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RecognizeError::Timeout
        } else {
            RecognizeError::Transport(error_chain(&e))
        }
    }
}

/// Join an error with its source chain so phrases like "connection refused"
/// from deep transport causes stay visible in the final message.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
