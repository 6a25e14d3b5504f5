//! Typed error hierarchy for hik-logdump.
//!
//! Each `FetchError` variant maps to one failure class of a log dump run and
//! to one process exit code:
//!
//! | Variant                   | Exit | Stage               |
//! |---------------------------|------|---------------------|
//! | `Validation`              | 2    | argument validation |
//! | `Challenge`, `Auth`       | 3    | authentication      |
//! | `Connection`, `Timeout`   | 4    | transport           |
//! | `Http`, `EmptyPayload`    | 5    | log search          |
//! | `Io`                      | 6    | i/o                 |
//!
//! Exit code 2 is shared with clap, which exits with 2 on malformed command
//! lines before any of this code runs.
//!
//! Variants that come from an HTTP response keep the status code and the
//! response body. ISAPI error bodies are small `ResponseStatus` XML documents
//! whose `subStatusCode` is usually the only hint about what went wrong.

use std::time::Duration;

use reqwest::StatusCode;

use crate::auth::ChallengeError;
use crate::timespan::ValidationError;

/// Unified error type for all hik-logdump operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// A command-line value failed validation (bad timestamp, inverted time
    /// span, unusable host). Raised before any network traffic.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The device answered `401` but its `WWW-Authenticate` header did not
    /// carry a digest challenge this client can answer.
    #[error("authentication failed: {0}")]
    Challenge(#[from] ChallengeError),

    /// The device rejected the digest-authenticated retry.
    #[error("authentication failed: {message}")]
    Auth {
        /// Human-readable description including the username, status and
        /// the device's error body when it sent one.
        message: String,
    },

    /// Transport-level failure (DNS, TCP refusal, TLS handshake) with no
    /// HTTP status available.
    #[error("connection to {url} failed: {source}")]
    Connection {
        /// The URL that was being requested.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the configured request timeout.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout {
        /// The URL that was being requested.
        url: String,
        /// The configured overall request timeout.
        timeout: Duration,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The device returned a non-success status other than the `401`
    /// consumed by the digest handshake.
    #[error("device returned HTTP {status}: {body}")]
    Http {
        /// The HTTP status code returned by the device.
        status: StatusCode,
        /// The raw response body text, or an empty string if it could not
        /// be read.
        body: String,
    },

    /// The device answered with a success status but an empty body.
    #[error("device returned an empty response body")]
    EmptyPayload,

    /// Reading the password or writing the payload failed.
    #[error("i/o error on {target}: {source}")]
    Io {
        /// What was being accessed: an output path, "standard output" or
        /// "terminal".
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            FetchError::Validation(_) => 2,
            FetchError::Challenge(_) | FetchError::Auth { .. } => 3,
            FetchError::Connection { .. } | FetchError::Timeout { .. } => 4,
            FetchError::Http { .. } | FetchError::EmptyPayload => 5,
            FetchError::Io { .. } => 6,
        }
    }

    /// Name of the run stage that failed, for the top-level error message.
    pub fn stage(&self) -> &'static str {
        match self {
            FetchError::Validation(_) => "argument validation",
            FetchError::Challenge(_) | FetchError::Auth { .. } => "authentication",
            FetchError::Connection { .. } | FetchError::Timeout { .. } => "transport",
            FetchError::Http { .. } | FetchError::EmptyPayload => "log search",
            FetchError::Io { .. } => "i/o",
        }
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, FetchError>;
