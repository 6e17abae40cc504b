//! Error types for beacon-pos.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in beacon-pos.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration (fatal at startup).
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected input, checked before any upstream call.
    #[error("validation error: {0}")]
    Validation(String),

    /// The verifier could not be reached.
    #[error("verifier unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The verifier answered with a non-success status.
    #[error("verifier rejected request (HTTP {status}): {body}")]
    UpstreamRejected {
        /// HTTP status code returned by the verifier.
        status: u16,
        /// Raw response body, kept for diagnostics only.
        body: String,
    },

    /// The verifier answered with a body that breaks the expected contract.
    #[error("malformed verifier response: {0}")]
    MalformedResponse(String),

    /// QR artifact could not be decoded or saved.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// HTTP API server failure.
    #[error("server error: {0}")]
    Server(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if the error came from talking to the verifier.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable(_)
                | Self::UpstreamRejected { .. }
                | Self::MalformedResponse(_)
        )
    }
}
