//! Error types for Tinify API operations

use transform::FailureKind;

/// Errors from Tinify API operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API returned {status} ({kind}): {message}")]
    Api {
        status: u16,
        kind: FailureKind,
        message: String,
    },

    #[error("invalid API response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// How the caller should treat this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Api { kind, .. } => *kind,
            Error::Http(_) | Error::InvalidResponse(_) => FailureKind::Transient,
        }
    }
}

/// Result alias for Tinify operations.
pub type Result<T> = std::result::Result<T, Error>;
