//! Error types for harbor-fetch.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("file I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("transfer cancelled")]
    Cancelled,
}

/// How retry logic should treat a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource does not exist or is refused at this URL (HTTP 403/404).
    Missing,
    /// Worth retrying after a backoff.
    Transient,
    /// The bytes arrived but did not hash to the expected digest.
    Integrity,
    Cancelled,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Status { status, .. } if crate::core::is_missing(*status) => {
                ErrorKind::Missing
            }
            FetchError::ChecksumMismatch { .. } => ErrorKind::Integrity,
            FetchError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Transient,
        }
    }

    pub fn is_cancelled(&self) -> bool { matches!(self, FetchError::Cancelled) }
}

impl From<harbor_verify::VerifyError> for FetchError {
    fn from(e: harbor_verify::VerifyError) -> Self {
        match e {
            harbor_verify::VerifyError::Mismatch { expected, actual } => {
                FetchError::ChecksumMismatch { expected, actual }
            }
            harbor_verify::VerifyError::Io(e) => FetchError::Io(e),
            other => FetchError::Io(io::Error::new(io::ErrorKind::InvalidData, other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
