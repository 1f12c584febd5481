//! Errors raised by the shared helpers

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PcmError>;

#[derive(Error, Debug)]
pub enum PcmError {
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("'{0}' is not a SHA-256 hex digest")]
    MalformedChecksum(String),
}
