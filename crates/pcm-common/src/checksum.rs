//! SHA-256 helpers for uploaded content

use crate::error::{PcmError, Result};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of an in-memory buffer
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compare a buffer against a client-supplied digest
///
/// The expected value may use either case but must be 64 hex digits.
pub fn verify_sha256(data: &[u8], expected: &str) -> Result<()> {
    let expected = expected.trim();
    if expected.len() != 64 || !expected.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(PcmError::MalformedChecksum(expected.to_string()));
    }

    let actual = sha256_hex(data);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(PcmError::ChecksumMismatch {
            expected: expected.to_ascii_lowercase(),
            actual,
        })
    }
}
