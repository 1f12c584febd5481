//! PCM Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Pieces shared by PCM binaries: logging setup and upload checksums.
//!
//! # Overview
//!
//! - **Error Handling**: `PcmError` and the crate-wide `Result` alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Checksums**: SHA-256 digests for uploaded source files
//!
//! # Example
//!
//! ```no_run
//! use pcm_common::{checksum::verify_sha256, Result};
//!
//! fn accept(content: &[u8], declared: &str) -> Result<()> {
//!     verify_sha256(content, declared)
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{PcmError, Result};
