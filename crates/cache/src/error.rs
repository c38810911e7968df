//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Loading never fails (a missing or corrupt file yields an empty cache), so
/// these only surface when flushing.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Serialization error.
    #[display("invalid cache data")]
    InvalidData,
    /// The cache file could not be written. The previous file on disk is
    /// left untouched.
    #[display("could not write cache file: {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}
