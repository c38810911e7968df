//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The payload is not an archive format this crate understands.
    #[display("unsupported archive format")]
    UnsupportedFormat,
    /// Data is corrupt or malformed. Don't retry with the same input.
    #[display("invalid or corrupted archive")]
    InvalidData,
    /// The archive holds no file entries.
    #[display("archive contains no files")]
    Empty,
    /// Writing an archive failed.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::InvalidData.to_string(), "invalid or corrupted archive");
        assert_eq!(ErrorKind::Empty.to_string(), "archive contains no files");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::InvalidData.is_retryable());
        assert!(!ErrorKind::UnsupportedFormat.is_retryable());
        assert!(ErrorKind::Io.is_retryable());
    }
}
