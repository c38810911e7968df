//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bundle reader executable could not be found.
    #[display("bundle reader not found: {_0}")]
    ReaderNotFound(#[error(not(source))] String),
    /// The bundle reader ran but did not produce usable output.
    #[display("bundle reader failed: {_0}")]
    ReaderFailed(#[error(not(source))] String),
    /// A record's name or contents cannot be turned into an output file.
    #[display("invalid record: {_0}")]
    InvalidRecord(#[error(not(source))] String),
    /// Encoding a record's payload failed.
    #[display("could not encode record payload")]
    Codec,
    /// Underlying I/O error
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io)
    }
}
