//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant is fatal for a run: without a configuration there is
/// nothing to synchronise.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The configuration file exists but could not be parsed or does not
    /// match the expected shape.
    #[display("invalid configuration: {}", _0.display())]
    Invalid(#[error(not(source))] PathBuf),
    /// A default configuration file could not be written.
    #[display("could not write default configuration: {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
