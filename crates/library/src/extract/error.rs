//! Error types for the [`extract`](super) module.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An extraction error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an extraction failure.
///
/// [`Read`](Self::Read) and [`Storage`](Self::Storage) fail a whole bundle,
/// which is then kept for the next run. [`Record`](Self::Record) fails one
/// record only and is counted in the bundle's report.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bundle reader could not open the bundle.
    #[display("could not read bundle {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    /// A record could not be converted into output files.
    #[display("could not convert record `{_0}`")]
    Record(#[error(not(source))] String),
    /// Listing, reading or writing the output tree failed.
    #[display("output tree access failed at {}", _0.display())]
    Storage(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
