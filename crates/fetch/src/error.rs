//! Fetch Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport failure (DNS, connection, timeout). Retry later.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The server answered with a non-success status.
    #[display("unexpected HTTP status {_0}")]
    Status(#[error(not(source))] u16),
    /// The response does not have the expected shape. Don't retry.
    #[display("unexpected response: {_0}")]
    Protocol(#[error(not(source))] String),
    /// The downloaded payload could not be unpacked.
    #[display("could not unpack downloaded archive")]
    Archive,
    /// The output tree could not be written.
    #[display("could not write to the output tree")]
    Storage,
    /// The HTTP client could not be built from the configuration.
    #[display("invalid HTTP client configuration")]
    Client,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status(code) => matches!(code, 408 | 429 | 500..=599),
            Self::Protocol(_) | Self::Archive | Self::Storage | Self::Client => false,
        }
    }
}
