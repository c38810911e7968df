//! Processing Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A processing error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every stage treats these as per-file failures: the file is logged, left in
/// place and the stage moves on.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An image could not be decoded, combined or encoded.
    #[display("image codec error")]
    Codec,
    /// An atlas descriptor is malformed or describes an impossible sprite.
    #[display("invalid atlas descriptor: {_0}")]
    Descriptor(#[error(not(source))] String),
    /// Ciphertext is truncated or does not decrypt with the known key.
    #[display("could not decrypt data")]
    Decrypt,
    /// Schema-driven decoding failed.
    #[display("schema decoding failed: {_0}")]
    Schema(#[error(not(source))] String),
    /// Decoded data is neither JSON nor BSON.
    #[display("decoded data is not a document")]
    Document,
    #[display("audio transcoding failed")]
    Transcode,
    /// An external tool could not be found.
    #[display("tool not found: {_0}")]
    ToolNotFound(#[error(not(source))] String),
    /// An external tool exited unsuccessfully.
    #[display("{_0} failed")]
    ToolFailed(#[error(not(source))] String),
    /// Reading or writing the output tree failed.
    #[display("output tree access failed")]
    Storage,
    /// Underlying I/O error
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Io)
    }
}
