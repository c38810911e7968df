//! Error types for the [`sync`](super) module.

use derive_more::{Display, Error};
use sanity_config::Server;

/// A sync error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a sync failure.
///
/// [`Version`](Self::Version) and [`Manifest`](Self::Manifest) abort the
/// affected server only. Individual downloads never fail the sync; their
/// failures are reported as [`DownloadOutcome::Failed`](sanity_fetch::DownloadOutcome::Failed).
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server's current version could not be resolved.
    #[display("could not resolve version of {_0}")]
    Version(#[error(not(source))] Server),
    /// The server's manifest could not be fetched or parsed.
    #[display("could not fetch manifest of {_0}")]
    Manifest(#[error(not(source))] Server),
    /// The fingerprint cache could not be written at the end of the sync.
    #[display("could not flush fingerprint cache")]
    Cache,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cache)
    }
}
