//! Bringing the output tree up to date with the content servers.
//!
//! For every enabled server the version is resolved, then the manifest is
//! fetched, then every manifest entry is handed to the shared
//! [`Downloader`]. These three steps are strictly ordered per server; servers
//! themselves run in parallel and only share the download semaphore and the
//! [`Fingerprints`].
//!
//! The primary entry point is [`sync`], which streams [`SyncEvent`]s and
//! flushes the fingerprint cache once every server has finished.

pub mod error;
mod server;
mod stream;

pub use self::stream::{SyncEvent, sync};
use derive_more::Display;
use sanity_cache::Fingerprints;
use sanity_fetch::{DownloadOutcome, Downloader, HttpClient, Remote, SkipReason};
use sanity_storage::BackendHandle;
use std::sync::Arc;

/// Shared state of one sync run.
pub struct SyncContext<C> {
    remote: Arc<Remote<C>>,
    fingerprints: Arc<Fingerprints>,
    downloader: Downloader<C>,
}

impl<C: HttpClient> SyncContext<C> {
    /// `concurrency` bounds in-flight downloads across all servers.
    pub fn new(remote: Remote<C>, fingerprints: Arc<Fingerprints>, backend: BackendHandle, concurrency: usize) -> Self {
        let remote = Arc::new(remote);
        let downloader = Downloader::new(Arc::clone(&remote), concurrency, backend, Arc::clone(&fingerprints));
        Self {
            remote,
            fingerprints,
            downloader,
        }
    }

    pub fn remote(&self) -> &Remote<C> {
        &self.remote
    }

    pub fn fingerprints(&self) -> &Fingerprints {
        &self.fingerprints
    }
}

/// Download outcomes of one server, by kind.
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq)]
#[display("{fetched} fetched, {current} current, {filtered} filtered, {failed} failed")]
pub struct SyncSummary {
    pub fetched: usize,
    /// Skipped because the recorded hash matched.
    pub current: usize,
    /// Skipped by the whitelist.
    pub filtered: usize,
    pub failed: usize,
}

impl SyncSummary {
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Fetched => self.fetched += 1,
            DownloadOutcome::Skipped(SkipReason::Current) => self.current += 1,
            DownloadOutcome::Skipped(SkipReason::Filtered) => self.filtered += 1,
            DownloadOutcome::Failed(_) => self.failed += 1,
        }
    }
}
