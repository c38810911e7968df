//! Post-processing stages run over the output tree once extraction is done.
//!
//! Each stage scans the given server roots through a
//! [`BackendHandle`](sanity_storage::BackendHandle), transforms what it
//! recognises and returns a [`StageReport`]. A file that fails is logged and
//! left where it is; it never stops the stage.
//!
//! | Stage | Entry point |
//! |---|---|
//! | Alpha recombination | [`alpha::recombine`] |
//! | Atlas slicing | [`atlas::slice`] |
//! | Text decoding | [`text::decode`] |
//! | Audio transcoding | [`audio::transcode`] |
//! | Directory flattening | [`flatten::flatten`] |

pub mod alpha;
pub mod atlas;
pub mod audio;
mod consts;
pub mod crypto;
pub mod error;
pub mod flatten;
pub mod schema;
pub mod text;
mod tool;

use crate::error::Result;
use derive_more::Display;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use sanity_storage::{BackendHandle, FileInfo};
use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Counts of what a stage did.
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq)]
#[display("{processed} processed, {skipped} skipped, {failed} failed")]
pub struct StageReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Result of handling a single file that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Processed,
    Skipped,
}

impl StageReport {
    pub(crate) fn tally(&mut self, path: &Path, result: Result<Step>) {
        match result {
            Ok(Step::Processed) => self.processed += 1,
            Ok(Step::Skipped) => self.skipped += 1,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = ?e, "Processing failed");
                self.failed += 1;
            },
        }
    }
}

/// All files below `roots`. Listing errors are logged and skipped.
pub(crate) async fn list_files(backend: &BackendHandle, roots: &[PathBuf]) -> Vec<FileInfo> {
    let mut files = Vec::new();
    for root in roots {
        let mut stream = backend.list_stream(Some(root));
        while let Some(item) = stream.next().await {
            match item {
                Ok(info) => files.push(info),
                Err(e) => tracing::warn!(root = %root.display(), error = ?e, "Could not list file"),
            }
        }
    }
    files
}

/// Drive `futures` to completion with at most `limit` in flight.
pub(crate) async fn run_bounded<F: Future>(futures: impl IntoIterator<Item = F>, limit: usize) -> Vec<F::Output> {
    let mut pending: VecDeque<F> = futures.into_iter().collect();
    let mut running = FuturesUnordered::new();
    running.extend(pending.drain(..limit.max(1).min(pending.len())));
    let mut outputs = Vec::with_capacity(pending.len() + running.len());
    while let Some(output) = running.next().await {
        outputs.push(output);
        // Pop-n-push, FIFO.
        if let Some(next) = pending.pop_front() {
            running.push(next);
        }
    }
    outputs
}
