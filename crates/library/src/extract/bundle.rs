use crate::extract::ExtractContext;
use crate::extract::error::{ErrorKind, Result};
use derive_more::Display;
use exn::ResultExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use sanity_config::Cleanup;
use sanity_extract::BundleRecord;
use std::path::{Path, PathBuf};

/// What happened to one bundle.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[display("{}: {written}/{records} records written, {failed} failed", bundle.display())]
pub struct BundleReport {
    pub bundle: PathBuf,
    /// Records the reader yielded.
    pub records: usize,
    /// Records whose every output file was written.
    pub written: usize,
    pub failed: usize,
    /// Whether the bundle was removed from the output tree.
    pub deleted: bool,
}

/// Extract one bundle below `server_root`.
///
/// Fails only when the bundle cannot be read; the bundle is then left in
/// place. Record failures are counted in the report.
#[tracing::instrument(skip_all, fields(bundle = %bundle.display()))]
pub(crate) async fn extract_bundle(ctx: &ExtractContext, server_root: &Path, bundle: PathBuf) -> Result<BundleReport> {
    let bytes = ctx.backend.read(&bundle).await.or_raise(|| ErrorKind::Storage(bundle.clone()))?;
    let records = ctx.reader.read(&bundle, bytes).await.or_raise(|| ErrorKind::Read(bundle.clone()))?;

    let mut report = BundleReport {
        records: records.len(),
        written: 0,
        failed: 0,
        deleted: false,
        bundle,
    };
    {
        let mut pending: FuturesUnordered<_> = records
            .into_iter()
            .map(|record| extract_record(ctx, server_root, &report.bundle, record))
            .collect();
        while let Some(outcome) = pending.next().await {
            match outcome {
                Ok(()) => report.written += 1,
                Err(e) => {
                    tracing::warn!(error = ?e, "Record could not be extracted");
                    report.failed += 1;
                },
            }
        }
    }

    report.deleted = match ctx.cleanup {
        Cleanup::Strict if report.failed > 0 => {
            tracing::info!(failed = report.failed, "Keeping bundle with failed records");
            false
        },
        Cleanup::Strict | Cleanup::Lenient => match ctx.backend.delete(&report.bundle).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = ?e, "Extracted bundle could not be deleted");
                false
            },
        },
    };
    tracing::debug!(%report, "Bundle extracted");
    Ok(report)
}

async fn extract_record(ctx: &ExtractContext, server_root: &Path, bundle: &Path, record: BundleRecord) -> Result<()> {
    let name = record.name.clone();
    let _permit = ctx.records.acquire().await.or_raise(|| ErrorKind::Record(name.clone()))?;
    let (root, owner) = (server_root.to_path_buf(), bundle.to_path_buf());
    let outputs = tokio::task::spawn_blocking(move || sanity_extract::convert(&record, &root, &owner))
        .await
        .or_raise(|| ErrorKind::Record(name.clone()))?
        .or_raise(|| ErrorKind::Record(name.clone()))?;
    for output in &outputs {
        ctx.backend
            .write(&output.path, &output.data)
            .await
            .or_raise(|| ErrorKind::Storage(output.path.clone()))?;
    }
    tracing::trace!(record = %name, files = outputs.len(), "Record written");
    Ok(())
}
