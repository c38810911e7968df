use crate::sync::error::{ErrorKind, Result};
use crate::sync::{SyncContext, SyncEvent, SyncSummary};
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use sanity_config::{Server, ServerConfig};
use sanity_fetch::{Endpoints, HttpClient, ManifestEntry, ServerTarget, manifest, version};

/// Resolve the version of `server`, then fetch its manifest.
async fn prepare<C: HttpClient>(
    ctx: &SyncContext<C>,
    server: Server,
    config: &ServerConfig,
) -> Result<(ServerTarget, Vec<ManifestEntry>)> {
    let endpoints = Endpoints::for_server(server, config);
    let version = version::resolve(&ctx.remote, server, &endpoints, &ctx.fingerprints)
        .await
        .or_raise(|| ErrorKind::Version(server))?;
    let entries = manifest::fetch(&ctx.remote, server, &endpoints, &version)
        .await
        .or_raise(|| ErrorKind::Manifest(server))?;
    Ok((ServerTarget::new(server, config, version), entries))
}

/// Sync one server, streaming its events.
///
/// Every manifest entry is handed to the downloader at once; the shared
/// semaphore inside it decides how many actually run. A failure to resolve the
/// version or manifest ends this server's stream with
/// [`ServerFailed`](SyncEvent::ServerFailed).
pub(crate) fn sync_server<'a, C: HttpClient>(
    ctx: &'a SyncContext<C>,
    server: Server,
    config: ServerConfig,
) -> impl Stream<Item = SyncEvent> + 'a {
    stream!({
        yield SyncEvent::ServerStarted { server };

        let (target, entries) = match prepare(ctx, server, &config).await {
            Ok(prepared) => prepared,
            Err(error) => {
                tracing::error!(server = %server, error = ?error, "Server sync aborted");
                yield SyncEvent::ServerFailed { server, error };
                return;
            },
        };
        yield SyncEvent::ManifestResolved { server, entries: entries.len() };

        let target = &target;
        let mut downloads: FuturesUnordered<_> = entries
            .iter()
            .map(|entry| async move { (entry, ctx.downloader.download(target, entry).await) })
            .collect();
        let mut summary = SyncSummary::default();
        while let Some((entry, outcome)) = downloads.next().await {
            summary.record(&outcome);
            yield SyncEvent::Downloaded { server, path: entry.path.clone(), outcome };
        }

        tracing::info!(server = %server, %summary, "Server sync complete");
        yield SyncEvent::ServerComplete { server, summary };
    })
}
