use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::sync::error::{Error as SyncError, ErrorKind as SyncErrorKind, Result as SyncResult};
use crate::sync::server::sync_server;
use crate::sync::{SyncContext, SyncSummary};
use async_stream::stream;
use exn::ResultExt;
use futures::stream::select_all;
use futures::{Stream, StreamExt};
use sanity_config::{Server, ServerConfig};
use sanity_fetch::{DownloadOutcome, HttpClient};
use std::sync::Arc;

/// Progress events emitted by [`sync`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. Per server, interleaved with other servers:
///    [`ServerStarted`](Self::ServerStarted), then either
///    [`ServerFailed`](Self::ServerFailed) or
///    [`ManifestResolved`](Self::ManifestResolved), one
///    [`Downloaded`](Self::Downloaded) per manifest entry and
///    [`ServerComplete`](Self::ServerComplete).
/// 3. [`Complete`](Self::Complete): exactly once, after the fingerprint cache
///    has been flushed.
#[derive(Debug)]
pub enum SyncEvent {
    Started,
    ServerStarted { server: Server },
    /// The manifest was fetched; `entries` downloads follow.
    ManifestResolved { server: Server, entries: usize },
    Downloaded {
        server: Server,
        path: String,
        outcome: DownloadOutcome,
    },
    /// The version or manifest could not be fetched; nothing was downloaded
    /// for this server.
    ServerFailed { server: Server, error: SyncError },
    ServerComplete { server: Server, summary: SyncSummary },
    Complete,
}

/// Streams [`SyncEvent`]s while syncing every server in `servers` in
/// parallel.
///
/// Server failures are reported as events. The only `Err` item is a failed
/// fingerprint flush, after which [`Complete`](SyncEvent::Complete) still
/// follows: the output tree is intact, only the next run will re-download.
pub fn sync<'a, C: HttpClient>(
    ctx: &'a SyncContext<C>,
    servers: Vec<(Server, ServerConfig)>,
) -> impl Stream<Item = LibraryResult<SyncEvent>> + 'a {
    stream! {
        for await event in sync_inner(ctx, servers) {
            yield event.or_raise(|| LibraryErrorKind::Sync);
        }
    }
}

fn sync_inner<'a, C: HttpClient>(
    ctx: &'a SyncContext<C>,
    servers: Vec<(Server, ServerConfig)>,
) -> impl Stream<Item = SyncResult<SyncEvent>> + 'a {
    stream!({
        yield Ok(SyncEvent::Started);

        let mut servers =
            select_all(servers.into_iter().map(|(server, config)| Box::pin(sync_server(ctx, server, config))));
        while let Some(event) = servers.next().await {
            yield Ok(event);
        }

        // Once, after every server: a crash mid-sync keeps the previous cache.
        let fingerprints = Arc::clone(&ctx.fingerprints);
        let flushed = tokio::task::spawn_blocking(move || fingerprints.flush())
            .await
            .or_raise(|| SyncErrorKind::Cache)
            .and_then(|flushed| flushed.or_raise(|| SyncErrorKind::Cache));
        if let Err(e) = flushed {
            tracing::error!(error = ?e, "Fingerprint cache could not be flushed");
            yield Err(e);
        }
        yield Ok(SyncEvent::Complete);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use sanity_cache::Fingerprints;
    use sanity_fetch::{Endpoints, MockClient, Remote, RetryPolicy, SkipReason, download_key};
    use sanity_storage::BackendHandle;
    use sanity_storage::backend::MockBackend;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    const RESOURCE: &str = "24-01-01-00-00-00-abcdef";

    fn asset_url(server: Server, path: &str) -> String {
        Endpoints::official(server).asset_url(RESOURCE, path)
    }

    fn archive(data: &[u8]) -> Vec<u8> {
        sanity_archive::pack_single(&download_key("x"), data).unwrap()
    }

    /// A server publishing `entries` (path, hash) at [`RESOURCE`].
    fn publish(client: MockClient, server: Server, entries: &[(&str, &str)]) -> MockClient {
        let endpoints = Endpoints::official(server);
        let infos: Vec<_> = entries.iter().map(|(name, hash)| json!({"name": name, "hash": hash})).collect();
        let client = client
            .with_json(endpoints.version_url.clone(), &json!({"resVersion": RESOURCE, "clientVersion": "2.1.0"}))
            .with_json(endpoints.manifest_url(RESOURCE), &json!({"abInfos": infos}));
        entries
            .iter()
            .fold(client, |client, (name, _)| client.with_body(asset_url(server, name), archive(name.as_bytes())))
    }

    fn context(client: MockClient, dir: &Path, backend: BackendHandle) -> SyncContext<MockClient> {
        let remote = Remote::new(client, RetryPolicy::immediate(2));
        SyncContext::new(remote, Arc::new(Fingerprints::load(dir)), backend, 4)
    }

    fn servers(list: &[Server]) -> Vec<(Server, ServerConfig)> {
        list.iter().map(|server| (*server, ServerConfig::default())).collect()
    }

    async fn run(ctx: &SyncContext<MockClient>, list: &[Server]) -> Vec<SyncEvent> {
        sync(ctx, servers(list)).try_collect().await.unwrap()
    }

    #[tokio::test]
    async fn test_event_order() {
        let dir = tempfile::tempdir().unwrap();
        let client = publish(MockClient::new(), Server::Cn, &[("chararts/a.ab", "H1")]);
        let ctx = context(client, dir.path(), Arc::new(MockBackend::default()));

        let events = run(&ctx, &[Server::Cn]).await;
        assert!(matches!(events.first(), Some(SyncEvent::Started)));
        assert!(matches!(events[1], SyncEvent::ServerStarted { server: Server::Cn }));
        assert!(matches!(events[2], SyncEvent::ManifestResolved { server: Server::Cn, entries: 1 }));
        assert!(matches!(&events[3], SyncEvent::Downloaded { outcome: DownloadOutcome::Fetched, .. }));
        assert!(matches!(events[4], SyncEvent::ServerComplete { summary: SyncSummary { fetched: 1, .. }, .. }));
        assert!(matches!(events.last(), Some(SyncEvent::Complete)));
        assert_eq!(events.len(), 6);
    }

    #[tokio::test]
    async fn test_second_run_issues_no_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let backend: BackendHandle = Arc::new(MockBackend::default());
        let entries = [("chararts/a.ab", "H1"), ("chararts/b.ab", "H2"), ("gamedata/excel/c.ab", "H3")];

        let first = context(publish(MockClient::new(), Server::Cn, &entries), dir.path(), Arc::clone(&backend));
        run(&first, &[Server::Cn]).await;
        assert_eq!(first.remote().client().requests().len(), 5);
        assert!(backend.exists(Path::new("cn/gamedata/excel/c.ab")).await.unwrap());

        // A fresh run reloads the flushed cache from disk.
        let second = context(publish(MockClient::new(), Server::Cn, &entries), dir.path(), backend);
        let events = run(&second, &[Server::Cn]).await;
        for (_, path) in &entries {
            assert_eq!(second.remote().client().request_count(&asset_url(Server::Cn, path)), 0);
        }
        assert_eq!(second.remote().client().requests().len(), 2);
        let summary = events.iter().find_map(|event| match event {
            SyncEvent::ServerComplete { summary, .. } => Some(*summary),
            _ => None,
        });
        assert_eq!(summary, Some(SyncSummary { current: 3, ..SyncSummary::default() }));
    }

    #[tokio::test]
    async fn test_failed_server_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        let client = publish(MockClient::new(), Server::Cn, &[("chararts/a.ab", "H1")])
            .with_status(Endpoints::official(Server::En).version_url, 503);
        let ctx = context(client, dir.path(), Arc::new(MockBackend::default()));

        let events = run(&ctx, &[Server::Cn, Server::En]).await;
        let failed: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                SyncEvent::ServerFailed { server, error } => Some((*server, **error)),
                _ => None,
            })
            .collect();
        assert_eq!(failed, [(Server::En, SyncErrorKind::Version(Server::En))]);
        assert!(events.iter().any(|event| matches!(
            event,
            SyncEvent::Downloaded { server: Server::Cn, outcome: DownloadOutcome::Fetched, .. }
        )));
        assert!(matches!(events.last(), Some(SyncEvent::Complete)));
        // The successful server's fingerprints were still flushed.
        assert_eq!(Fingerprints::load(dir.path()).hash(Server::Cn, "chararts/a.ab").as_deref(), Some("H1"));
    }

    #[tokio::test]
    async fn test_whitelist_applies_per_server() {
        let dir = tempfile::tempdir().unwrap();
        let client = publish(MockClient::new(), Server::Cn, &[("chararts/a.ab", "H1"), ("audio/b.ab", "H2")]);
        let ctx = context(client, dir.path(), Arc::new(MockBackend::default()));
        let config = ServerConfig::whitelisted(["chararts/"]);

        let events: Vec<_> = sync(&ctx, vec![(Server::Cn, config)]).try_collect().await.unwrap();
        let outcomes: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                SyncEvent::Downloaded { path, outcome, .. } => Some((path.as_str(), outcome.clone())),
                _ => None,
            })
            .collect();
        assert!(outcomes.contains(&("chararts/a.ab", DownloadOutcome::Fetched)));
        assert!(outcomes.contains(&("audio/b.ab", DownloadOutcome::Skipped(SkipReason::Filtered))));
        assert_eq!(ctx.remote().client().request_count(&asset_url(Server::Cn, "audio/b.ab")), 0);
    }

    #[tokio::test]
    async fn test_unwritable_cache_reported_after_sync() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        std::fs::write(&cache_dir, b"").unwrap();
        let backend: BackendHandle = Arc::new(MockBackend::default());
        let client = publish(MockClient::new(), Server::Cn, &[("chararts/a.ab", "H1")]);
        let ctx = context(client, &cache_dir, Arc::clone(&backend));

        let events: Vec<_> = sync(&ctx, servers(&[Server::Cn])).collect().await;
        let errors: Vec<_> = events.iter().filter(|event| event.is_err()).collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(events.last(), Some(Ok(SyncEvent::Complete))));
        // Downloads are kept even though their fingerprints were not.
        assert!(backend.exists(Path::new("cn/chararts/a.ab")).await.unwrap());
    }
}
