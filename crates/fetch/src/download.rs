use crate::error::{ErrorKind, Result};
use crate::manifest::ManifestEntry;
use crate::{Endpoints, HttpClient, Remote, is_whitelisted};
use exn::ResultExt;
use sanity_cache::{Fingerprints, VersionInfo};
use sanity_config::{Server, ServerConfig};
use sanity_storage::BackendHandle;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Everything the downloader needs to know about one server for one run.
#[derive(Debug, Clone)]
pub struct ServerTarget {
    pub server: Server,
    pub endpoints: Endpoints,
    pub version: VersionInfo,
    pub whitelist: Option<Vec<String>>,
}

impl ServerTarget {
    pub fn new(server: Server, config: &ServerConfig, version: VersionInfo) -> Self {
        Self {
            server,
            endpoints: Endpoints::for_server(server, config),
            version,
            whitelist: config.path_whitelist.clone(),
        }
    }

    /// Where `entry` is written in the output tree.
    ///
    /// Paths that would leave the server's directory are rejected.
    pub fn output_path(&self, entry: &ManifestEntry) -> Result<PathBuf> {
        let root = Path::new(self.server.dir_name());
        let path = sanity_storage::validate_path(root.join(entry.path.trim_start_matches('/')))
            .or_raise(|| ErrorKind::Protocol(format!("invalid asset path `{}`", entry.path)))?;
        if !path.starts_with(root) || path == root {
            exn::bail!(ErrorKind::Protocol(format!("asset path `{}` leaves the server directory", entry.path)));
        }
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not selected by the server's whitelist.
    Filtered,
    /// The recorded hash matches the manifest.
    Current,
}

/// What happened to one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Skipped(SkipReason),
    Fetched,
    Failed(String),
}

/// Downloads manifest entries into the output tree.
///
/// One downloader is shared by every server of a run. It holds the single
/// semaphore that bounds in-flight downloads across all servers, and it is
/// the only writer of asset fingerprints.
pub struct Downloader<C> {
    remote: Arc<Remote<C>>,
    permits: Arc<Semaphore>,
    backend: BackendHandle,
    fingerprints: Arc<Fingerprints>,
}

impl<C> Clone for Downloader<C> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            permits: Arc::clone(&self.permits),
            backend: Arc::clone(&self.backend),
            fingerprints: Arc::clone(&self.fingerprints),
        }
    }
}

impl<C: HttpClient> Downloader<C> {
    pub fn new(remote: Arc<Remote<C>>, concurrency: usize, backend: BackendHandle, fingerprints: Arc<Fingerprints>) -> Self {
        Self {
            remote,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            backend,
            fingerprints,
        }
    }

    /// Bring one asset up to date.
    ///
    /// Filtered and unchanged entries return before any request is made. The
    /// fingerprint is recorded only once the unpacked asset has been written.
    /// Failures are reported in the outcome and never propagate.
    #[tracing::instrument(skip_all, fields(server = %target.server, path = %entry.path))]
    pub async fn download(&self, target: &ServerTarget, entry: &ManifestEntry) -> DownloadOutcome {
        if !is_whitelisted(target.whitelist.as_deref(), &entry.path) {
            return DownloadOutcome::Skipped(SkipReason::Filtered);
        }
        if self.fingerprints.hash(target.server, &entry.path).as_deref() == Some(entry.hash.as_str()) {
            tracing::trace!("Asset is current");
            return DownloadOutcome::Skipped(SkipReason::Current);
        }
        match self.fetch(target, entry).await {
            Ok(()) => {
                self.fingerprints.set_hash(target.server, &entry.path, entry.hash.clone());
                tracing::debug!(hash = %entry.hash, "Asset downloaded");
                DownloadOutcome::Fetched
            },
            Err(e) => {
                tracing::warn!(error = ?e, "Asset download failed");
                let kind: &ErrorKind = &e;
                DownloadOutcome::Failed(kind.to_string())
            },
        }
    }

    async fn fetch(&self, target: &ServerTarget, entry: &ManifestEntry) -> Result<()> {
        let path = target.output_path(entry)?;
        // Held until the asset is on disk.
        let _permit = self.permits.acquire().await.or_raise(|| ErrorKind::Client)?;
        let url = target.endpoints.asset_url(&target.version.resource, &entry.path);
        let body = self.remote.get(&url).await?;
        let unpacked = tokio::task::spawn_blocking(move || sanity_archive::unpack_single(&body))
            .await
            .or_raise(|| ErrorKind::Archive)?
            .or_raise(|| ErrorKind::Archive)?;
        self.backend
            .write(&path, &unpacked.data)
            .await
            .or_raise(|| ErrorKind::Storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockClient, RetryPolicy};
    use futures::future::join_all;
    use sanity_cache::{AssetCache, VersionCache};
    use sanity_storage::StorageBackend;
    use sanity_storage::backend::MockBackend;

    const RESOURCE: &str = "r1";

    struct Fixture {
        downloader: Downloader<MockClient>,
        remote: Arc<Remote<MockClient>>,
        backend: Arc<MockBackend>,
        fingerprints: Arc<Fingerprints>,
        target: ServerTarget,
    }

    fn fixture(client: MockClient, whitelist: Option<Vec<String>>) -> Fixture {
        let remote = Arc::new(Remote::new(client, RetryPolicy::immediate(5)));
        let backend = Arc::new(MockBackend::default());
        let fingerprints = Arc::new(Fingerprints::new("/unused", AssetCache::default(), VersionCache::default()));
        let downloader = Downloader::new(Arc::clone(&remote), 2, backend.clone(), Arc::clone(&fingerprints));
        let target = ServerTarget {
            server: Server::Cn,
            endpoints: Endpoints::official(Server::Cn),
            version: VersionInfo {
                resource: RESOURCE.to_string(),
                client: "c".to_string(),
            },
            whitelist,
        };
        Fixture {
            downloader,
            remote,
            backend,
            fingerprints,
            target,
        }
    }

    fn url(path: &str) -> String {
        Endpoints::official(Server::Cn).asset_url(RESOURCE, path)
    }

    fn archive(data: &[u8]) -> Vec<u8> {
        sanity_archive::pack_single("internal.dat", data).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_writes_and_records_hash() {
        let client = MockClient::new().with_body(url("chararts/a.ab"), archive(b"bundle"));
        let f = fixture(client, None);
        let entry = ManifestEntry::new("chararts/a.ab", "H1");
        assert_eq!(f.downloader.download(&f.target, &entry).await, DownloadOutcome::Fetched);
        assert_eq!(f.backend.read(Path::new("cn/chararts/a.ab")).await.unwrap(), b"bundle");
        assert_eq!(f.fingerprints.hash(Server::Cn, "chararts/a.ab").as_deref(), Some("H1"));
    }

    #[tokio::test]
    async fn test_current_hash_skips_without_request() {
        let f = fixture(MockClient::new(), None);
        f.fingerprints.set_hash(Server::Cn, "a", "H1");
        let outcome = f.downloader.download(&f.target, &ManifestEntry::new("a", "H1")).await;
        assert_eq!(outcome, DownloadOutcome::Skipped(SkipReason::Current));
        assert!(f.remote.client().requests().is_empty());
    }

    #[tokio::test]
    async fn test_changed_hash_downloads_and_updates() {
        let client = MockClient::new().with_body(url("a"), archive(b"v2"));
        let f = fixture(client, None);
        f.fingerprints.set_hash(Server::Cn, "a", "H1");
        let outcome = f.downloader.download(&f.target, &ManifestEntry::new("a", "H2")).await;
        assert_eq!(outcome, DownloadOutcome::Fetched);
        assert_eq!(f.remote.client().request_count(&url("a")), 1);
        assert_eq!(f.fingerprints.hash(Server::Cn, "a").as_deref(), Some("H2"));
    }

    #[tokio::test]
    async fn test_whitelist_filters_before_request() {
        let client = MockClient::new()
            .with_body(url("chararts/foo.ab"), archive(b"x"))
            .with_body(url("chararts/"), archive(b"y"));
        let f = fixture(client, Some(vec!["chararts/".to_string()]));
        let cases = [
            ("chararts/foo.ab", DownloadOutcome::Fetched),
            ("other/foo.ab", DownloadOutcome::Skipped(SkipReason::Filtered)),
            ("chararts/", DownloadOutcome::Fetched),
        ];
        for (path, expected) in cases {
            let entry = ManifestEntry::new(path, "H");
            assert_eq!(f.downloader.download(&f.target, &entry).await, expected, "{path}");
        }
        assert_eq!(f.remote.client().request_count(&url("other/foo.ab")), 0);
    }

    #[tokio::test]
    async fn test_unpack_failure_leaves_fingerprint() {
        let client = MockClient::new().with_body(url("a"), "<html>not an archive</html>");
        let f = fixture(client, None);
        f.fingerprints.set_hash(Server::Cn, "a", "H1");
        let outcome = f.downloader.download(&f.target, &ManifestEntry::new("a", "H2")).await;
        assert!(matches!(outcome, DownloadOutcome::Failed(_)));
        assert_eq!(f.fingerprints.hash(Server::Cn, "a").as_deref(), Some("H1"));
        assert!(f.backend.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_escaping_path_is_rejected() {
        let client = MockClient::new().with_body(url("../en/a.ab"), archive(b"x"));
        let f = fixture(client, None);
        let outcome = f.downloader.download(&f.target, &ManifestEntry::new("../en/a.ab", "H")).await;
        assert!(matches!(outcome, DownloadOutcome::Failed(_)));
        assert_eq!(f.fingerprints.hash(Server::Cn, "../en/a.ab"), None);
        assert!(f.remote.client().requests().is_empty());
        assert!(f.backend.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_affect_siblings() {
        let client = MockClient::new()
            .with_body(url("a"), archive(b"a"))
            .with_unreachable(url("b"))
            .with_body(url("c"), archive(b"c"));
        let f = fixture(client, None);
        let entries = [ManifestEntry::new("a", "1"), ManifestEntry::new("b", "2"), ManifestEntry::new("c", "3")];
        let outcomes = join_all(entries.iter().map(|entry| f.downloader.download(&f.target, entry))).await;
        assert_eq!(outcomes[0], DownloadOutcome::Fetched);
        assert!(matches!(outcomes[1], DownloadOutcome::Failed(_)));
        assert_eq!(outcomes[2], DownloadOutcome::Fetched);
        assert_eq!(f.remote.client().request_count(&url("b")), 5);
        assert_eq!(f.fingerprints.hash(Server::Cn, "b"), None);
    }
}
