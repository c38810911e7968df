use crate::error::Result;
use crate::{AssetCache, VersionCache, VersionInfo};
use sanity_config::Server;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Shared handle to both cache documents for the duration of a run.
///
/// Every mutation goes through one of two mutexes, so concurrent downloads
/// across servers can record hashes without coordinating. Nothing touches
/// disk until [`flush`](Self::flush).
///
/// Asset hashes are keyed by the asset's path inside the output tree
/// (`<server>/<path>`), so identical paths on different servers are tracked
/// independently.
#[derive(Debug)]
pub struct Fingerprints {
    dir: PathBuf,
    assets: Mutex<AssetCache>,
    versions: Mutex<VersionCache>,
}

impl Fingerprints {
    /// Load both cache documents from `dir`. Never fails.
    pub fn load(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let assets = crate::load::<AssetCache>(&dir);
        let versions = crate::load::<VersionCache>(&dir);
        tracing::info!(dir = %dir.display(), assets = assets.len(), "Fingerprint cache loaded");
        Self::new(dir, assets, versions)
    }

    pub fn new(dir: impl Into<PathBuf>, assets: AssetCache, versions: VersionCache) -> Self {
        Self {
            dir: dir.into(),
            assets: Mutex::new(assets),
            versions: Mutex::new(versions),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache key for an asset of `server`.
    pub fn key(server: Server, path: &str) -> String {
        format!("{}/{}", server.dir_name(), path.trim_start_matches('/'))
    }

    pub fn hash(&self, server: Server, path: &str) -> Option<String> {
        Self::guard(&self.assets).get_hash(&Self::key(server, path)).map(str::to_string)
    }

    pub fn set_hash(&self, server: Server, path: &str, hash: impl Into<String>) {
        Self::guard(&self.assets).set_hash(Self::key(server, path), hash);
    }

    pub fn version(&self, server: Server) -> Option<VersionInfo> {
        Self::guard(&self.versions).get(server).cloned()
    }

    pub fn set_version(&self, server: Server, version: VersionInfo) {
        Self::guard(&self.versions).set(server, version);
    }

    /// Snapshot of the asset cache.
    pub fn assets(&self) -> AssetCache {
        Self::guard(&self.assets).clone()
    }

    /// Write both documents to disk.
    ///
    /// Both writes are attempted; the first failure is returned.
    pub fn flush(&self) -> Result<()> {
        let assets = self.assets();
        let versions = Self::guard(&self.versions).clone();
        let written_versions = crate::save(&self.dir, &versions);
        let written_assets = crate::save(&self.dir, &assets);
        written_versions?;
        written_assets?;
        tracing::info!(dir = %self.dir.display(), assets = assets.len(), "Fingerprint cache flushed");
        Ok(())
    }

    // Each critical section is a single map operation, so a poisoned lock
    // still holds a consistent map.
    fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
