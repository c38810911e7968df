//! Fingerprint cache for synchronised assets.
//!
//! This crate persists two small JSON documents in the configured cache
//! directory:
//! - `assets.json`: the content hash last synced for every asset, used to
//!   skip downloads of unchanged content.
//! - `version.json`: the version last resolved for every server.
//!
//! The files are never the source of truth: a missing or corrupt file is
//! replaced with an empty cache, which only costs a full re-download.
//! Writes go to a temporary file in the same directory and are renamed over
//! the previous file, so a failed flush never corrupts a valid cache.

pub mod error;
mod fingerprints;
mod models;

pub use crate::fingerprints::Fingerprints;
pub use crate::models::{AssetCache, VersionCache, VersionInfo};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;

/// A cache document stored as a single JSON file in the cache directory.
pub trait CacheFile: Serialize + DeserializeOwned + Default {
    const FILE_NAME: &'static str;
}

/// Load a cache document from `dir`, falling back to an empty one.
pub fn load<T: CacheFile>(dir: &Path) -> T {
    let path = dir.join(T::FILE_NAME);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Cache file not found; starting empty");
            return T::default();
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cache file unreadable; starting empty");
            return T::default();
        },
    };
    match serde_json::from_slice(&bytes) {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cache file corrupt; starting empty");
            T::default()
        },
    }
}

/// Atomically replace the cache document in `dir`.
pub fn save<T: CacheFile>(dir: &Path, cache: &T) -> Result<()> {
    let path = dir.join(T::FILE_NAME);
    let json = serde_json::to_vec_pretty(cache).or_raise(|| ErrorKind::InvalidData)?;
    std::fs::create_dir_all(dir).or_raise(|| ErrorKind::Write(path.clone()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).or_raise(|| ErrorKind::Write(path.clone()))?;
    tmp.write_all(&json).or_raise(|| ErrorKind::Write(path.clone()))?;
    tmp.as_file().sync_all().or_raise(|| ErrorKind::Write(path.clone()))?;
    tmp.persist(&path).or_raise(|| ErrorKind::Write(path.clone()))?;
    tracing::debug!(path = %path.display(), "Cache file written");
    Ok(())
}
