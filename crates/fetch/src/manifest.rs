//! Manifest fetching.

use crate::error::{ErrorKind, Result};
use crate::{Endpoints, HttpClient, Remote};
use sanity_cache::VersionInfo;
use sanity_config::Server;
use serde_json::Value;

/// One published asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Logical path of the asset, relative to the server root.
    pub path: String,
    pub hash: String,
}

impl ManifestEntry {
    pub fn new(path: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
        }
    }
}

/// Fetch the manifest of `server` at the resolved `version`.
#[tracing::instrument(skip_all, fields(server = %server, resource = %version.resource))]
pub async fn fetch<C: HttpClient>(
    remote: &Remote<C>,
    server: Server,
    endpoints: &Endpoints,
    version: &VersionInfo,
) -> Result<Vec<ManifestEntry>> {
    let document: Value = remote.get_json(&endpoints.manifest_url(&version.resource)).await?;
    let entries = parse(&document)?;
    tracing::info!(entries = entries.len(), "Manifest fetched");
    Ok(entries)
}

/// Read the entries of a manifest document, in document order.
///
/// Entries are taken from the `abInfos` array. An entry's hash is its `hash`
/// field, falling back to `md5`. Entries without a usable path or hash are
/// dropped.
pub fn parse(document: &Value) -> Result<Vec<ManifestEntry>> {
    let Some(infos) = document.get("abInfos").and_then(Value::as_array) else {
        exn::bail!(ErrorKind::Protocol("manifest has no `abInfos` array".to_string()));
    };
    let mut dropped = 0usize;
    let entries: Vec<ManifestEntry> = infos
        .iter()
        .filter_map(|info| {
            let path = info.get("name").and_then(Value::as_str).filter(|name| !name.is_empty());
            let hash = ["hash", "md5"]
                .iter()
                .find_map(|field| info.get(*field).and_then(Value::as_str))
                .filter(|hash| !hash.is_empty());
            match (path, hash) {
                (Some(path), Some(hash)) => Some(ManifestEntry::new(path, hash)),
                _ => {
                    dropped += 1;
                    None
                },
            }
        })
        .collect();
    if dropped > 0 {
        tracing::debug!(dropped, "Manifest entries without a name or hash were ignored");
    }
    Ok(entries)
}
