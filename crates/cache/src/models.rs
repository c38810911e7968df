//! Cache file models.
//!
//! These are the on-disk shapes of `assets.json` and `version.json`.

use crate::CacheFile;
use sanity_config::Server;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource and client version of a server, as published by its version
/// endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub resource: String,
    pub client: String,
}

/// Last resolved version per server.
///
/// Kept for diagnostics only: versions are always re-resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionCache(BTreeMap<Server, VersionInfo>);

impl VersionCache {
    pub fn get(&self, server: Server) -> Option<&VersionInfo> {
        self.0.get(&server)
    }

    pub fn set(&mut self, server: Server, version: VersionInfo) {
        self.0.insert(server, version);
    }
}

impl CacheFile for VersionCache {
    const FILE_NAME: &'static str = "version.json";
}

/// Last synced content hash per asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCache {
    assets: BTreeMap<String, String>,
}

impl AssetCache {
    pub fn get_hash(&self, key: &str) -> Option<&str> {
        self.assets.get(key).map(String::as_str)
    }

    pub fn set_hash(&mut self, key: impl Into<String>, hash: impl Into<String>) {
        self.assets.insert(key.into(), hash.into());
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl CacheFile for AssetCache {
    const FILE_NAME: &'static str = "assets.json";
}
