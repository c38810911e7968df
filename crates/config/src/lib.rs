//! Run configuration.
//!
//! The configuration is a single JSON document (by default `config.json` in
//! the working directory). A missing file is replaced by the deployment
//! defaults before loading, so a first run always has something to work
//! with. Values can be overridden with `SANITY_`-prefixed environment
//! variables, using `__` to separate nested keys:
//!
//! ```text
//! SANITY_OUTPUT_DIR=/srv/assets
//! SANITY_CONCURRENCY__DOWNLOADS=10
//! SANITY_SERVERS__JP__ENABLED=true
//! ```
//!
//! The configuration is loaded once at startup and is read-only for the rest
//! of the run.

pub mod error;
mod server;

pub use crate::server::Server;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
const ENV_PREFIX: &str = "SANITY_";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the output tree; each server gets its own lower-case subdirectory.
    pub output_dir: PathBuf,
    /// Directory holding the fingerprint cache files.
    pub cache_dir: PathBuf,
    pub servers: BTreeMap<Server, ServerConfig>,
    pub network: NetworkConfig,
    pub concurrency: ConcurrencyConfig,
    pub extract: ExtractConfig,
    pub decode: DecodeConfig,
    pub audio: AudioConfig,
    /// Directory flattening rules applied after every other stage.
    pub flatten: Vec<FlattenRule>,
}

impl Default for Config {
    fn default() -> Self {
        let servers = BTreeMap::from([
            (
                Server::Cn,
                ServerConfig::whitelisted(["chararts/", "portraits/", "spritepack/ui_equip_", "gamedata/", "prefabs/"]),
            ),
            (Server::En, ServerConfig::whitelisted(["chararts/", "portraits/", "gamedata/", "prefabs/"])),
            (Server::Jp, ServerConfig::disabled()),
            (Server::Kr, ServerConfig::disabled()),
        ]);
        Self {
            output_dir: PathBuf::from("./output"),
            cache_dir: PathBuf::from("./cache"),
            servers,
            network: NetworkConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            extract: ExtractConfig::default(),
            decode: DecodeConfig::default(),
            audio: AudioConfig::default(),
            flatten: Vec::new(),
        }
    }
}

impl Config {
    /// Load the configuration from `path`, writing the defaults there first
    /// if no file exists yet.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Configuration not found; writing defaults");
            Self::default().write(path)?;
        }
        Self::load(path)
    }

    /// Load the configuration from `path` plus environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Figment::new()
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract::<Self>()
            .or_raise(|| ErrorKind::Invalid(path.to_path_buf()))
    }

    /// Serialize as pretty JSON to `path`, creating parent directories.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self).or_raise(|| ErrorKind::Write(path.to_path_buf()))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Write(path.to_path_buf()))?;
        }
        std::fs::write(path, json).or_raise(|| ErrorKind::Write(path.to_path_buf()))?;
        Ok(())
    }

    /// Enabled servers, in a stable order.
    pub fn enabled_servers(&self) -> impl Iterator<Item = (Server, &ServerConfig)> {
        self.servers.iter().filter(|(_, cfg)| cfg.enabled).map(|(server, cfg)| (*server, cfg))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    /// Path prefixes to fetch. Absent or empty accepts every path.
    pub path_whitelist: Option<Vec<String>>,
    /// Override for the server's version endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_url: Option<String>,
    /// Override for the server's asset base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path_whitelist: None,
            version_url: None,
            asset_base_url: None,
        }
    }
}

impl ServerConfig {
    pub fn whitelisted<S: Into<String>>(prefixes: impl IntoIterator<Item = S>) -> Self {
        Self {
            path_whitelist: Some(prefixes.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Total time allowed for a single request.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Attempts per request, including the first.
    pub retry_attempts: u32,
    pub retry_min_wait_secs: u64,
    pub retry_max_wait_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry_attempts: 5,
            retry_min_wait_secs: 4,
            retry_max_wait_secs: 20,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_min_wait(&self) -> Duration {
        Duration::from_secs(self.retry_min_wait_secs)
    }

    pub fn retry_max_wait(&self) -> Duration {
        Duration::from_secs(self.retry_max_wait_secs)
    }
}

/// Sizes of the bounded worker pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// In-flight downloads across all servers.
    pub downloads: usize,
    /// Bundles opened at the same time.
    pub bundles: usize,
    /// Records converted at the same time, across all open bundles.
    pub records: usize,
    /// Audio files transcoded at the same time.
    pub transcodes: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            downloads: 35,
            bundles: 8,
            records: 8,
            transcodes: 35,
        }
    }
}

/// When a bundle is removed from the output tree after extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cleanup {
    /// Delete only when the bundle was read and every record was written.
    #[default]
    Strict,
    /// Delete whenever the bundle was read, even if some records failed.
    Lenient,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Command that dumps a bundle's records (see `sanity-extract`).
    pub reader: Option<String>,
    pub cleanup: Cleanup,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// `flatc` executable; discovered on `PATH` when absent.
    pub flatc: Option<String>,
    /// Directory of `.fbs` schemas. Schema decoding is disabled without it.
    pub schema_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// `ffmpeg` executable; discovered on `PATH` when absent.
    pub ffmpeg: Option<String>,
    pub bitrate: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { ffmpeg: None, bitrate: "192k".to_string() }
    }
}

/// Moves every file below `source` directly into `target`.
///
/// With `per_child`, each first-level directory of `source` is flattened
/// into its own directory of the same name under `target` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenRule {
    pub source: PathBuf,
    pub target: PathBuf,
    #[serde(default)]
    pub per_child: bool,
}
