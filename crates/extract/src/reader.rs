//! Reading records out of bundles.
//!
//! The bundle container format itself is not parsed here. [`ExternalReader`]
//! hands each bundle to a dump command and collects what it writes:
//!
//! ```text
//! <command> <bundle-file> <out-dir>
//! ```
//!
//! The command must leave an index at `<out-dir>/records.json`:
//!
//! ```json
//! [
//!   {"name": "char_002_amiya", "kind": "sprite", "file": "char_002_amiya.png",
//!    "container": "assets/torappu/dynamicassets/arts/charportraits/char_002_amiya.png"},
//!   {"name": "voice", "kind": "audio", "samples": {"v1.wav": "voice/v1.wav"}}
//! ]
//! ```
//!
//! `file` and the sample values are relative to `<out-dir>`. `kind` is one of
//! `image`, `sprite`, `text`, `tree` or `audio`.

use crate::error::{ErrorKind, Result};
use crate::models::{BundleRecord, Payload, PayloadKind};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const INDEX_FILE_NAME: &str = "records.json";

/// Capability that opens a bundle and yields its records.
#[async_trait]
pub trait BundleReader: Send + Sync {
    /// Read every record of a bundle. `path` is only used for naming and
    /// diagnostics; the contents are passed in `bytes`.
    async fn read(&self, path: &Path, bytes: Vec<u8>) -> Result<Vec<BundleRecord>>;
}

/// Bundle reader backed by an external dump command.
#[derive(Debug, Clone)]
pub struct ExternalReader {
    program: PathBuf,
}

impl ExternalReader {
    /// Locate `command` on `PATH` (or use it directly if it is a path).
    pub fn discover(command: &str) -> Result<Self> {
        match which::which(command) {
            Ok(program) => {
                tracing::debug!(program = %program.display(), "Bundle reader found");
                Ok(Self { program })
            },
            Err(_) => exn::bail!(ErrorKind::ReaderNotFound(command.to_string())),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl BundleReader for ExternalReader {
    #[tracing::instrument(skip_all, fields(bundle = %path.display()))]
    async fn read(&self, path: &Path, bytes: Vec<u8>) -> Result<Vec<BundleRecord>> {
        let workdir = tempfile::tempdir().or_raise(|| ErrorKind::Io)?;
        let input = workdir.path().join(path.file_name().unwrap_or_else(|| "bundle".as_ref()));
        let output = workdir.path().join("out");
        tokio::fs::write(&input, &bytes).await.or_raise(|| ErrorKind::Io)?;
        tokio::fs::create_dir(&output).await.or_raise(|| ErrorKind::Io)?;

        let result = tokio::process::Command::new(&self.program)
            .arg(&input)
            .arg(&output)
            .output()
            .await
            .or_raise(|| ErrorKind::ReaderFailed(format!("could not run {}", self.program.display())))?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            tracing::debug!(status = %result.status, stderr = %stderr.trim(), "Bundle reader exited unsuccessfully");
            exn::bail!(ErrorKind::ReaderFailed(format!("exited with {}", result.status)));
        }

        // Decoding images is CPU-bound; the temporary directory moves into
        // the blocking task and is removed when it finishes.
        tokio::task::spawn_blocking(move || {
            let records = load_records(&output);
            drop(workdir);
            records
        })
        .await
        .or_raise(|| ErrorKind::Io)?
    }
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
    kind: PayloadKind,
    #[serde(default)]
    container: Option<PathBuf>,
    #[serde(default)]
    file: Option<PathBuf>,
    #[serde(default)]
    samples: BTreeMap<String, PathBuf>,
}

/// Load the records a dump command left in `dir`.
pub fn load_records(dir: &Path) -> Result<Vec<BundleRecord>> {
    let index = std::fs::read(dir.join(INDEX_FILE_NAME))
        .or_raise(|| ErrorKind::ReaderFailed(format!("no {INDEX_FILE_NAME} produced")))?;
    let entries: Vec<IndexEntry> = serde_json::from_slice(&index)
        .or_raise(|| ErrorKind::ReaderFailed(format!("{INDEX_FILE_NAME} is not a record list")))?;
    entries.into_iter().map(|entry| load_record(dir, entry)).collect()
}

fn load_record(dir: &Path, entry: IndexEntry) -> Result<BundleRecord> {
    let invalid = || ErrorKind::InvalidRecord(entry.name.clone());
    let read = |relative: &Path| -> Result<Vec<u8>> {
        if relative.is_absolute() || relative.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            exn::bail!(invalid());
        }
        std::fs::read(dir.join(relative)).or_raise(invalid)
    };
    let file = || -> Result<Vec<u8>> { read(entry.file.as_deref().ok_or_raise(invalid)?) };
    let payload = match entry.kind {
        PayloadKind::Image => Payload::Image(image::load_from_memory(&file()?).or_raise(invalid)?),
        PayloadKind::Sprite => Payload::Sprite(image::load_from_memory(&file()?).or_raise(invalid)?),
        PayloadKind::TextBlob => Payload::TextBlob(file()?),
        PayloadKind::StructuredTree => Payload::StructuredTree(serde_json::from_slice(&file()?).or_raise(invalid)?),
        PayloadKind::AudioSample => Payload::AudioSample(
            entry
                .samples
                .iter()
                .map(|(name, relative)| -> Result<(String, Vec<u8>)> { Ok((name.clone(), read(relative)?)) })
                .collect::<Result<_>>()?,
        ),
    };
    Ok(BundleRecord {
        name: entry.name,
        container: entry.container,
        payload,
    })
}

#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockReader;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use super::BundleReader;
    use crate::error::{ErrorKind, Result};
    use crate::models::BundleRecord;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, PoisonError};

    /// Bundle reader returning canned records, keyed by bundle path.
    ///
    /// Bundles without canned records fail to read.
    #[derive(Debug, Default)]
    pub struct MockReader {
        records: HashMap<PathBuf, Vec<BundleRecord>>,
        reads: Mutex<Vec<PathBuf>>,
    }

    impl MockReader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_records(mut self, bundle: impl Into<PathBuf>, records: Vec<BundleRecord>) -> Self {
            self.records.insert(bundle.into(), records);
            self
        }

        /// Bundles read so far, in order.
        pub fn reads(&self) -> Vec<PathBuf> {
            self.reads.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }

    #[async_trait]
    impl BundleReader for MockReader {
        async fn read(&self, path: &Path, _bytes: Vec<u8>) -> Result<Vec<BundleRecord>> {
            self.reads.lock().unwrap_or_else(PoisonError::into_inner).push(path.to_path_buf());
            match self.records.get(path) {
                Some(records) => Ok(records.clone()),
                None => exn::bail!(ErrorKind::ReaderFailed(format!("cannot read {}", path.display()))),
            }
        }
    }
}
