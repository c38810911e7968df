//! Storage models.

use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// File metadata returned by storage backends when listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from the output root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self { path: path.into(), size, modified }
    }

    /// Lower-cased extension, if the file has one.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }
}

/// Lower-cased extension of `path`, if it has one.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase)
}
