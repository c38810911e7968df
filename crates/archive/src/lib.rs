//! Unpacking of downloaded asset archives.
//!
//! Asset servers wrap every bundle in a zip archive holding a single entry
//! whose internal name is meaningless; only its contents matter. This crate
//! detects the archive format from magic bytes and returns that entry.
//!
//! Everything here is synchronous and CPU-bound: call it from
//! [`spawn_blocking`](https://docs.rs/tokio/latest/tokio/task/fn.spawn_blocking.html)
//! inside async code.

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::{Cursor, Read};

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const ZIP_EMPTY_MAGIC: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

/// A supported archive format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Unknown,
}

impl ArchiveFormat {
    /// Detect the archive format from the leading bytes of a payload.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        if bytes.starts_with(&ZIP_MAGIC) || bytes.starts_with(&ZIP_EMPTY_MAGIC) {
            return ArchiveFormat::Zip;
        }
        ArchiveFormat::Unknown
    }
}

/// A file unpacked from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Name of the entry inside the archive.
    pub name: String,
    pub data: Vec<u8>,
}

/// Unpack the single file entry of an archive.
///
/// Directory entries are ignored. If an archive unexpectedly holds more than
/// one file, the first is returned and the rest are logged and discarded.
pub fn unpack_single(bytes: &[u8]) -> Result<Entry> {
    if ArchiveFormat::from_magic_bytes(bytes) != ArchiveFormat::Zip {
        exn::bail!(ErrorKind::UnsupportedFormat);
    }
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).or_raise(|| ErrorKind::InvalidData)?;
    let mut found: Option<Entry> = None;
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).or_raise(|| ErrorKind::InvalidData)?;
        if file.is_dir() {
            continue;
        }
        if let Some(first) = &found {
            tracing::warn!(kept = %first.name, discarded = %file.name(), "Archive holds more than one file");
            continue;
        }
        let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut data).or_raise(|| ErrorKind::InvalidData)?;
        found = Some(Entry { name: file.name().to_string(), data });
    }
    found.ok_or_else(|| exn::Exn::from(ErrorKind::Empty))
}

/// Build a zip archive holding a single deflated entry.
#[cfg(any(test, feature = "mock"))]
pub fn pack_single(name: &str, data: &[u8]) -> Result<Vec<u8>> {
    use std::io::Write;
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(name, options).or_raise(|| ErrorKind::Io)?;
    writer.write_all(data).or_raise(|| ErrorKind::Io)?;
    let cursor = writer.finish().or_raise(|| ErrorKind::Io)?;
    Ok(cursor.into_inner())
}
