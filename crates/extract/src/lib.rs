//! Bundle records and their conversion into output files.
//!
//! A [`BundleReader`] opens a downloaded bundle and yields [`BundleRecord`]s.
//! Each record is then turned into one or more files by [`convert`], which
//! dispatches on the record's [`Payload`] with a single exhaustive match.

mod convert;
pub mod error;
mod models;
mod reader;

pub use crate::convert::{Output, convert, encode_png, target_dir};
pub use crate::models::{BundleRecord, Payload, PayloadKind};
#[cfg(any(test, feature = "mock"))]
pub use crate::reader::MockReader;
pub use crate::reader::{BundleReader, ExternalReader, INDEX_FILE_NAME, load_records};
use std::path::Path;

/// Extensions of downloaded bundle files.
pub const BUNDLE_EXTENSIONS: [&str; 2] = ["ab", "bin"];

/// Whether `path` names a bundle file.
pub fn is_bundle(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| BUNDLE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}
