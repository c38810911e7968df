//! Turning records into output files.
//!
//! Conversion is pure: it decides where each file goes and encodes its bytes,
//! but writing is left to the caller. PNG encoding is CPU-bound, so call
//! [`convert`] from a blocking task.

use crate::error::{ErrorKind, Result};
use crate::models::{BundleRecord, Payload};
use exn::ResultExt;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

/// A file to be written to the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub path: PathBuf,
    pub data: Vec<u8>,
}

/// Directory a record of `bundle` is written into.
///
/// With a container path, its components minus the first and the last are
/// placed under `server_root`. Without one, the bundle's own directory is
/// used.
pub fn target_dir(server_root: &Path, bundle: &Path, container: Option<&Path>) -> PathBuf {
    match container {
        Some(container) => {
            let parts: Vec<&std::ffi::OsStr> = container
                .components()
                .filter_map(|component| match component {
                    Component::Normal(part) => Some(part),
                    _ => None,
                })
                .collect();
            let inner = parts.len().saturating_sub(1);
            parts.iter().take(inner).skip(1).fold(server_root.to_path_buf(), |dir, part| dir.join(part))
        },
        None => bundle.parent().map(Path::to_path_buf).unwrap_or_else(|| server_root.to_path_buf()),
    }
}

/// Convert one record of `bundle` into the files it produces.
pub fn convert(record: &BundleRecord, server_root: &Path, bundle: &Path) -> Result<Vec<Output>> {
    let name = file_name(&record.name)?;
    let dir = target_dir(server_root, bundle, record.container.as_deref());
    let outputs = match &record.payload {
        Payload::Image(image) | Payload::Sprite(image) => vec![Output {
            path: dir.join(Path::new(name).with_extension("png")),
            data: encode_png(image)?,
        }],
        Payload::TextBlob(bytes) => vec![Output {
            path: dir.join(name),
            data: bytes.clone(),
        }],
        Payload::StructuredTree(tree) => vec![Output {
            path: dir.join(Path::new(name).with_extension("json")),
            data: serde_json::to_vec_pretty(tree).or_raise(|| ErrorKind::Codec)?,
        }],
        Payload::AudioSample(samples) => {
            let folder = match record.container {
                Some(_) => dir,
                None => {
                    let stem = bundle.file_stem().ok_or_else(|| {
                        exn::Exn::from(ErrorKind::InvalidRecord(format!("bundle {} has no name", bundle.display())))
                    })?;
                    dir.join(stem)
                },
            };
            samples
                .iter()
                .map(|(sample, data)| -> Result<Output> {
                    Ok(Output {
                        path: folder.join(file_name(sample)?),
                        data: data.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?
        },
    };
    Ok(outputs)
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    image.write_to(&mut Cursor::new(&mut data), ImageFormat::Png).or_raise(|| ErrorKind::Codec)?;
    Ok(data)
}

// Names come from bundle contents and must stay a single path component.
fn file_name(name: &str) -> Result<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => exn::bail!(ErrorKind::InvalidRecord(format!("unusable record name `{name}`"))),
    }
}
