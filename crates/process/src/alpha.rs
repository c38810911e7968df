//! Alpha recombination.
//!
//! Textures are often shipped as an RGB image plus a separate grayscale mask
//! (`foo.png` + `foo_alpha.png`). This stage merges each pair into a single
//! RGBA image stored under the RGB file's name and removes the mask.

use crate::consts::{ALPHA_SUFFIXES, IMAGE_EXTENSIONS};
use crate::error::{ErrorKind, Result};
use crate::{StageReport, Step, list_files};
use exn::ResultExt;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use sanity_storage::{BackendHandle, extension_of};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// The RGB image an alpha mask belongs to, if `path` is named like a mask.
///
/// Suffixes are tried in order (`[alpha]`, `_alpha`, `alpha`, `a`, each with
/// an optional `$N`); the first match wins.
pub fn rgb_sibling(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let extension = path.extension()?.to_str()?;
    let suffix = ALPHA_SUFFIXES.iter().find_map(|pattern| pattern.find(stem))?;
    let base = &stem[..suffix.start()];
    if base.is_empty() {
        return None;
    }
    Some(path.with_file_name(format!("{base}.{extension}")))
}

/// Merge an RGB image with a grayscale mask, encoding the result as `format`.
///
/// A mask of a different size is scaled to the RGB image first.
pub fn combine(rgb: &[u8], alpha: &[u8], format: ImageFormat) -> Result<Vec<u8>> {
    let rgb = image::load_from_memory(rgb).or_raise(|| ErrorKind::Codec)?.to_rgb8();
    let mut alpha = image::load_from_memory(alpha).or_raise(|| ErrorKind::Codec)?.to_luma8();
    if alpha.dimensions() != rgb.dimensions() {
        tracing::debug!(rgb = ?rgb.dimensions(), alpha = ?alpha.dimensions(), "Scaling alpha mask");
        alpha = image::imageops::resize(&alpha, rgb.width(), rgb.height(), FilterType::Triangle);
    }
    let rgba = RgbaImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let [a] = alpha.get_pixel(x, y).0;
        Rgba([r, g, b, a])
    });
    let mut data = Vec::new();
    DynamicImage::ImageRgba8(rgba).write_to(&mut Cursor::new(&mut data), format).or_raise(|| ErrorKind::Codec)?;
    Ok(data)
}

/// Recombine every RGB/alpha pair below `roots`.
///
/// Masks without an RGB sibling are skipped and left in place.
#[tracing::instrument(skip_all)]
pub async fn recombine(backend: &BackendHandle, roots: &[PathBuf]) -> StageReport {
    let files = list_files(backend, roots).await;
    let present: HashSet<&Path> = files.iter().map(|file| file.path.as_path()).collect();
    let mut report = StageReport::default();
    let mut pairs = Vec::new();
    for file in &files {
        if !extension_of(&file.path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str())) {
            continue;
        }
        let Some(rgb) = rgb_sibling(&file.path) else { continue };
        if present.contains(rgb.as_path()) {
            pairs.push((rgb, file.path.clone()));
        } else {
            tracing::trace!(path = %file.path.display(), "No RGB sibling for alpha-like image");
            report.tally(&file.path, Ok(Step::Skipped));
        }
    }
    for (rgb, alpha) in pairs {
        let result = recombine_pair(backend, &rgb, &alpha).await;
        report.tally(&alpha, result.map(|()| Step::Processed));
    }
    tracing::info!(%report, "Alpha recombination complete");
    report
}

async fn recombine_pair(backend: &BackendHandle, rgb_path: &Path, alpha_path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(rgb_path).or_raise(|| ErrorKind::Codec)?;
    let rgb = backend.read(rgb_path).await.or_raise(|| ErrorKind::Storage)?;
    let alpha = backend.read(alpha_path).await.or_raise(|| ErrorKind::Storage)?;
    let combined = tokio::task::spawn_blocking(move || combine(&rgb, &alpha, format))
        .await
        .or_raise(|| ErrorKind::Codec)??;
    backend.write(rgb_path, &combined).await.or_raise(|| ErrorKind::Storage)?;
    backend.delete(alpha_path).await.or_raise(|| ErrorKind::Storage)?;
    tracing::debug!(rgb = %rgb_path.display(), alpha = %alpha_path.display(), "Alpha recombined");
    Ok(())
}
