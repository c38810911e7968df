//! Atlas slicing.
//!
//! Portrait atlases arrive as `portraits#<n>.png` plus a `portraits#<n>.json`
//! descriptor listing the sprites packed into the image. Every sprite is cut
//! out into `<name>.png` next to the descriptor, after which the atlas pair is
//! removed.

use crate::consts::ATLAS_DESCRIPTOR;
use crate::error::{ErrorKind, Result};
use crate::{StageReport, Step, list_files};
use exn::{OptionExt, ResultExt};
use image::{DynamicImage, ImageFormat};
use sanity_storage::BackendHandle;
use serde_json::Value;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

/// Pixel rectangle inside an atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A single sprite packed into an atlas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    pub name: String,
    pub rect: Rect,
    /// Counter-clockwise quarter turns to apply after cropping, `0..4`.
    pub quarter_turns: u8,
}

impl Sprite {
    /// Parse one descriptor entry.
    ///
    /// `rect` and `rotation` are read from the nested `sprite` object when
    /// present, falling back to the entry itself.
    pub fn from_value(entry: &Value) -> Result<Self> {
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| is_file_name(name))
            .ok_or_raise(|| ErrorKind::Descriptor("sprite without a usable name".to_string()))?;
        let frame = entry.get("sprite").filter(|frame| frame.is_object()).unwrap_or(entry);
        let rect = frame
            .get("rect")
            .or_else(|| entry.get("rect"))
            .ok_or_raise(|| ErrorKind::Descriptor(format!("{name}: missing rect")))?;
        let rect = Rect {
            x: coordinate(rect, "x", name)?.unwrap_or(0),
            y: coordinate(rect, "y", name)?.unwrap_or(0),
            width: coordinate(rect, "width", name)?.unwrap_or(0),
            height: coordinate(rect, "height", name)?.unwrap_or(0),
        };
        if rect.width == 0 || rect.height == 0 {
            exn::bail!(ErrorKind::Descriptor(format!("{name}: empty rect")));
        }
        let rotation = frame.get("rotation").or_else(|| entry.get("rotation"));
        let quarter_turns = match rotation.map(|value| value.as_f64()) {
            None => 0,
            Some(Some(degrees)) if degrees.fract() == 0.0 && degrees % 90.0 == 0.0 => {
                ((degrees / 90.0) as i64).rem_euclid(4) as u8
            },
            Some(_) => exn::bail!(ErrorKind::Descriptor(format!("{name}: rotation is not a multiple of 90"))),
        };
        Ok(Self { name: name.to_string(), rect, quarter_turns })
    }

    /// Crop this sprite out of `atlas` and rotate it upright.
    pub fn cut(&self, atlas: &DynamicImage) -> Result<DynamicImage> {
        let Rect { x, y, width, height } = self.rect;
        let fits = |offset: u32, extent: u32, limit: u32| offset.checked_add(extent).is_some_and(|end| end <= limit);
        if !fits(x, width, atlas.width()) || !fits(y, height, atlas.height()) {
            exn::bail!(ErrorKind::Descriptor(format!(
                "{}: rect lies outside the {}x{} atlas",
                self.name,
                atlas.width(),
                atlas.height()
            )));
        }
        let sprite = atlas.crop_imm(x, y, width, height);
        Ok(match self.quarter_turns {
            0 => sprite,
            1 => sprite.rotate270(),
            2 => sprite.rotate180(),
            _ => sprite.rotate90(),
        })
    }
}

fn coordinate(rect: &Value, key: &str, name: &str) -> Result<Option<u32>> {
    let Some(value) = rect.get(key) else { return Ok(None) };
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| v.fract() == 0.0 && *v >= 0.0).map(|v| v as u64))
        .and_then(|v| u32::try_from(v).ok())
        .map(Some)
        .ok_or_raise(|| ErrorKind::Descriptor(format!("{name}: invalid rect {key}")))
}

fn is_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

/// The sprite entries of a descriptor: a `_sprites` array or a bare array.
///
/// Entries are parsed individually so one malformed sprite does not hide the
/// others.
pub fn parse_descriptor(value: &Value) -> Result<Vec<Result<Sprite>>> {
    let entries = match value {
        Value::Array(entries) => entries,
        _ => value
            .get("_sprites")
            .and_then(Value::as_array)
            .ok_or_raise(|| ErrorKind::Descriptor("missing _sprites".to_string()))?,
    };
    Ok(entries.iter().map(Sprite::from_value).collect())
}

/// Slice every portrait atlas below `roots`.
///
/// Sprites are counted individually. The atlas pair is deleted once all of
/// its sprites have been attempted, whether or not they all succeeded; a
/// descriptor without its image is skipped and left in place.
#[tracing::instrument(skip_all)]
pub async fn slice(backend: &BackendHandle, roots: &[PathBuf]) -> StageReport {
    let descriptors: Vec<PathBuf> = list_files(backend, roots)
        .await
        .into_iter()
        .map(|file| file.path)
        .filter(|path| path.file_name().and_then(|n| n.to_str()).is_some_and(|n| ATLAS_DESCRIPTOR.is_match(n)))
        .collect();
    let mut report = StageReport::default();
    for descriptor in descriptors {
        slice_atlas(backend, &descriptor, &mut report).await;
    }
    tracing::info!(%report, "Atlas slicing complete");
    report
}

async fn slice_atlas(backend: &BackendHandle, descriptor: &Path, report: &mut StageReport) {
    let image_path = descriptor.with_extension("png");
    match backend.exists(&image_path).await {
        Ok(true) => {},
        Ok(false) => {
            tracing::warn!(descriptor = %descriptor.display(), "Atlas image not found");
            report.tally(descriptor, Ok(Step::Skipped));
            return;
        },
        Err(e) => {
            report.tally(descriptor, Err(e.raise(ErrorKind::Storage)));
            return;
        },
    }
    let cuts = match cut_all(backend, descriptor, &image_path).await {
        Ok(cuts) => cuts,
        Err(e) => {
            report.tally(descriptor, Err(e));
            return;
        },
    };
    for (label, result) in cuts {
        let output = descriptor.with_file_name(format!("{label}.png"));
        let result = match result {
            Ok(data) => backend.write(&output, &data).await.or_raise(|| ErrorKind::Storage).map(|()| Step::Processed),
            Err(e) => Err(e),
        };
        if result.is_ok() {
            tracing::debug!(sprite = %output.display(), "Sprite written");
        }
        report.tally(&output, result);
    }
    for path in [descriptor, image_path.as_path()] {
        if let Err(e) = backend.delete(path).await {
            tracing::warn!(path = %path.display(), error = ?e, "Could not remove atlas file");
        }
    }
}

/// Load an atlas pair and encode every sprite, keyed by output stem.
async fn cut_all(backend: &BackendHandle, descriptor: &Path, image_path: &Path) -> Result<Vec<(String, Result<Vec<u8>>)>> {
    let json = backend.read(descriptor).await.or_raise(|| ErrorKind::Storage)?;
    let value: Value = serde_json::from_slice(&json)
        .or_raise(|| ErrorKind::Descriptor(format!("{} is not JSON", descriptor.display())))?;
    let sprites = parse_descriptor(&value)?;
    let atlas = backend.read(image_path).await.or_raise(|| ErrorKind::Storage)?;
    tokio::task::spawn_blocking(move || -> Result<Vec<_>> {
        let atlas = image::load_from_memory(&atlas).or_raise(|| ErrorKind::Codec)?;
        let cuts = sprites
            .into_iter()
            .enumerate()
            .map(|(index, sprite)| match sprite {
                Ok(sprite) => {
                    let data = sprite.cut(&atlas).and_then(|image| encode_png(&image));
                    (sprite.name, data)
                },
                Err(e) => (format!("sprite #{index}"), Err(e)),
            })
            .collect();
        Ok(cuts)
    })
    .await
    .or_raise(|| ErrorKind::Codec)?
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    image.write_to(&mut Cursor::new(&mut data), ImageFormat::Png).or_raise(|| ErrorKind::Codec)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use rstest::rstest;
    use sanity_storage::backend::MockBackend;
    use serde_json::json;
    use std::sync::Arc;

    fn atlas_png(width: u32, height: u32) -> Vec<u8> {
        let atlas = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        encode_png(&DynamicImage::ImageRgba8(atlas)).unwrap()
    }

    #[rstest]
    #[case(json!({"name": "a", "sprite": {"rect": {"x": 1, "y": 2, "width": 3, "height": 4}}}), Rect { x: 1, y: 2, width: 3, height: 4 }, 0)]
    #[case(json!({"name": "a", "rect": {"x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0}, "rotation": 90}), Rect { x: 1, y: 2, width: 3, height: 4 }, 1)]
    #[case(json!({"name": "a", "sprite": {"rect": {"width": 3, "height": 4}, "rotation": -90}}), Rect { x: 0, y: 0, width: 3, height: 4 }, 3)]
    #[case(json!({"name": "a", "rect": {"width": 3, "height": 4}, "rotation": 540}), Rect { x: 0, y: 0, width: 3, height: 4 }, 2)]
    fn test_sprite_from_value(#[case] entry: Value, #[case] rect: Rect, #[case] quarter_turns: u8) {
        let sprite = Sprite::from_value(&entry).unwrap();
        assert_eq!(sprite, Sprite { name: "a".to_string(), rect, quarter_turns });
    }

    #[rstest]
    #[case(json!({"rect": {"width": 3, "height": 4}}))]
    #[case(json!({"name": "../escape", "rect": {"width": 3, "height": 4}}))]
    #[case(json!({"name": "a"}))]
    #[case(json!({"name": "a", "rect": {"width": 0, "height": 4}}))]
    #[case(json!({"name": "a", "rect": {"x": -1, "width": 3, "height": 4}}))]
    #[case(json!({"name": "a", "rect": {"width": 3, "height": 4}, "rotation": 45}))]
    fn test_sprite_from_value_rejects(#[case] entry: Value) {
        let err = Sprite::from_value(&entry).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Descriptor(_)));
    }

    #[test]
    fn test_parse_descriptor_shapes() {
        let sprite = json!({"name": "a", "rect": {"width": 1, "height": 1}});
        assert_eq!(parse_descriptor(&json!({"_sprites": [sprite.clone()]})).unwrap().len(), 1);
        assert_eq!(parse_descriptor(&json!([sprite.clone(), sprite])).unwrap().len(), 2);
        assert!(parse_descriptor(&json!({"sprites": []})).is_err());
    }

    #[test]
    fn test_cut_rotates_counter_clockwise() {
        let atlas = image::load_from_memory(&atlas_png(4, 2)).unwrap();
        let sprite = Sprite { name: "a".to_string(), rect: Rect { x: 0, y: 0, width: 4, height: 2 }, quarter_turns: 1 };
        let cut = sprite.cut(&atlas).unwrap().to_rgba8();
        assert_eq!(cut.dimensions(), (2, 4));
        // The top-right corner ends up top-left.
        assert_eq!(cut.get_pixel(0, 0).0, [3, 0, 0, 255]);
    }

    #[tokio::test]
    async fn test_slice_single_sprite() {
        let descriptor = json!({"_sprites": [{"name": "char_1", "sprite": {"rect": {"x": 0, "y": 0, "width": 10, "height": 10}}}]});
        let backend: BackendHandle = Arc::new(MockBackend::with_files([
            ("cn/arts/charportraits/portraits#0.json", serde_json::to_vec(&descriptor).unwrap()),
            ("cn/arts/charportraits/portraits#0.png", atlas_png(16, 12)),
        ]));

        let report = slice(&backend, &[PathBuf::from("cn")]).await;
        assert_eq!(report, StageReport { processed: 1, skipped: 0, failed: 0 });

        let sprite = backend.read(Path::new("cn/arts/charportraits/char_1.png")).await.unwrap();
        assert_eq!(image::load_from_memory(&sprite).unwrap().to_rgba8().dimensions(), (10, 10));
        assert!(!backend.exists(Path::new("cn/arts/charportraits/portraits#0.json")).await.unwrap());
        assert!(!backend.exists(Path::new("cn/arts/charportraits/portraits#0.png")).await.unwrap());
    }

    #[tokio::test]
    async fn test_slice_bad_sprite_does_not_stop_siblings() {
        let descriptor = json!([
            {"name": "outside", "rect": {"x": 8, "y": 0, "width": 10, "height": 10}},
            {"name": "inside", "rect": {"x": 0, "y": 0, "width": 4, "height": 4}},
        ]);
        let backend: BackendHandle = Arc::new(MockBackend::with_files([
            ("cn/portraits#3.json", serde_json::to_vec(&descriptor).unwrap()),
            ("cn/portraits#3.png", atlas_png(12, 12)),
        ]));

        let report = slice(&backend, &[PathBuf::from("cn")]).await;
        assert_eq!(report, StageReport { processed: 1, skipped: 0, failed: 1 });
        assert!(backend.exists(Path::new("cn/inside.png")).await.unwrap());
        assert!(!backend.exists(Path::new("cn/outside.png")).await.unwrap());
        assert!(!backend.exists(Path::new("cn/portraits#3.json")).await.unwrap());
    }

    #[tokio::test]
    async fn test_slice_missing_image_is_skipped() {
        let backend: BackendHandle = Arc::new(MockBackend::with_files([("cn/portraits#1.json", b"[]".to_vec())]));
        let report = slice(&backend, &[PathBuf::from("cn")]).await;
        assert_eq!(report, StageReport { processed: 0, skipped: 1, failed: 0 });
        assert!(backend.exists(Path::new("cn/portraits#1.json")).await.unwrap());
    }
}
