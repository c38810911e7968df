//! Text asset decoding.
//!
//! Text assets come out of extraction in one of three shapes:
//!
//! - **Documents** (`.json`): usually plain JSON, sometimes BSON under a JSON
//!   name. BSON is rewritten in place as pretty JSON.
//! - **Scripts** (`.lua`, or anything below `[uc]lua`): encrypted Lua,
//!   decrypted to `<stem>.lua`.
//! - **Tables** (below `gamedata`, or named `*_table`, `*_data`,
//!   `*_database`, `*_const`): binary tables decoded to `<stem>.json`, first
//!   through a [`SchemaDecoder`] and otherwise by decryption.
//!
//! Files that are already in their decoded form are skipped, so running the
//! stage twice changes nothing.

use crate::consts::{SCRIPT_DIR, SNIFF_LEN, TABLE_SUFFIXES, TEXT_SKIP_EXTENSIONS};
use crate::crypto;
use crate::error::{ErrorKind, Result};
use crate::schema::{SchemaDecoder, match_table};
use crate::{StageReport, Step, list_files};
use bson::{Bson, Document};
use exn::{OptionExt, ResultExt};
use sanity_storage::{BackendHandle, extension_of};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// How the text stage treats a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Document,
    Script,
    Table,
}

/// Decide how a file is handled from its path alone.
pub fn classify(path: &Path) -> Option<TextKind> {
    let extension = extension_of(path);
    match extension.as_deref() {
        Some(ext) if TEXT_SKIP_EXTENSIONS.contains(&ext) => return None,
        Some("json") => return Some(TextKind::Document),
        Some("lua") => return Some(TextKind::Script),
        _ => {},
    }
    let in_dir = |name: &str| path.components().any(|c| c == Component::Normal(OsStr::new(name)));
    if in_dir(SCRIPT_DIR) {
        return Some(TextKind::Script);
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if in_dir("gamedata") || TABLE_SUFFIXES.iter().any(|suffix| stem.ends_with(suffix)) {
        return Some(TextKind::Table);
    }
    None
}

/// Parse decoded bytes as JSON, falling back to BSON.
pub fn parse_document(data: &[u8]) -> Result<Value> {
    if let Ok(value) = serde_json::from_slice(data) {
        return Ok(value);
    }
    bson_to_json(data)
}

fn bson_to_json(data: &[u8]) -> Result<Value> {
    let document: Document = bson::from_slice(data).or_raise(|| ErrorKind::Document)?;
    Ok(Bson::Document(document).into_relaxed_extjson())
}

fn pretty(value: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).or_raise(|| ErrorKind::Document)
}

fn stem(path: &Path) -> Result<&str> {
    path.file_stem().and_then(|s| s.to_str()).ok_or_raise(|| ErrorKind::Document)
}

/// Where a decrypted script is written: `<stem>.lua`, without doubling an
/// existing `.lua` (so `foo.lua.bytes` becomes `foo.lua`).
fn script_output(path: &Path) -> Result<PathBuf> {
    let stem = stem(path)?;
    Ok(if stem.ends_with(".lua") {
        path.with_file_name(stem)
    } else {
        path.with_file_name(format!("{stem}.lua"))
    })
}

/// Decode every text asset below `roots`.
///
/// Without a schema decoder, tables are only decrypted.
#[tracing::instrument(skip_all, fields(schema = schema.is_some()))]
pub async fn decode(backend: &BackendHandle, roots: &[PathBuf], schema: Option<&dyn SchemaDecoder>) -> StageReport {
    let mut report = StageReport::default();
    for file in list_files(backend, roots).await {
        let Some(kind) = classify(&file.path) else { continue };
        let result = match kind {
            TextKind::Document => normalise_document(backend, &file.path).await,
            TextKind::Script => decrypt_script(backend, &file.path).await,
            TextKind::Table => decode_table(backend, &file.path, schema).await,
        };
        report.tally(&file.path, result);
    }
    tracing::info!(%report, "Text decoding complete");
    report
}

async fn normalise_document(backend: &BackendHandle, path: &Path) -> Result<Step> {
    let data = backend.read(path).await.or_raise(|| ErrorKind::Storage)?;
    if serde_json::from_slice::<Value>(&data).is_ok() {
        return Ok(Step::Skipped);
    }
    let Ok(value) = bson_to_json(&data) else {
        tracing::debug!(path = %path.display(), "Document is neither JSON nor BSON; leaving as is");
        return Ok(Step::Skipped);
    };
    backend.write(path, &pretty(&value)?).await.or_raise(|| ErrorKind::Storage)?;
    tracing::debug!(path = %path.display(), "BSON document rewritten as JSON");
    Ok(Step::Processed)
}

async fn decrypt_script(backend: &BackendHandle, path: &Path) -> Result<Step> {
    let data = backend.read(path).await.or_raise(|| ErrorKind::Storage)?;
    let plaintext = match crypto::decrypt(&data) {
        Ok(plaintext) => plaintext,
        Err(_) if std::str::from_utf8(&data).is_ok() => return Ok(Step::Skipped),
        Err(e) => return Err(e),
    };
    let output = script_output(path)?;
    replace(backend, path, &output, &plaintext).await?;
    tracing::debug!(path = %output.display(), "Script decrypted");
    Ok(Step::Processed)
}

async fn decode_table(backend: &BackendHandle, path: &Path, schema: Option<&dyn SchemaDecoder>) -> Result<Step> {
    let head = backend.read_head(path, SNIFF_LEN).await.or_raise(|| ErrorKind::Storage)?;
    if memchr::memchr(0, &head).is_none() {
        return Ok(Step::Skipped);
    }
    let data = backend.read(path).await.or_raise(|| ErrorKind::Storage)?;
    let stem = stem(path)?;

    let mut decoded = None;
    if let Some(decoder) = schema
        && let Some(table) = match_table(decoder.catalog(), stem)
    {
        match decoder.decode(table, &data).await {
            Ok(value) => decoded = Some(value),
            Err(e) => tracing::debug!(path = %path.display(), table, error = ?e, "Schema decoding failed; trying decryption"),
        }
    }
    let value = match decoded {
        Some(value) => value,
        None => parse_document(&crypto::decrypt(&data)?)?,
    };

    let output = path.with_file_name(format!("{stem}.json"));
    replace(backend, path, &output, &pretty(&value)?).await?;
    tracing::debug!(path = %output.display(), "Table decoded");
    Ok(Step::Processed)
}

/// Write `data` to `output`, then remove `original` if it is a different file.
async fn replace(backend: &BackendHandle, original: &Path, output: &Path, data: &[u8]) -> Result<()> {
    backend.write(output, data).await.or_raise(|| ErrorKind::Storage)?;
    if output != original {
        backend.delete(original).await.or_raise(|| ErrorKind::Storage)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::tests::encrypt;
    use crate::schema::tests::FakeDecoder;
    use rstest::rstest;
    use sanity_storage::backend::MockBackend;
    use serde_json::json;
    use std::sync::Arc;

    fn backend(files: impl IntoIterator<Item = (&'static str, Vec<u8>)>) -> BackendHandle {
        Arc::new(MockBackend::with_files(files))
    }

    async fn read_json(backend: &BackendHandle, path: &str) -> Value {
        serde_json::from_slice(&backend.read(Path::new(path)).await.unwrap()).unwrap()
    }

    #[rstest]
    #[case("cn/gamedata/excel/character_table.json", Some(TextKind::Document))]
    #[case("cn/gamedata/excel/character_table", Some(TextKind::Table))]
    #[case("cn/gamedata/levels/obt/main/level_main_00-01.bytes", Some(TextKind::Table))]
    #[case("cn/spritepack/skin_data", Some(TextKind::Table))]
    #[case("cn/misc/gacha_const.bytes", Some(TextKind::Table))]
    #[case("cn/gamedata/[uc]lua/hotfixes/fix.lua.bytes", Some(TextKind::Script))]
    #[case("cn/mods/init.LUA", Some(TextKind::Script))]
    #[case("cn/gamedata/excel/portrait.png", None)]
    #[case("cn/audio/voice.wav", None)]
    #[case("cn/gamedata/arts.ab", None)]
    #[case("cn/misc/readme.txt", None)]
    fn test_classify(#[case] path: &str, #[case] expected: Option<TextKind>) {
        assert_eq!(classify(Path::new(path)), expected);
    }

    #[rstest]
    #[case("a/[uc]lua/fix.lua.bytes", "a/[uc]lua/fix.lua")]
    #[case("a/[uc]lua/fix.bytes", "a/[uc]lua/fix.lua")]
    #[case("a/fix.lua", "a/fix.lua")]
    fn test_script_output(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(script_output(Path::new(path)).unwrap(), PathBuf::from(expected));
    }

    #[tokio::test]
    async fn test_documents() {
        let bson = bson::to_vec(&bson::doc! { "charId": "char_002_amiya", "rarity": 5 }).unwrap();
        let backend = backend([
            ("cn/gamedata/plain.json", br#"{"a":1}"#.to_vec()),
            ("cn/gamedata/binary.json", bson),
            ("cn/gamedata/garbage.json", vec![0xff, 0x00, 0x13]),
        ]);

        let report = decode(&backend, &[PathBuf::from("cn")], None).await;
        assert_eq!(report, StageReport { processed: 1, skipped: 2, failed: 0 });
        assert_eq!(read_json(&backend, "cn/gamedata/binary.json").await, json!({"charId": "char_002_amiya", "rarity": 5}));
        assert_eq!(backend.read(Path::new("cn/gamedata/plain.json")).await.unwrap(), br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_scripts() {
        let backend = backend([
            ("cn/gamedata/[uc]lua/fix.lua.bytes", encrypt(b"print('patched')")),
            ("cn/gamedata/[uc]lua/plain.lua", b"print('already plain')".to_vec()),
        ]);

        let report = decode(&backend, &[PathBuf::from("cn")], None).await;
        assert_eq!(report, StageReport { processed: 1, skipped: 1, failed: 0 });
        assert_eq!(backend.read(Path::new("cn/gamedata/[uc]lua/fix.lua")).await.unwrap(), b"print('patched')");
        assert!(!backend.exists(Path::new("cn/gamedata/[uc]lua/fix.lua.bytes")).await.unwrap());
    }

    #[tokio::test]
    async fn test_table_through_schema() {
        let schema = FakeDecoder::new([("character_table", Some(json!({"char_002_amiya": {"rarity": 5}})))]);
        let backend = backend([("cn/gamedata/excel/character_table", vec![0; 256])]);

        let report = decode(&backend, &[PathBuf::from("cn")], Some(&schema)).await;
        assert_eq!(report.processed, 1);
        assert_eq!(
            read_json(&backend, "cn/gamedata/excel/character_table.json").await,
            json!({"char_002_amiya": {"rarity": 5}})
        );
        assert!(!backend.exists(Path::new("cn/gamedata/excel/character_table")).await.unwrap());
    }

    #[tokio::test]
    async fn test_table_falls_back_to_decryption() {
        let schema = FakeDecoder::new([("skin_table", None)]);
        let bson = bson::to_vec(&bson::doc! { "skins": ["a", "b"] }).unwrap();
        let backend = backend([
            ("cn/gamedata/excel/skin_table.bytes", encrypt(bson.as_slice())),
            ("cn/gamedata/excel/gacha_table.bytes", encrypt(br#"{"pools":[]}"#)),
        ]);

        let report = decode(&backend, &[PathBuf::from("cn")], Some(&schema)).await;
        assert_eq!(report, StageReport { processed: 2, skipped: 0, failed: 0 });
        assert_eq!(read_json(&backend, "cn/gamedata/excel/skin_table.json").await, json!({"skins": ["a", "b"]}));
        assert_eq!(read_json(&backend, "cn/gamedata/excel/gacha_table.json").await, json!({"pools": []}));
    }

    #[tokio::test]
    async fn test_table_failures_keep_original() {
        let backend = backend([
            ("cn/gamedata/excel/broken_table", vec![0; 100]),
            ("cn/gamedata/excel/text_table", b"plain text, no NUL".to_vec()),
        ]);

        let report = decode(&backend, &[PathBuf::from("cn")], None).await;
        assert_eq!(report, StageReport { processed: 0, skipped: 1, failed: 1 });
        assert!(backend.exists(Path::new("cn/gamedata/excel/broken_table")).await.unwrap());
        assert!(!backend.exists(Path::new("cn/gamedata/excel/broken_table.json")).await.unwrap());
    }

    #[tokio::test]
    async fn test_decode_is_idempotent() {
        let backend = backend([("cn/gamedata/excel/gacha_table.bytes", encrypt(br#"{"pools":[]}"#))]);
        let roots = [PathBuf::from("cn")];
        assert_eq!(decode(&backend, &roots, None).await.processed, 1);
        let again = decode(&backend, &roots, None).await;
        assert_eq!(again, StageReport { processed: 0, skipped: 1, failed: 0 });
    }
}
