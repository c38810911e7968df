//! Schema-driven decoding of binary data tables.

use crate::crypto::SIGNATURE_LEN;
use crate::error::{ErrorKind, Result};
use crate::tool;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Decodes binary tables given the name of their schema.
#[async_trait]
pub trait SchemaDecoder: Send + Sync {
    /// Names of the tables this decoder has schemas for.
    fn catalog(&self) -> &[String];

    /// Decode a table file, still carrying its signature block, to JSON.
    async fn decode(&self, table: &str, data: &[u8]) -> Result<Value>;
}

/// The longest catalog name contained in `stem`.
///
/// ```
/// # use sanity_process::schema::match_table;
/// let catalog = ["item_table".to_string(), "character_table".to_string(), "char".to_string()];
/// assert_eq!(match_table(&catalog, "character_table8f3a"), Some("character_table"));
/// assert_eq!(match_table(&catalog, "skin_table"), None);
/// ```
pub fn match_table<'a>(catalog: &'a [String], stem: &str) -> Option<&'a str> {
    catalog
        .iter()
        .filter(|name| !name.is_empty() && stem.contains(name.as_str()))
        .max_by_key(|name| name.len())
        .map(String::as_str)
}

/// Decodes tables with `flatc` and a directory of FlatBuffers schemas.
///
/// Each `<table>.fbs` in the schema directory contributes `<table>` to the
/// catalog.
#[derive(Debug, Clone)]
pub struct FlatcDecoder {
    program: PathBuf,
    schema_dir: PathBuf,
    catalog: Vec<String>,
}

impl FlatcDecoder {
    /// Locate `flatc` and load the schema catalog.
    pub fn discover(flatc: Option<&str>, schema_dir: &Path) -> Result<Self> {
        let program = tool::discover(flatc, "flatc")?;
        Self::new(program, schema_dir)
    }

    pub fn new(program: impl Into<PathBuf>, schema_dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(schema_dir)
            .or_raise(|| ErrorKind::Schema(format!("cannot read schema directory {}", schema_dir.display())))?;
        let mut catalog: Vec<String> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension() == Some(OsStr::new("fbs")))
            .filter_map(|path| path.file_stem().and_then(OsStr::to_str).map(str::to_string))
            .collect();
        catalog.sort_unstable();
        tracing::info!(schemas = catalog.len(), dir = %schema_dir.display(), "Schema catalog loaded");
        Ok(Self {
            program: program.into(),
            schema_dir: schema_dir.to_path_buf(),
            catalog,
        })
    }
}

#[async_trait]
impl SchemaDecoder for FlatcDecoder {
    fn catalog(&self) -> &[String] {
        &self.catalog
    }

    #[tracing::instrument(skip(self, data), fields(bytes = data.len()))]
    async fn decode(&self, table: &str, data: &[u8]) -> Result<Value> {
        let body = data
            .get(SIGNATURE_LEN..)
            .ok_or_raise(|| ErrorKind::Schema(format!("{table}: shorter than its header")))?;
        let dir = tempfile::tempdir().or_raise(|| ErrorKind::Io)?;
        let input = dir.path().join(format!("{table}.bytes"));
        tokio::fs::write(&input, body).await.or_raise(|| ErrorKind::Io)?;
        let schema = self.schema_dir.join(format!("{table}.fbs"));
        let args = [
            OsStr::new("-o"),
            dir.path().as_os_str(),
            OsStr::new("--json"),
            OsStr::new("--strict-json"),
            OsStr::new("--natural-utf8"),
            OsStr::new("--defaults-json"),
            OsStr::new("--raw-binary"),
            schema.as_os_str(),
            OsStr::new("--"),
            input.as_os_str(),
        ];
        tool::run(&self.program, args).await.or_raise(|| ErrorKind::Schema(table.to_string()))?;
        let json = tokio::fs::read(dir.path().join(format!("{table}.json")))
            .await
            .or_raise(|| ErrorKind::Schema(format!("{table}: no output")))?;
        serde_json::from_slice(&json).or_raise(|| ErrorKind::Schema(format!("{table}: output is not JSON")))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::BTreeMap;

    /// Decoder answering from a fixed table of results.
    pub(crate) struct FakeDecoder {
        catalog: Vec<String>,
        tables: BTreeMap<String, Value>,
    }

    impl FakeDecoder {
        pub(crate) fn new(tables: impl IntoIterator<Item = (&'static str, Option<Value>)>) -> Self {
            let mut catalog = Vec::new();
            let mut decoded = BTreeMap::new();
            for (name, value) in tables {
                catalog.push(name.to_string());
                if let Some(value) = value {
                    decoded.insert(name.to_string(), value);
                }
            }
            Self { catalog, tables: decoded }
        }
    }

    #[async_trait]
    impl SchemaDecoder for FakeDecoder {
        fn catalog(&self) -> &[String] {
            &self.catalog
        }

        async fn decode(&self, table: &str, _data: &[u8]) -> Result<Value> {
            self.tables.get(table).cloned().ok_or_raise(|| ErrorKind::Schema(table.to_string()))
        }
    }

    #[rstest]
    #[case("character_table", Some("character_table"))]
    #[case("character_table_1a2b", Some("character_table"))]
    #[case("skin_table", Some("skin_table"))]
    #[case("charword_table", Some("charword_table"))]
    #[case("gacha_table", None)]
    fn test_match_table_prefers_longest(#[case] stem: &str, #[case] expected: Option<&str>) {
        let catalog = ["skin_table", "char", "character_table", "charword_table"].map(str::to_string);
        assert_eq!(match_table(&catalog, stem), expected);
    }

    #[test]
    fn test_new_loads_catalog() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["skin_table.fbs", "character_table.fbs", "README.md"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let decoder = FlatcDecoder::new("flatc", dir.path()).unwrap();
        assert_eq!(decoder.catalog(), ["character_table", "skin_table"]);
    }

    #[test]
    fn test_new_missing_dir() {
        let err = FlatcDecoder::new("flatc", Path::new("/nonexistent/schemas")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Schema(_)));
    }
}
