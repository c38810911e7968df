//! Directory flattening.
//!
//! Some consumers expect flat image directories where extraction produced
//! nested ones (`arts/items/<group>/<icon>.png`). A [`FlattenRule`] moves every
//! file below its `source` directly into its `target`. Rules are resolved
//! relative to each server root and applied in order.

use crate::error::{ErrorKind, Result};
use crate::{StageReport, Step, list_files};
use exn::ResultExt;
use sanity_config::FlattenRule;
use sanity_storage::BackendHandle;
use std::path::{Path, PathBuf};

/// Where `path` ends up under `rule`, given the rule's resolved directories.
///
/// Returns `None` for files the rule does not move: those outside `source`,
/// and with `per_child`, files sitting directly in `source`.
pub fn destination(source: &Path, target: &Path, per_child: bool, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(source).ok()?;
    let file_name = path.file_name()?;
    if !per_child {
        return Some(target.join(file_name));
    }
    let mut components = relative.components();
    let child = components.next()?;
    components.next()?;
    Some(target.join(child).join(file_name))
}

/// Apply every rule below each of `roots`.
#[tracing::instrument(skip_all, fields(rules = rules.len()))]
pub async fn flatten(backend: &BackendHandle, roots: &[PathBuf], rules: &[FlattenRule]) -> StageReport {
    let mut report = StageReport::default();
    for root in roots {
        for rule in rules {
            let source = root.join(&rule.source);
            let target = root.join(&rule.target);
            for file in list_files(backend, std::slice::from_ref(&source)).await {
                let Some(destination) = destination(&source, &target, rule.per_child, &file.path) else { continue };
                let result = move_file(backend, &file.path, &destination).await;
                report.tally(&file.path, result);
            }
        }
    }
    tracing::info!(%report, "Flattening complete");
    report
}

async fn move_file(backend: &BackendHandle, from: &Path, to: &Path) -> Result<Step> {
    if from == to {
        return Ok(Step::Skipped);
    }
    if backend.exists(to).await.or_raise(|| ErrorKind::Storage)? {
        tracing::warn!(from = %from.display(), to = %to.display(), "Target file exists, overwriting");
    }
    backend.rename(from, to).await.or_raise(|| ErrorKind::Storage)?;
    tracing::trace!(from = %from.display(), to = %to.display(), "File moved");
    Ok(Step::Processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sanity_storage::backend::MockBackend;
    use std::sync::Arc;

    #[rstest]
    #[case(false, "cn/arts/items/a/b/icon.png", Some("cn/arts/items/icon.png"))]
    #[case(false, "cn/arts/items/icon.png", Some("cn/arts/items/icon.png"))]
    #[case(false, "cn/arts/skills/icon.png", None)]
    #[case(true, "cn/arts/items/char_002/x/y/skin.png", Some("cn/arts/items/char_002/skin.png"))]
    #[case(true, "cn/arts/items/loose.png", None)]
    fn test_destination(#[case] per_child: bool, #[case] path: &str, #[case] expected: Option<&str>) {
        let source = Path::new("cn/arts/items");
        assert_eq!(destination(source, source, per_child, Path::new(path)), expected.map(PathBuf::from));
    }

    fn rule(source: &str, target: &str, per_child: bool) -> FlattenRule {
        FlattenRule { source: source.into(), target: target.into(), per_child }
    }

    #[tokio::test]
    async fn test_flatten() {
        let backend: BackendHandle = Arc::new(MockBackend::with_files([
            ("cn/arts/items/icons/gold.png", b"gold".to_vec()),
            ("cn/arts/items/icons/deep/exp.png", b"exp".to_vec()),
            ("cn/arts/items/flat.png", b"flat".to_vec()),
            ("cn/arts/characters/char_002_amiya/skins/1/char_002_amiya_1.png", b"amiya".to_vec()),
            ("cn/arts/characters/stray.png", b"stray".to_vec()),
            ("en/arts/items/icons/gold.png", b"gold".to_vec()),
        ]));
        let rules = [rule("arts/items", "arts/items", false), rule("arts/characters", "arts/characters", true)];

        let report = flatten(&backend, &[PathBuf::from("cn")], &rules).await;
        assert_eq!(report, StageReport { processed: 3, skipped: 1, failed: 0 });

        let mut paths = backend.list(Some(Path::new("cn"))).await.unwrap().into_iter().map(|f| f.path).collect::<Vec<_>>();
        paths.sort();
        assert_eq!(
            paths,
            [
                "cn/arts/characters/char_002_amiya/char_002_amiya_1.png",
                "cn/arts/characters/stray.png",
                "cn/arts/items/exp.png",
                "cn/arts/items/flat.png",
                "cn/arts/items/gold.png",
            ]
            .map(PathBuf::from)
        );
        assert!(backend.exists(Path::new("en/arts/items/icons/gold.png")).await.unwrap());
    }

    #[tokio::test]
    async fn test_flatten_overwrites_on_collision() {
        let backend: BackendHandle = Arc::new(MockBackend::with_files([
            ("cn/arts/skills/a/icon.png", b"a".to_vec()),
            ("cn/arts/skills/icon.png", b"old".to_vec()),
        ]));
        let rules = [rule("arts/skills", "arts/skills", false)];
        flatten(&backend, &[PathBuf::from("cn")], &rules).await;
        assert_eq!(backend.read(Path::new("cn/arts/skills/icon.png")).await.unwrap(), b"a");
    }
}
