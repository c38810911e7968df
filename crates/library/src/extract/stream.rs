use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::extract::ExtractContext;
use crate::extract::bundle::{BundleReport, extract_bundle};
use crate::extract::error::{ErrorKind as ExtractErrorKind, Result as ExtractResult};
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use sanity_extract::is_bundle;
use std::collections::VecDeque;
use std::path::PathBuf;

/// Progress events emitted by [`extract`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete): exactly once, with the
///    total bundle count.
/// 3. [`Extracted`](Self::Extracted): zero or more times, one per bundle that
///    could be read.
/// 4. [`Complete`](Self::Complete): exactly once.
#[derive(Debug)]
pub enum ExtractEvent {
    Started,
    DiscoveryComplete(u64),
    Extracted(BundleReport),
    Complete,
}

/// Streams [`ExtractEvent`]s while extracting every bundle below `roots`.
///
/// Each root is a server directory; records of a bundle found below it are
/// placed relative to that root. Unreadable bundles and listing failures are
/// surfaced as `Err` items without terminating the stream.
pub fn extract<'a>(
    ctx: &'a ExtractContext,
    roots: &'a [PathBuf],
) -> impl Stream<Item = LibraryResult<ExtractEvent>> + 'a {
    stream! {
        for await event in extract_inner(ctx, roots) {
            yield event.or_raise(|| LibraryErrorKind::Extract);
        }
    }
}

fn extract_inner<'a>(
    ctx: &'a ExtractContext,
    roots: &'a [PathBuf],
) -> impl Stream<Item = ExtractResult<ExtractEvent>> + 'a {
    stream!({
        yield Ok(ExtractEvent::Started);

        let mut pending = VecDeque::new();
        for root in roots {
            let mut listing = ctx.backend.list_stream(Some(root));
            while let Some(item) = listing.next().await {
                match item {
                    Ok(info) if is_bundle(&info.path) => pending.push_back(extract_bundle(ctx, root, info.path)),
                    Ok(_) => {},
                    Err(e) => {
                        yield Err(e.raise(ExtractErrorKind::Storage(root.clone())));
                    },
                }
            }
        }
        yield Ok(ExtractEvent::DiscoveryComplete(u64::try_from(pending.len()).unwrap_or(0)));

        let mut running = FuturesUnordered::new();
        running.extend(pending.drain(..ctx.bundles.min(pending.len())));
        while let Some(result) = running.next().await {
            yield result.map(ExtractEvent::Extracted);
            // Pop-n-push, FIFO.
            if let Some(next) = pending.pop_front() {
                running.push(next);
            }
        }

        yield Ok(ExtractEvent::Complete);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanity_config::{Cleanup, ConcurrencyConfig};
    use sanity_extract::{BundleRecord, MockReader, Payload};
    use sanity_storage::BackendHandle;
    use sanity_storage::backend::MockBackend;
    use std::path::Path;
    use std::sync::Arc;

    fn text(name: &str) -> Vec<BundleRecord> {
        vec![BundleRecord::new(name, Payload::TextBlob(name.as_bytes().to_vec()))]
    }

    #[tokio::test]
    async fn test_extract_all_bundles() {
        let backend: BackendHandle = Arc::new(MockBackend::with_files([
            ("cn/a/one.ab", b"1".to_vec()),
            ("cn/a/two.bin", b"2".to_vec()),
            ("cn/a/broken.ab", b"3".to_vec()),
            ("cn/a/notes.txt", b"4".to_vec()),
            ("en/b/three.ab", b"5".to_vec()),
        ]));
        let reader = MockReader::new()
            .with_records("cn/a/one.ab", text("one_table"))
            .with_records("cn/a/two.bin", text("two_table"))
            .with_records("en/b/three.ab", text("three_table"));
        let concurrency = ConcurrencyConfig {
            bundles: 2,
            ..ConcurrencyConfig::default()
        };
        let ctx = ExtractContext::new(Arc::clone(&backend), Arc::new(reader), &concurrency, Cleanup::Strict);
        let roots = [PathBuf::from("cn"), PathBuf::from("en")];

        let events: Vec<_> = extract(&ctx, &roots).collect().await;
        assert!(matches!(events.first(), Some(Ok(ExtractEvent::Started))));
        assert!(matches!(events[1], Ok(ExtractEvent::DiscoveryComplete(4))));
        assert!(matches!(events.last(), Some(Ok(ExtractEvent::Complete))));
        let reports: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                Ok(ExtractEvent::Extracted(report)) => Some(report),
                _ => None,
            })
            .collect();
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|report| report.deleted && report.written == 1));
        let errors: Vec<_> = events.iter().filter(|event| event.is_err()).collect();
        assert_eq!(errors.len(), 1);

        assert_eq!(backend.read(Path::new("cn/a/one_table")).await.unwrap(), b"one_table");
        assert_eq!(backend.read(Path::new("en/b/three_table")).await.unwrap(), b"three_table");
        assert!(backend.exists(Path::new("cn/a/broken.ab")).await.unwrap());
        assert!(backend.exists(Path::new("cn/a/notes.txt")).await.unwrap());
        assert!(!backend.exists(Path::new("cn/a/one.ab")).await.unwrap());
    }

    #[tokio::test]
    async fn test_nothing_to_extract() {
        let backend: BackendHandle = Arc::new(MockBackend::default());
        let ctx = ExtractContext::new(backend, Arc::new(MockReader::new()), &ConcurrencyConfig::default(), Cleanup::Strict);
        let roots = [PathBuf::from("cn")];

        let events: Vec<_> = extract(&ctx, &roots).collect().await;
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], Ok(ExtractEvent::DiscoveryComplete(0))));
    }
}
