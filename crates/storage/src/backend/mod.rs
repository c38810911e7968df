//! Storage backend trait and implementations.
//!
//! [`LocalBackend`] stores the output tree on the local filesystem;
//! [`MockBackend`] (behind the `mock` feature) keeps it in memory for tests.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::FileInfo;
use crate::error::Result;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface to the output tree.
///
/// All paths are relative to the backend root and are validated with
/// [`validate_path`](crate::validate_path) before use; a path escaping the
/// root is rejected with [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use sanity_storage::{StorageBackend, error::Result};
///
/// async fn bundle_size(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("cn/chararts/char_002_amiya.ab");
///     if backend.exists(path).await? {
///         Ok(backend.read(path).await?.len() as u64)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, used for logging only.
    fn name(&self) -> &str;

    /// List all files below an optional prefix.
    ///
    /// Collects [`list_stream()`](Self::list_stream) into a [`Vec`].
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream metadata of all files below an optional prefix.
    ///
    /// Prefixes are matched per path component, so `cn/arts` matches
    /// `cn/arts/a.png` but not `cn/artsy/a.png`. A prefix that does not
    /// exist yields an empty stream. Errors on individual entries are
    /// yielded without ending the stream.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// use std::path::Path;
    /// # use sanity_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream(Some(Path::new("cn")));
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.path.display(), info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Read at most the first `bytes` bytes, for content sniffing.
    ///
    /// Returns the whole file if it is shorter than `bytes`.
    async fn read_head(&self, path: &Path, bytes: usize) -> Result<Vec<u8>>;

    /// Write file contents, creating parent directories as needed and
    /// overwriting any existing file.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Move a file within the backend, overwriting the destination and
    /// creating its parent directories as needed.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}
