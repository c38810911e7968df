//! Unpacking downloaded bundles into the output tree.
//!
//! Every bundle below the server roots is handed to a [`BundleReader`]; each
//! record it yields is converted and written next to where the bundle's
//! container path says it belongs. Bundles run concurrently up to the
//! configured bundle limit, and records share one semaphore across all
//! bundles.
//!
//! A bundle is deleted once it has been extracted, subject to the configured
//! [`Cleanup`] policy. A bundle the reader cannot open is always kept.

mod bundle;
pub mod error;
mod stream;

pub use self::bundle::BundleReport;
pub use self::stream::{ExtractEvent, extract};
use sanity_config::{Cleanup, ConcurrencyConfig};
use sanity_extract::BundleReader;
use sanity_storage::BackendHandle;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Shared state of one extraction run.
pub struct ExtractContext {
    backend: BackendHandle,
    reader: Arc<dyn BundleReader>,
    records: Semaphore,
    bundles: usize,
    cleanup: Cleanup,
}

impl ExtractContext {
    pub fn new(
        backend: BackendHandle,
        reader: Arc<dyn BundleReader>,
        concurrency: &ConcurrencyConfig,
        cleanup: Cleanup,
    ) -> Self {
        Self {
            backend,
            reader,
            records: Semaphore::new(concurrency.records.max(1)),
            bundles: concurrency.bundles.max(1),
            cleanup,
        }
    }

    pub fn cleanup(&self) -> Cleanup {
        self.cleanup
    }
}
