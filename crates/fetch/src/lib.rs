//! Talking to the content servers.
//!
//! A sync of one server is strictly sequential: [`version::resolve`] first,
//! then [`manifest::fetch`] with the resolved version, then one
//! [`Downloader::download`] per manifest entry. The downloader is shared by
//! every server of a run; its semaphore caps in-flight downloads globally.

mod client;
mod download;
mod endpoints;
pub mod error;
pub mod manifest;
mod retry;
pub mod version;
mod whitelist;

#[cfg(any(test, feature = "mock"))]
pub use crate::client::MockClient;
pub use crate::client::{HttpClient, ReqwestClient};
pub use crate::download::{DownloadOutcome, Downloader, ServerTarget, SkipReason};
pub use crate::endpoints::{Endpoints, download_key};
pub use crate::manifest::ManifestEntry;
pub use crate::retry::RetryPolicy;
pub use crate::whitelist::is_whitelisted;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::de::DeserializeOwned;

/// An [`HttpClient`] with a retry policy applied to every request.
#[derive(Debug)]
pub struct Remote<C> {
    client: C,
    retry: RetryPolicy,
}

impl<C: HttpClient> Remote<C> {
    pub fn new(client: C, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetch `url`, retrying transient failures.
    pub async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let client = &self.client;
        self.retry.run(url, move || client.get(url)).await
    }

    /// Fetch `url` and parse the body as JSON.
    ///
    /// A body that does not parse is a [`Protocol`](ErrorKind::Protocol)
    /// error and is not retried.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get(url).await?;
        serde_json::from_slice(&body).or_raise(|| ErrorKind::Protocol(format!("{url} did not return the expected JSON")))
    }
}
