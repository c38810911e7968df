//! HTTP client abstraction.
//!
//! Everything that talks to a content server goes through [`HttpClient`], so
//! the resolver, manifest fetcher and downloader can be exercised against
//! [`MockClient`] (behind the `mock` feature) without a network.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sanity_config::NetworkConfig;
use std::future::Future;

/// Minimal asynchronous HTTP interface.
///
/// Implementations apply their own timeout and must map any non-success
/// status to [`ErrorKind::Status`] and transport failures to
/// [`ErrorKind::Network`], so that retry decisions stay with the caller.
pub trait HttpClient: Send + Sync {
    /// Fetch the whole body of `url`.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Production client backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .or_raise(|| ErrorKind::Client)?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await.or_raise(|| ErrorKind::Network(url.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        let body = response.bytes().await.or_raise(|| ErrorKind::Network(url.to_string()))?;
        Ok(body.to_vec())
    }
}

#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockClient;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use super::HttpClient;
    use crate::error::{ErrorKind, Result};
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    #[derive(Debug, Clone)]
    enum Route {
        Body(Vec<u8>),
        Status(u16),
        Unreachable,
    }

    /// In-memory HTTP client for testing.
    ///
    /// Responses are routed by exact URL; unknown URLs answer `404`. Every
    /// request is recorded, so tests can assert on what was (not) fetched.
    #[derive(Debug, Default)]
    pub struct MockClient {
        routes: Mutex<HashMap<String, Route>>,
        requests: Mutex<Vec<String>>,
    }

    impl MockClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_body(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
            self.set_body(url, body);
            self
        }

        pub fn with_json(self, url: impl Into<String>, value: &serde_json::Value) -> Self {
            self.with_body(url, value.to_string())
        }

        pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
            Self::guard(&self.routes).insert(url.into(), Route::Status(status));
            self
        }

        /// Every request to `url` fails as if the host were unreachable.
        pub fn with_unreachable(self, url: impl Into<String>) -> Self {
            Self::guard(&self.routes).insert(url.into(), Route::Unreachable);
            self
        }

        /// Replace the response for `url` between runs.
        pub fn set_body(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
            Self::guard(&self.routes).insert(url.into(), Route::Body(body.into()));
        }

        /// All requested URLs, in request order.
        pub fn requests(&self) -> Vec<String> {
            Self::guard(&self.requests).clone()
        }

        pub fn request_count(&self, url: &str) -> usize {
            Self::guard(&self.requests).iter().filter(|requested| *requested == url).count()
        }

        pub fn clear_requests(&self) {
            Self::guard(&self.requests).clear();
        }

        fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
            mutex.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl HttpClient for MockClient {
        async fn get(&self, url: &str) -> Result<Vec<u8>> {
            Self::guard(&self.requests).push(url.to_string());
            let route = Self::guard(&self.routes).get(url).cloned();
            match route {
                Some(Route::Body(body)) => Ok(body),
                Some(Route::Status(status)) => exn::bail!(ErrorKind::Status(status)),
                Some(Route::Unreachable) => exn::bail!(ErrorKind::Network(url.to_string())),
                None => exn::bail!(ErrorKind::Status(404)),
            }
        }
    }
}
