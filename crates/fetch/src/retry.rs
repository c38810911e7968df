use crate::error::{ErrorKind, Result};
use sanity_config::NetworkConfig;
use std::future::Future;
use std::time::Duration;

/// Exponential backoff for retryable request failures.
///
/// The wait before retry `n` (0-indexed) is `1s * 2^(n + 1)`, clamped to
/// `[min_wait, max_wait]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    min_wait: Duration,
    max_wait: Duration,
}

impl RetryPolicy {
    /// `attempts` counts the first try; zero is treated as one. A `max_wait`
    /// below `min_wait` is raised to it.
    pub fn new(attempts: u32, min_wait: Duration, max_wait: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            min_wait,
            max_wait: max_wait.max(min_wait),
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.retry_attempts, config.retry_min_wait(), config.retry_max_wait())
    }

    /// Retry without waiting in between.
    pub fn immediate(attempts: u32) -> Self {
        Self::new(attempts, Duration::ZERO, Duration::ZERO)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self, retry: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(retry.saturating_add(1));
        Duration::from_secs(1).saturating_mul(multiplier).clamp(self.min_wait, self.max_wait)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are exhausted. The last error is returned.
    pub async fn run<T, F, Fut>(&self, target: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retry + 1 < self.attempts => {
                    let delay = self.delay(retry);
                    let kind: &ErrorKind = &e;
                    tracing::warn!(
                        target_url = target,
                        attempt = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %kind,
                        "Request failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&NetworkConfig::default())
    }
}
