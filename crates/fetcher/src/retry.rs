//! Exponential backoff for provider queries.
//!
//! [`RetryingFetcher`] wraps any [`StateFetcher`] and retries transient
//! failures. Callers see either the first success or the last error, never
//! the intermediate ones.
//!
//! ```text
//! attempt 1 ──fail──▶ sleep base ──▶ attempt 2 ──fail──▶ sleep base×m ──▶ ...
//!                                     (delay capped at max_delay)
//! ```

use std::future::Future;
use std::time::Duration;

use infraprobe_core::config::RetryConfig;
use infraprobe_core::error::FetchError;
use infraprobe_core::metrics::{FETCH_RETRIES_TOTAL, LABEL_PROVIDER};
use infraprobe_core::types::{HealthRecord, ObservedState, ProviderKind};
use metrics::counter;
use rand::Rng;
use tracing::{debug, warn};

use crate::fetcher::StateFetcher;

/// Backoff parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
    pub retry_not_found: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            jitter: config.jitter,
            retry_not_found: config.retry_not_found,
        }
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let secs = self.base_delay.as_secs_f64() * exp;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    fn delay(&self, retry: u32) -> Duration {
        let delay = self.backoff(retry);
        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..1.5);
            delay.mul_f64(factor).min(self.max_delay)
        } else {
            delay
        }
    }

    fn is_retryable(&self, error: &FetchError) -> bool {
        error.is_transient() || (self.retry_not_found && error.is_not_found())
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(
        &self,
        provider: ProviderKind,
        operation: &'static str,
        mut op: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if self.is_retryable(&e) && attempt < self.max_attempts => {
                    let delay = self.delay(attempt);
                    debug!(
                        provider = %provider,
                        operation,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying provider query"
                    );
                    counter!(FETCH_RETRIES_TOTAL, LABEL_PROVIDER => provider.to_string())
                        .increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if self.is_retryable(&e) {
                        warn!(
                            provider = %provider,
                            operation,
                            attempts = attempt,
                            error = %e,
                            "provider query retries exhausted"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// A fetcher whose queries are retried under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: StateFetcher> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<F: StateFetcher> StateFetcher for RetryingFetcher<F> {
    fn provider(&self) -> ProviderKind {
        self.inner.provider()
    }

    async fn describe_resource(&self, id: &str) -> Result<ObservedState, FetchError> {
        self.policy
            .run(self.provider(), "describe_resource", || {
                self.inner.describe_resource(id)
            })
            .await
    }

    async fn describe_health(&self, id: &str) -> Result<Vec<HealthRecord>, FetchError> {
        self.policy
            .run(self.provider(), "describe_health", || self.inner.describe_health(id))
            .await
    }

    async fn list_attachments(&self, id: &str) -> Result<Vec<String>, FetchError> {
        self.policy
            .run(self.provider(), "list_attachments", || self.inner.list_attachments(id))
            .await
    }
}
