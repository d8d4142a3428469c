//! Scripted provider fetcher and factory.
//!
//! The factory wraps every fetcher in a real `RetryingFetcher` with
//! millisecond backoff, so retry behavior is exercised end to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use infraprobe_core::error::FetchError;
use infraprobe_core::types::{HealthRecord, ObservedState, OutputSet, ProviderKind};
use infraprobe_fetcher::{FetcherFactory, ProviderTarget, RetryPolicy, RetryingFetcher, StateFetcher};

/// What every fetcher created by a [`MockFactory`] answers.
#[derive(Debug, Clone, Default)]
pub struct FetcherScript {
    /// Successive `describe_resource` answers; the last one repeats.
    pub observed: Vec<ObservedState>,
    pub attachments: Vec<String>,
    /// Leading calls that fail with a transient error.
    pub transient_failures: u32,
    /// Every call fails with this error (after the transient ones).
    pub error: Option<FetchError>,
    /// Every call hangs.
    pub hang: bool,
}

/// Counters shared by all fetchers of one factory.
#[derive(Default)]
pub struct FetchCalls {
    pub created: AtomicUsize,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl FetchCalls {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

pub struct MockFetcher {
    script: FetcherScript,
    remaining_transient: AtomicU32,
    answered: AtomicUsize,
    calls: Arc<FetchCalls>,
}

impl MockFetcher {
    async fn gate(&self) -> Result<(), FetchError> {
        self.calls.calls.fetch_add(1, Ordering::SeqCst);
        if self.script.hang {
            std::future::pending::<()>().await;
        }
        let transient = self
            .remaining_transient
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient {
            return Err(FetchError::Transient("Throttling: Rate exceeded".to_owned()));
        }
        match &self.script.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl StateFetcher for MockFetcher {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Aws
    }

    async fn describe_resource(&self, id: &str) -> Result<ObservedState, FetchError> {
        self.gate().await?;
        let n = self.answered.fetch_add(1, Ordering::SeqCst);
        let last = self.script.observed.len().checked_sub(1);
        last.map(|last| self.script.observed[n.min(last)].clone())
            .ok_or_else(|| FetchError::NotFound(id.to_owned()))
    }

    async fn describe_health(&self, _id: &str) -> Result<Vec<HealthRecord>, FetchError> {
        self.gate().await?;
        Ok(Vec::new())
    }

    async fn list_attachments(&self, _id: &str) -> Result<Vec<String>, FetchError> {
        self.gate().await?;
        Ok(self.script.attachments.clone())
    }
}

pub struct MockFactory {
    pub script: FetcherScript,
    pub policy: RetryPolicy,
    pub calls: Arc<FetchCalls>,
}

#[allow(dead_code)]
impl MockFactory {
    pub fn new(script: FetcherScript) -> Self {
        Self {
            script,
            policy: fast_policy(),
            calls: Arc::new(FetchCalls::default()),
        }
    }

    pub fn observing(observed: ObservedState) -> Self {
        Self::new(FetcherScript {
            observed: vec![observed],
            ..FetcherScript::default()
        })
    }
}

impl FetcherFactory for MockFactory {
    type Fetcher = RetryingFetcher<MockFetcher>;

    async fn create(
        &self,
        _target: &ProviderTarget,
        _outputs: &OutputSet,
    ) -> Result<Self::Fetcher, FetchError> {
        self.calls.created.fetch_add(1, Ordering::SeqCst);
        let fetcher = MockFetcher {
            script: self.script.clone(),
            remaining_transient: AtomicU32::new(self.script.transient_failures),
            answered: AtomicUsize::new(0),
            calls: Arc::clone(&self.calls),
        };
        Ok(RetryingFetcher::new(fetcher, self.policy.clone()))
    }
}

/// Five attempts, 1ms doubling backoff, no jitter.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(8),
        multiplier: 2.0,
        jitter: false,
        retry_not_found: false,
    }
}
