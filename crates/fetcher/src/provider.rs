//! Provider selection.
//!
//! [`ProviderFetcher`] is the closed set of production fetchers, picked from a
//! scenario's [`ProviderTarget`]. [`CloudFetcherFactory`] builds one per
//! scenario and wraps it in a [`RetryingFetcher`].

use infraprobe_core::config::{AwsConfig, AzureConfig, GcpConfig, ProbeConfig};
use infraprobe_core::error::FetchError;
use infraprobe_core::types::{HealthRecord, ObservedState, OutputSet, ProviderKind};
use tracing::info;

use crate::aws::AwsFetcher;
use crate::azure::AzureFetcher;
use crate::fetcher::{FetcherFactory, ProviderTarget, StateFetcher};
use crate::gcp::GcpFetcher;
use crate::retry::{RetryPolicy, RetryingFetcher};

/// One of the supported provider fetchers.
#[derive(Debug)]
pub enum ProviderFetcher {
    Aws(AwsFetcher),
    Azure(AzureFetcher),
    Gcp(GcpFetcher),
}

impl StateFetcher for ProviderFetcher {
    fn provider(&self) -> ProviderKind {
        match self {
            Self::Aws(f) => f.provider(),
            Self::Azure(f) => f.provider(),
            Self::Gcp(f) => f.provider(),
        }
    }

    async fn describe_resource(&self, id: &str) -> Result<ObservedState, FetchError> {
        match self {
            Self::Aws(f) => f.describe_resource(id).await,
            Self::Azure(f) => f.describe_resource(id).await,
            Self::Gcp(f) => f.describe_resource(id).await,
        }
    }

    async fn describe_health(&self, id: &str) -> Result<Vec<HealthRecord>, FetchError> {
        match self {
            Self::Aws(f) => f.describe_health(id).await,
            Self::Azure(f) => f.describe_health(id).await,
            Self::Gcp(f) => f.describe_health(id).await,
        }
    }

    async fn list_attachments(&self, id: &str) -> Result<Vec<String>, FetchError> {
        match self {
            Self::Aws(f) => f.list_attachments(id).await,
            Self::Azure(f) => f.list_attachments(id).await,
            Self::Gcp(f) => f.list_attachments(id).await,
        }
    }
}

/// Builds real provider clients from configuration.
#[derive(Debug, Clone)]
pub struct CloudFetcherFactory {
    retry: RetryPolicy,
    aws: AwsConfig,
    azure: AzureConfig,
    gcp: GcpConfig,
}

impl CloudFetcherFactory {
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self {
            retry: RetryPolicy::from_config(&config.retry),
            aws: config.aws.clone(),
            azure: config.azure.clone(),
            gcp: config.gcp.clone(),
        }
    }
}

impl FetcherFactory for CloudFetcherFactory {
    type Fetcher = RetryingFetcher<ProviderFetcher>;

    async fn create(
        &self,
        target: &ProviderTarget,
        outputs: &OutputSet,
    ) -> Result<Self::Fetcher, FetchError> {
        let fetcher = match target.kind {
            ProviderKind::Aws => {
                let region = target.resolve_region(outputs, &self.aws.region)?;
                ProviderFetcher::Aws(AwsFetcher::connect(region.as_deref()).await)
            }
            ProviderKind::Azure => ProviderFetcher::Azure(AzureFetcher::from_config(&self.azure)),
            ProviderKind::Gcp => ProviderFetcher::Gcp(GcpFetcher::from_config(&self.gcp)),
        };
        info!(provider = %target.kind, "provider fetcher ready");
        Ok(RetryingFetcher::new(fetcher, self.retry.clone()))
    }
}
