//! Provider state fetcher contract.
//!
//! A [`StateFetcher`] answers read-only questions about one live resource.
//! Each scenario gets its own fetcher from a [`FetcherFactory`], so rate-limit
//! and token state is never shared between concurrent scenarios.

use std::future::Future;

use infraprobe_core::error::FetchError;
use infraprobe_core::resolve::resolve_string;
use infraprobe_core::types::{HealthRecord, ObservedState, OutputSet, ProviderKind};
use serde::{Deserialize, Serialize};

/// Read-only queries against a cloud provider's control plane.
pub trait StateFetcher: Send + Sync {
    /// Provider this fetcher talks to.
    fn provider(&self) -> ProviderKind;

    /// Current configuration of resource `id` as flat attributes.
    fn describe_resource(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ObservedState, FetchError>> + Send;

    /// Health of the targets behind resource `id`. May be empty.
    fn describe_health(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Vec<HealthRecord>, FetchError>> + Send;

    /// Identifiers of the targets attached to resource `id`.
    fn list_attachments(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Vec<String>, FetchError>> + Send;
}

/// Which provider a scenario talks to, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderTarget {
    pub kind: ProviderKind,
    /// Fixed region.
    #[serde(default)]
    pub region: Option<String>,
    /// Output holding the region; wins over `region`.
    #[serde(default)]
    pub region_output: Option<String>,
}

impl ProviderTarget {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            region: None,
            region_output: None,
        }
    }

    /// Region for this target: `region_output`, then `region`, then `fallback`.
    ///
    /// Returns `None` when none of them yields a non-empty value.
    pub fn resolve_region(
        &self,
        outputs: &OutputSet,
        fallback: &str,
    ) -> Result<Option<String>, FetchError> {
        if let Some(name) = &self.region_output {
            let region = resolve_string(outputs, name)
                .map_err(|e| FetchError::Permanent(format!("region output: {e}")))?;
            return Ok(Some(region));
        }
        let region = self
            .region
            .as_deref()
            .filter(|r| !r.is_empty())
            .or(Some(fallback).filter(|r| !r.is_empty()));
        Ok(region.map(str::to_owned))
    }
}

/// Builds one fetcher per scenario.
pub trait FetcherFactory: Send + Sync + 'static {
    type Fetcher: StateFetcher + 'static;

    /// Creates a fetcher for `target`, using `outputs` of the applied
    /// environment for anything the target defers to module outputs.
    fn create(
        &self,
        target: &ProviderTarget,
        outputs: &OutputSet,
    ) -> impl Future<Output = Result<Self::Fetcher, FetchError>> + Send;
}
