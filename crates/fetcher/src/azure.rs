//! Azure fetcher over the Resource Manager REST API.
//!
//! Resource ids are full ARM ids
//! (`/subscriptions/.../providers/Microsoft.Network/loadBalancers/lb/probes/p`).
//! `describe_resource` flattens the resource's `properties` into attributes,
//! alongside top-level `name`, `type` and `location`.

use infraprobe_core::config::AzureConfig;
use infraprobe_core::error::FetchError;
use infraprobe_core::types::{HealthRecord, ObservedState, ProviderKind};
use serde_json::Value;

use crate::fetcher::StateFetcher;
use crate::http::{client, flatten_into, send_json};
use crate::token::{AccessToken, CliToken};

const RESOURCE_HEALTH_API_VERSION: &str = "2015-01-01";

#[derive(Debug)]
pub struct AzureFetcher {
    client: reqwest::Client,
    token: AccessToken,
    management_url: String,
    api_version: String,
}

impl AzureFetcher {
    /// Uses the `az` CLI session for tokens.
    pub fn from_config(config: &AzureConfig) -> Self {
        Self::with_token(config, AccessToken::Cli(CliToken::azure()))
    }

    pub fn with_token(config: &AzureConfig, token: AccessToken) -> Self {
        Self {
            client: client(),
            token,
            management_url: config.management_url.trim_end_matches('/').to_owned(),
            api_version: config.api_version.clone(),
        }
    }

    fn url(&self, id: &str, suffix: &str) -> String {
        format!(
            "{}/{}{suffix}",
            self.management_url,
            id.trim_start_matches('/')
        )
    }

    async fn get(&self, id: &str, suffix: &str, api_version: &str) -> Result<Value, FetchError> {
        let url = self.url(id, suffix);
        let request = self
            .client
            .get(&url)
            .query(&[("api-version", api_version)]);
        send_json(request, &self.token, &url).await
    }
}

impl StateFetcher for AzureFetcher {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Azure
    }

    async fn describe_resource(&self, id: &str) -> Result<ObservedState, FetchError> {
        let resource = self.get(id, "", &self.api_version).await?;
        Ok(resource_state(&resource))
    }

    async fn describe_health(&self, id: &str) -> Result<Vec<HealthRecord>, FetchError> {
        let status = self
            .get(
                id,
                "/providers/Microsoft.ResourceHealth/availabilityStatuses/current",
                RESOURCE_HEALTH_API_VERSION,
            )
            .await?;
        Ok(availability_record(id, &status).into_iter().collect())
    }

    async fn list_attachments(&self, id: &str) -> Result<Vec<String>, FetchError> {
        let resource = self.get(id, "", &self.api_version).await?;
        Ok(backend_members(&resource))
    }
}

fn resource_state(resource: &Value) -> ObservedState {
    let mut observed = ObservedState::new();
    for key in ["name", "type", "location"] {
        if let Some(value) = resource.get(key).and_then(Value::as_str) {
            observed.insert(key, value);
        }
    }
    if let Some(properties) = resource.get("properties") {
        flatten_into(&mut observed, "", properties);
    }
    observed
}

fn availability_record(id: &str, status: &Value) -> Option<HealthRecord> {
    let properties = status.get("properties")?;
    let state = properties.get("availabilityState")?.as_str()?;
    Some(HealthRecord {
        target_id: id.to_owned(),
        port: None,
        state: state.to_owned(),
        reason: properties
            .get("reasonType")
            .or_else(|| properties.get("summary"))
            .and_then(Value::as_str)
            .map(str::to_owned),
    })
}

/// Members of a backend address pool: NIC IP configurations and
/// address-based backends.
fn backend_members(pool: &Value) -> Vec<String> {
    let Some(properties) = pool.get("properties") else {
        return Vec::new();
    };

    let ip_configs = properties
        .get("backendIPConfigurations")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|c| c.get("id").and_then(Value::as_str));

    let addresses = properties
        .get("loadBalancerBackendAddresses")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|a| {
            a.pointer("/properties/ipAddress")
                .or_else(|| a.get("name"))
                .and_then(Value::as_str)
        });

    let mut members: Vec<String> = ip_configs.chain(addresses).map(str::to_owned).collect();
    members.sort();
    members.dedup();
    members
}
