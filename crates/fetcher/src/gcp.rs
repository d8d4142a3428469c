//! GCP fetcher over the Compute Engine REST API.
//!
//! Resource ids are self-links or project-relative paths
//! (`projects/p/global/backendServices/web`). Health and attachments are read
//! from a backend service's `getHealth` for each of its backend groups.

use infraprobe_core::config::GcpConfig;
use infraprobe_core::error::FetchError;
use infraprobe_core::types::{HealthRecord, ObservedState, ProviderKind};
use serde_json::{Value, json};

use crate::fetcher::StateFetcher;
use crate::http::{client, flatten_into, send_json};
use crate::token::{AccessToken, CliToken};

#[derive(Debug)]
pub struct GcpFetcher {
    client: reqwest::Client,
    token: AccessToken,
    compute_url: String,
}

impl GcpFetcher {
    /// Uses the `gcloud` CLI session for tokens.
    pub fn from_config(config: &GcpConfig) -> Self {
        Self::with_token(config, AccessToken::Cli(CliToken::gcloud()))
    }

    pub fn with_token(config: &GcpConfig, token: AccessToken) -> Self {
        Self {
            client: client(),
            token,
            compute_url: config.compute_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Resolves a self-link or relative path against the configured endpoint.
    fn url(&self, id: &str) -> String {
        let relative = match id.find("/projects/") {
            Some(idx) => &id[idx + 1..],
            None => id.trim_start_matches('/'),
        };
        format!("{}/{relative}", self.compute_url)
    }

    async fn get(&self, id: &str) -> Result<Value, FetchError> {
        let url = self.url(id);
        send_json(self.client.get(&url), &self.token, &url).await
    }

    /// `getHealth` results for every backend group of a backend service.
    async fn backend_health(&self, service_id: &str) -> Result<Vec<HealthRecord>, FetchError> {
        let service = self.get(service_id).await?;
        let groups: Vec<&str> = service
            .get("backends")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|b| b.get("group").and_then(Value::as_str))
            .collect();

        let url = format!("{}/getHealth", self.url(service_id));
        let mut records = Vec::new();
        for group in groups {
            let request = self.client.post(&url).json(&json!({ "group": group }));
            let health = send_json(request, &self.token, &url).await?;
            records.extend(health_records(&health));
        }
        Ok(records)
    }
}

impl StateFetcher for GcpFetcher {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Gcp
    }

    async fn describe_resource(&self, id: &str) -> Result<ObservedState, FetchError> {
        let resource = self.get(id).await?;
        let mut observed = ObservedState::new();
        flatten_into(&mut observed, "", &resource);
        Ok(observed)
    }

    async fn describe_health(&self, id: &str) -> Result<Vec<HealthRecord>, FetchError> {
        self.backend_health(id).await
    }

    async fn list_attachments(&self, id: &str) -> Result<Vec<String>, FetchError> {
        let mut instances: Vec<String> = self
            .backend_health(id)
            .await?
            .into_iter()
            .map(|r| r.target_id)
            .collect();
        instances.sort();
        instances.dedup();
        Ok(instances)
    }
}

fn health_records(response: &Value) -> Vec<HealthRecord> {
    response
        .get("healthStatus")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|status| HealthRecord {
            target_id: status
                .get("instance")
                .or_else(|| status.get("ipAddress"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            port: status
                .get("port")
                .and_then(Value::as_i64)
                .and_then(|p| i32::try_from(p).ok()),
            state: status
                .get("healthState")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN")
                .to_owned(),
            reason: status
                .get("weightError")
                .and_then(Value::as_str)
                .map(str::to_owned),
        })
        .collect()
}
