//! AWS fetcher: Elastic Load Balancing v2 target groups.
//!
//! | query               | API call               |
//! |---------------------|------------------------|
//! | `describe_resource` | `DescribeTargetGroups` |
//! | `describe_health`   | `DescribeTargetHealth` |
//! | `list_attachments`  | `DescribeTargetHealth` |
//!
//! Resource ids are target group ARNs.

use aws_config::BehaviorVersion;
use aws_sdk_elasticloadbalancingv2::Client;
use aws_sdk_elasticloadbalancingv2::config::Region;
use aws_sdk_elasticloadbalancingv2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_elasticloadbalancingv2::types::{TargetGroup, TargetHealthDescription};
use infraprobe_core::error::FetchError;
use infraprobe_core::types::{HealthRecord, ObservedState, ProviderKind};
use tracing::debug;

use crate::fetcher::StateFetcher;

const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "ServiceUnavailable",
    "InternalFailure",
    "RequestTimeout",
];

const NOT_FOUND_CODES: &[&str] = &["TargetGroupNotFound", "TargetGroupNotFoundException"];

/// Target group queries in one region.
#[derive(Debug, Clone)]
pub struct AwsFetcher {
    client: Client,
}

impl AwsFetcher {
    /// Builds a client from the default credential chain.
    ///
    /// Without an explicit region the SDK's own region chain applies.
    pub async fn connect(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_owned()));
        }
        let sdk_config = loader.load().await;
        debug!(region = ?sdk_config.region(), "aws client configured");
        Self {
            client: Client::new(&sdk_config),
        }
    }

    async fn target_health(&self, arn: &str) -> Result<Vec<TargetHealthDescription>, FetchError> {
        let response = self
            .client
            .describe_target_health()
            .target_group_arn(arn)
            .send()
            .await
            .map_err(classify_sdk_error)?;
        Ok(response.target_health_descriptions().to_vec())
    }
}

impl StateFetcher for AwsFetcher {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Aws
    }

    async fn describe_resource(&self, arn: &str) -> Result<ObservedState, FetchError> {
        let response = self
            .client
            .describe_target_groups()
            .target_group_arns(arn)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        response
            .target_groups()
            .first()
            .map(target_group_state)
            .ok_or_else(|| FetchError::NotFound(arn.to_owned()))
    }

    async fn describe_health(&self, arn: &str) -> Result<Vec<HealthRecord>, FetchError> {
        Ok(self.target_health(arn).await?.iter().map(health_record).collect())
    }

    async fn list_attachments(&self, arn: &str) -> Result<Vec<String>, FetchError> {
        Ok(self
            .target_health(arn)
            .await?
            .iter()
            .filter_map(|d| d.target().and_then(|t| t.id()).map(str::to_owned))
            .collect())
    }
}

/// Health-check and placement attributes of a target group.
pub(crate) fn target_group_state(tg: &TargetGroup) -> ObservedState {
    let mut observed = ObservedState::new();
    let strings = [
        ("path", tg.health_check_path()),
        ("protocol", tg.health_check_protocol().map(|p| p.as_str())),
        ("matcher", tg.matcher().and_then(|m| m.http_code())),
        ("target_type", tg.target_type().map(|t| t.as_str())),
        ("vpc_id", tg.vpc_id()),
        ("name", tg.target_group_name()),
    ];
    for (name, value) in strings {
        if let Some(value) = value {
            observed.insert(name, value);
        }
    }

    let integers = [
        ("interval", tg.health_check_interval_seconds()),
        ("timeout", tg.health_check_timeout_seconds()),
        ("healthy_threshold", tg.healthy_threshold_count()),
        ("unhealthy_threshold", tg.unhealthy_threshold_count()),
        ("port", tg.port()),
    ];
    for (name, value) in integers {
        if let Some(value) = value {
            observed.insert(name, value);
        }
    }

    if let Some(enabled) = tg.health_check_enabled() {
        observed.insert("enabled", enabled);
    }
    observed
}

pub(crate) fn health_record(description: &TargetHealthDescription) -> HealthRecord {
    let target = description.target();
    let health = description.target_health();
    HealthRecord {
        target_id: target.and_then(|t| t.id()).unwrap_or_default().to_owned(),
        port: target.and_then(|t| t.port()),
        state: health
            .and_then(|h| h.state())
            .map(|s| s.as_str().to_owned())
            .unwrap_or_else(|| "unknown".to_owned()),
        reason: health.and_then(|h| h.reason()).map(|r| r.as_str().to_owned()),
    }
}

/// Maps an AWS error code to a fetch error kind.
pub(crate) fn classify_code(code: Option<&str>, message: String) -> FetchError {
    match code {
        Some(c) if TRANSIENT_CODES.contains(&c) => FetchError::Transient(message),
        Some(c) if NOT_FOUND_CODES.contains(&c) => FetchError::NotFound(message),
        _ => FetchError::Permanent(message),
    }
}

fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> FetchError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            FetchError::Transient(message)
        }
        SdkError::ServiceError(service) => classify_code(service.err().code(), message),
        _ => FetchError::Permanent(message),
    }
}
