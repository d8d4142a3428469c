//! Shared plumbing for the REST fetchers (Azure, GCP).

use infraprobe_core::error::FetchError;
use infraprobe_core::types::{AttributeValue, ObservedState};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::token::AccessToken;

/// Request timeout for a single provider call.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Builds the per-fetcher HTTP client.
pub(crate) fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Maps an error status to a [`FetchError`].
///
/// 429 and 5xx are transient, 404 is not-found, everything else is permanent.
pub(crate) fn status_error(status: StatusCode, url: &str, body: &str) -> FetchError {
    let detail = format!("{url}: HTTP {}: {}", status.as_u16(), truncate(body, 300));
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchError::Transient(detail)
    } else if status == StatusCode::NOT_FOUND {
        FetchError::NotFound(detail)
    } else {
        FetchError::Permanent(detail)
    }
}

fn transport_error(url: &str, e: &reqwest::Error) -> FetchError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        FetchError::Transient(format!("{url}: {e}"))
    } else {
        FetchError::Permanent(format!("{url}: {e}"))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Sends `request` with a bearer token and decodes a JSON body.
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
    token: &AccessToken,
    url: &str,
) -> Result<Value, FetchError> {
    let bearer = token.get().await?;
    debug!(url, "provider request");

    let response = request
        .bearer_auth(bearer)
        .send()
        .await
        .map_err(|e| transport_error(url, &e))?;

    let status = response.status();
    let body = response.text().await.map_err(|e| transport_error(url, &e))?;
    if !status.is_success() {
        return Err(status_error(status, url, &body));
    }

    serde_json::from_str(&body)
        .map_err(|e| FetchError::Permanent(format!("{url}: invalid JSON response: {e}")))
}

/// Flattens scalars of a JSON object into `observed`.
///
/// Nested objects become dotted keys (`backend.port`). Arrays and nulls are
/// skipped.
pub(crate) fn flatten_into(observed: &mut ObservedState, prefix: &str, value: &Value) {
    let Value::Object(members) = value else {
        return;
    };
    for (key, member) in members {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match member {
            Value::Object(_) => flatten_into(observed, &name, member),
            other => {
                if let Some(attr) = AttributeValue::from_json(other) {
                    observed.insert(name, attr);
                }
            }
        }
    }
}
