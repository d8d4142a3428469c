//! Bearer tokens for the REST-based fetchers.
//!
//! Credentials are never managed by infraprobe: tokens come from the
//! provider's own CLI session (`az`, `gcloud`) or are passed in directly.

use infraprobe_core::error::FetchError;
use tokio::process::Command;
use tokio::sync::Mutex;

/// Where a fetcher's bearer token comes from.
#[derive(Debug)]
pub enum AccessToken {
    /// Fixed token, mainly for tests.
    Static(String),
    /// Token printed by a provider CLI, fetched once and cached.
    Cli(CliToken),
}

impl AccessToken {
    pub async fn get(&self) -> Result<String, FetchError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Cli(cli) => cli.get().await,
        }
    }
}

/// A token obtained by running a provider CLI.
#[derive(Debug)]
pub struct CliToken {
    program: &'static str,
    args: &'static [&'static str],
    /// JSON field holding the token; `None` means stdout is the raw token.
    json_field: Option<&'static str>,
    cached: Mutex<Option<String>>,
}

impl CliToken {
    /// `az account get-access-token` for Azure Resource Manager.
    pub fn azure() -> Self {
        Self {
            program: "az",
            args: &[
                "account",
                "get-access-token",
                "--resource",
                "https://management.azure.com",
                "--output",
                "json",
            ],
            json_field: Some("accessToken"),
            cached: Mutex::new(None),
        }
    }

    /// `gcloud auth print-access-token`.
    pub fn gcloud() -> Self {
        Self {
            program: "gcloud",
            args: &["auth", "print-access-token"],
            json_field: None,
            cached: Mutex::new(None),
        }
    }

    async fn get(&self) -> Result<String, FetchError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let output = Command::new(self.program)
            .args(self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FetchError::Permanent(format!("{} CLI not available: {e}", self.program)))?;

        if !output.status.success() {
            return Err(FetchError::Permanent(format!(
                "{} token request failed: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let token = parse_token(&output.stdout, self.json_field)
            .ok_or_else(|| FetchError::Permanent(format!("{} printed no token", self.program)))?;
        *cached = Some(token.clone());
        Ok(token)
    }
}

fn parse_token(stdout: &[u8], json_field: Option<&str>) -> Option<String> {
    let token = match json_field {
        Some(field) => serde_json::from_slice::<serde_json::Value>(stdout)
            .ok()?
            .get(field)?
            .as_str()?
            .to_owned(),
        None => String::from_utf8_lossy(stdout).trim().to_owned(),
    };
    (!token.is_empty()).then_some(token)
}
