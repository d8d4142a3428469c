//! Diagnostics for the `infraprobe` binary.
//!
//! Scenario reports own stdout. Every log line (engine invocations, provider
//! retries, teardown) is written to stderr, so `infraprobe run -o json | jq`
//! keeps working at any log level.
//!
//! `RUST_LOG` wins over `--log-level` and `[general] log_level`. The AWS SDK
//! and HTTP client crates are held at `warn` unless `RUST_LOG` says otherwise,
//! because at `debug` they log every request of every retry.

use std::str::FromStr;

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use infraprobe_core::config::GeneralConfig;

/// Dependencies that log per HTTP request.
const NOISY_TARGETS: &[&str] = &["aws_config", "aws_smithy_runtime", "hyper", "reqwest", "rustls"];

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for CI log collectors.
    Json,
    /// Multi-line human output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow!("unknown log format '{other}', expected 'json' or 'pretty'")),
        }
    }
}

/// Filter directives for `level` with the noisy dependencies capped.
fn default_directives(level: &str) -> String {
    let mut directives = level.to_owned();
    for target in NOISY_TARGETS {
        directives.push_str(&format!(",{target}=warn"));
    }
    directives
}

/// Installs the global subscriber. Call once, after the config is loaded.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(&config.log_level)))
        .map_err(|e| anyhow!("invalid log level '{}': {e}", config.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install {format:?} log subscriber: {e}"))
}
