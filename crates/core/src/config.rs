//! Configuration: `infraprobe.toml` parsing and runtime settings.
//!
//! [`ProbeConfig`] is the top-level structure. Each component reads only its
//! own section.
//!
//! # Load order
//! 1. CLI arguments (highest)
//! 2. Environment variables (`INFRAPROBE_RETRY_MAX_ATTEMPTS=3`)
//! 3. Config file (`infraprobe.toml`)
//! 4. `Default` implementations
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), infraprobe_core::error::ProbeError> {
//! use infraprobe_core::config::ProbeConfig;
//!
//! let config = ProbeConfig::load("infraprobe.toml").await?;
//! let config = ProbeConfig::parse("[retry]\nmax_attempts = 3")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ProbeError};

const MAX_RETRY_ATTEMPTS: u32 = 20;
const MAX_PARALLEL: usize = 64;
const MAX_DELAY_MS: u64 = 300_000;
/// Upper bound for every `*_secs` setting (seven days).
const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// infraprobe configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub settle: SettleConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub gcp: GcpConfig,
}

impl ProbeConfig {
    /// Loads the file, applies environment overrides and validates.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ProbeError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads the file without environment overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ProbeError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProbeError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ProbeError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, ProbeError> {
        toml::from_str(toml_str).map_err(|e| {
            ProbeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Overrides values from `INFRAPROBE_{SECTION}_{FIELD}` variables.
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "INFRAPROBE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "INFRAPROBE_GENERAL_LOG_FORMAT");

        override_string(&mut self.engine.binary, "INFRAPROBE_ENGINE_BINARY");
        override_string(&mut self.engine.state_dir, "INFRAPROBE_ENGINE_STATE_DIR");
        override_bool(&mut self.engine.init, "INFRAPROBE_ENGINE_INIT");
        override_u64(
            &mut self.engine.apply_timeout_secs,
            "INFRAPROBE_ENGINE_APPLY_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.engine.destroy_timeout_secs,
            "INFRAPROBE_ENGINE_DESTROY_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.engine.interrupt_grace_secs,
            "INFRAPROBE_ENGINE_INTERRUPT_GRACE_SECS",
        );

        override_u32(&mut self.retry.max_attempts, "INFRAPROBE_RETRY_MAX_ATTEMPTS");
        override_u64(&mut self.retry.base_delay_ms, "INFRAPROBE_RETRY_BASE_DELAY_MS");
        override_u64(&mut self.retry.max_delay_ms, "INFRAPROBE_RETRY_MAX_DELAY_MS");
        override_bool(&mut self.retry.jitter, "INFRAPROBE_RETRY_JITTER");

        override_u64(&mut self.settle.delay_secs, "INFRAPROBE_SETTLE_DELAY_SECS");
        override_u64(
            &mut self.settle.convergence_timeout_secs,
            "INFRAPROBE_SETTLE_CONVERGENCE_TIMEOUT_SECS",
        );

        override_usize(&mut self.runner.max_parallel, "INFRAPROBE_RUNNER_MAX_PARALLEL");
        override_u64(
            &mut self.runner.scenario_timeout_secs,
            "INFRAPROBE_RUNNER_SCENARIO_TIMEOUT_SECS",
        );

        override_string(&mut self.aws.region, "INFRAPROBE_AWS_REGION");
    }

    /// Validates value ranges.
    pub fn validate(&self) -> Result<(), ProbeError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.engine.binary.is_empty() {
            return Err(invalid("engine.binary", "must not be empty".to_owned()));
        }

        for (field, secs) in [
            ("engine.plan_timeout_secs", self.engine.plan_timeout_secs),
            ("engine.apply_timeout_secs", self.engine.apply_timeout_secs),
            ("engine.destroy_timeout_secs", self.engine.destroy_timeout_secs),
        ] {
            if secs == 0 {
                return Err(invalid(field, "must be greater than 0".to_owned()));
            }
        }

        for (field, secs) in [
            ("engine.plan_timeout_secs", self.engine.plan_timeout_secs),
            ("engine.apply_timeout_secs", self.engine.apply_timeout_secs),
            ("engine.destroy_timeout_secs", self.engine.destroy_timeout_secs),
            ("engine.interrupt_grace_secs", self.engine.interrupt_grace_secs),
            ("settle.delay_secs", self.settle.delay_secs),
            ("settle.convergence_timeout_secs", self.settle.convergence_timeout_secs),
            ("settle.poll_interval_secs", self.settle.poll_interval_secs),
            ("runner.scenario_timeout_secs", self.runner.scenario_timeout_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(invalid(field, format!("must not exceed {MAX_DURATION_SECS}")));
            }
        }

        if self.retry.max_attempts == 0 || self.retry.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(invalid(
                "retry.max_attempts",
                format!("must be 1-{MAX_RETRY_ATTEMPTS}"),
            ));
        }

        if self.retry.max_delay_ms > MAX_DELAY_MS {
            return Err(invalid(
                "retry.max_delay_ms",
                format!("must be 0-{MAX_DELAY_MS}"),
            ));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(invalid(
                "retry.base_delay_ms",
                "must not exceed retry.max_delay_ms".to_owned(),
            ));
        }

        if !(self.retry.multiplier >= 1.0 && self.retry.multiplier.is_finite()) {
            return Err(invalid("retry.multiplier", "must be >= 1.0".to_owned()));
        }

        if self.settle.poll_interval_secs == 0 {
            return Err(invalid(
                "settle.poll_interval_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.runner.max_parallel == 0 || self.runner.max_parallel > MAX_PARALLEL {
            return Err(invalid(
                "runner.max_parallel",
                format!("must be 1-{MAX_PARALLEL}"),
            ));
        }

        if self.runner.scenario_timeout_secs == 0 {
            return Err(invalid(
                "runner.scenario_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> ProbeError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// trace, debug, info, warn, error
    pub log_level: String,
    /// json, pretty
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// Provisioning engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable
    pub binary: String,
    /// Directory holding per-environment state; empty means the system temp dir
    pub state_dir: String,
    /// Run `init` before the first operation
    pub init: bool,
    pub plan_timeout_secs: u64,
    pub apply_timeout_secs: u64,
    pub destroy_timeout_secs: u64,
    /// After interrupting an engine process, wait this long before killing it
    pub interrupt_grace_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: "terraform".to_owned(),
            state_dir: String::new(),
            init: true,
            plan_timeout_secs: 600,
            apply_timeout_secs: 1800,
            destroy_timeout_secs: 1800,
            interrupt_grace_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Root under which each environment gets its own state directory.
    pub fn state_root(&self) -> PathBuf {
        if self.state_dir.is_empty() {
            std::env::temp_dir().join("infraprobe")
        } else {
            PathBuf::from(&self.state_dir)
        }
    }

    pub fn plan_timeout(&self) -> Duration {
        Duration::from_secs(self.plan_timeout_secs)
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }

    pub fn destroy_timeout(&self) -> Duration {
        Duration::from_secs(self.destroy_timeout_secs)
    }

    pub fn interrupt_grace(&self) -> Duration {
        Duration::from_secs(self.interrupt_grace_secs)
    }
}

/// Provider query retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Randomize each delay between 0.5x and 1.5x
    pub jitter: bool,
    /// Treat not-found as transient (resource not yet visible)
    pub retry_not_found: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 16_000,
            multiplier: 2.0,
            jitter: true,
            retry_not_found: true,
        }
    }
}

/// Eventual-consistency settings for freshly applied resources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Wait before the first query after apply
    pub delay_secs: u64,
    /// Keep re-checking a mismatching resource for this long; 0 disables
    pub convergence_timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            delay_secs: 5,
            convergence_timeout_secs: 60,
            poll_interval_secs: 5,
        }
    }
}

impl SettleConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn convergence_timeout(&self) -> Duration {
        Duration::from_secs(self.convergence_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Scenario scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub max_parallel: usize,
    /// Budget for apply and assertions; teardown runs after it regardless
    pub scenario_timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            scenario_timeout_secs: 3600,
        }
    }
}

impl RunnerConfig {
    pub fn scenario_timeout(&self) -> Duration {
        Duration::from_secs(self.scenario_timeout_secs)
    }
}

/// AWS settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Fallback region when a scenario names none; empty means the SDK default chain
    pub region: String,
}

/// Azure Resource Manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    pub management_url: String,
    pub api_version: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            management_url: "https://management.azure.com".to_owned(),
            api_version: "2023-09-01".to_owned(),
        }
    }
}

/// Google Compute Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    pub compute_url: String,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            compute_url: "https://compute.googleapis.com/compute/v1".to_owned(),
        }
    }
}

// --- environment override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
