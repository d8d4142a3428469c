//! Scenario files.
//!
//! ```toml
//! [[scenario]]
//! name = "alb-health-check"
//! module = "modules/alb"
//! provider = { kind = "aws", region_output = "region" }
//! vars = { app_port = 8080 }
//! var_files = ["env/dev.tfvars"]
//!
//! [[scenario.check]]
//! kind = "health_check"
//! resource_output = "target_group_arn"
//! expected_output = "health_check"
//! ```
//!
//! Relative `module` and `var_files` paths are resolved against the
//! directory holding the scenario file.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use infraprobe_core::error::{ConfigError, ProbeError};
use infraprobe_core::types::{Environment, Params};
use infraprobe_fetcher::ProviderTarget;
use serde::{Deserialize, Serialize};

use crate::checks::Check;

/// What a scenario does with its module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Plan only. Nothing is created, so there is nothing to check or destroy.
    Plan,
    /// Apply, run checks, destroy.
    #[default]
    Apply,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plan => f.write_str("plan"),
            Self::Apply => f.write_str("apply"),
        }
    }
}

/// One provision-verify-teardown definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    pub module: PathBuf,
    #[serde(default)]
    pub mode: Mode,
    pub provider: ProviderTarget,
    #[serde(default)]
    pub vars: Params,
    #[serde(default)]
    pub var_files: Vec<PathBuf>,
    #[serde(default, rename = "check")]
    pub checks: Vec<Check>,
}

impl Scenario {
    /// A fresh environment for one run of this scenario.
    ///
    /// Every call yields a new environment id.
    pub fn environment(&self) -> Environment {
        Environment::new(&self.module, self.provider.kind)
            .with_params(self.vars.clone())
            .with_var_files(self.var_files.clone())
    }

    /// True if any check queries the provider.
    pub fn needs_provider(&self) -> bool {
        self.checks.iter().any(Check::needs_provider)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.module.is_relative() {
            self.module = base.join(&self.module);
        }
        for file in &mut self.var_files {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
    }
}

/// A parsed scenario file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    #[serde(default, rename = "scenario")]
    pub scenarios: Vec<Scenario>,
}

impl ScenarioFile {
    /// Reads, parses and validates a scenario file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ProbeError> {
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

        let mut file = Self::parse(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for scenario in &mut file.scenarios {
            scenario.resolve_paths(base);
        }
        file.validate()?;
        Ok(file)
    }

    /// Parses TOML without validating.
    pub fn parse(toml_str: &str) -> Result<Self, ProbeError> {
        toml::from_str(toml_str).map_err(|e| {
            ProbeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.scenarios.is_empty() {
            return Err(invalid("scenario", "file defines no scenarios".to_owned()));
        }

        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            let name = scenario.name.trim();
            if name.is_empty() {
                return Err(invalid("scenario.name", "must not be empty".to_owned()));
            }
            if !seen.insert(name) {
                return Err(invalid("scenario.name", format!("duplicate scenario '{name}'")));
            }
            if scenario.mode == Mode::Plan && !scenario.checks.is_empty() {
                return Err(invalid(
                    &format!("scenario.{name}.check"),
                    "plan-only scenarios cannot have checks".to_owned(),
                ));
            }
            for (idx, check) in scenario.checks.iter().enumerate() {
                check
                    .validate()
                    .map_err(|reason| invalid(&format!("scenario.{name}.check[{idx}]"), reason))?;
            }
        }
        Ok(())
    }

    /// Keeps scenarios whose name contains `pattern`.
    pub fn filter(mut self, pattern: Option<&str>) -> Self {
        if let Some(pattern) = pattern {
            self.scenarios.retain(|s| s.name.contains(pattern));
        }
        self
    }
}

fn invalid(field: &str, reason: String) -> ProbeError {
    ProbeError::Config(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    })
}
