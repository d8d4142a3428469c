//! Command handlers -- one module per subcommand

pub mod list;
pub mod run;
pub mod validate;

use std::path::{Path, PathBuf};

use infraprobe_core::config::ProbeConfig;

use crate::cli::Cli;
use crate::error::CliError;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "infraprobe.toml";

/// Loads the effective configuration: file (or defaults), environment
/// overrides, then command-line overrides.
pub async fn load_config(cli: &Cli) -> Result<ProbeConfig, CliError> {
    let path = cli.config.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });

    let mut config = match path.as_deref() {
        Some(path) => ProbeConfig::load(path).await?,
        None => {
            let mut config = ProbeConfig::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Some(level) = &cli.log_level {
        config.general.log_level.clone_from(level);
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format.clone_from(format);
    }
    config.validate()?;
    Ok(config)
}

pub(crate) fn display(path: &Path) -> String {
    path.display().to_string()
}
