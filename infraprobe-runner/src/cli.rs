//! CLI argument parsing using clap derive API
//!
//! Purely declarative, no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// infraprobe -- provision, verify and tear down cloud infrastructure modules.
///
/// Use `infraprobe <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "infraprobe", version, about, long_about = None)]
pub struct Cli {
    /// Path to the infraprobe.toml configuration file.
    ///
    /// Defaults to ./infraprobe.toml when present, built-in defaults otherwise.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenarios: apply, check, destroy.
    Run(RunArgs),

    /// List scenarios and their checks.
    List(FileArgs),

    /// Parse and validate a scenario file without provisioning anything.
    Validate(FileArgs),
}

/// Run the scenarios of a scenario file.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario file.
    pub file: PathBuf,

    /// Only run scenarios whose name contains this string.
    #[arg(long)]
    pub filter: Option<String>,

    /// Maximum scenarios running at once (overrides runner.max_parallel).
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub parallel: Option<u16>,
}

#[derive(Args, Debug)]
pub struct FileArgs {
    /// Scenario file.
    pub file: PathBuf,
}
