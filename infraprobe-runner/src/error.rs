//! CLI error type and exit code mapping

use infraprobe_core::error::ProbeError;

/// CLI error type.
///
/// `exit_code()` maps each variant to the process exit status.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration or scenario file failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// At least one scenario did not pass.
    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed { failed: usize, total: usize },

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from infraprobe-core.
    #[error("{0}")]
    Core(#[from] ProbeError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success                          |
    /// | 1    | Scenario failure / command error |
    /// | 2    | Configuration error              |
    /// | 10   | IO error                         |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Core(ProbeError::Config(_)) => 2,
            Self::Io(_) | Self::Core(ProbeError::Io(_)) => 10,
            Self::Command(_) | Self::ScenariosFailed { .. } | Self::JsonSerialize(_) | Self::Core(_) => 1,
        }
    }
}
