//! Error types, one enum per failure domain.
//!
//! A mismatch between expected and observed state is not an error here. It is
//! carried as a [`MismatchReport`](crate::types::MismatchReport) value inside
//! the scenario result.

use std::fmt;

use serde::Serialize;

use crate::types::{EnvironmentState, OutputKind};

/// Top-level infraprobe error.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Configuration error
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Provisioning engine error
    #[error("provision error: {0}")]
    Provision(#[from] ProvisionError),

    /// Output resolution error
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Provider query error
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config could not be parsed
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// Invalid config value
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// A provisioning engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOperation {
    Init,
    Plan,
    Apply,
    Destroy,
    Output,
}

impl fmt::Display for ProvisionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
            Self::Output => "output",
        };
        f.write_str(name)
    }
}

/// Classified reason for a provisioning failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionCause {
    /// Credentials missing, expired or lacking permission
    Auth,
    /// Provider quota or service limit exceeded
    Quota,
    /// Resource already exists or state is locked by another run
    Conflict,
    /// Operation exceeded its deadline
    Timeout,
    /// Apply failed after some resources were already created
    PartialApply,
    /// Anything the classifier does not recognise
    Other,
}

impl fmt::Display for ProvisionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auth => "auth",
            Self::Quota => "quota",
            Self::Conflict => "conflict",
            Self::Timeout => "timeout",
            Self::PartialApply => "partial_apply",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Provisioning errors (plan/apply/destroy).
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The engine ran and reported failure
    #[error("{operation} failed ({cause}): {message}")]
    Failed {
        /// Operation that failed
        operation: ProvisionOperation,
        /// Classified cause
        cause: ProvisionCause,
        /// Engine diagnostics, trimmed
        message: String,
    },

    /// The environment's lifecycle state does not permit the operation
    #[error("{operation} not permitted in state '{state}'")]
    InvalidState {
        operation: ProvisionOperation,
        state: EnvironmentState,
    },

    /// The engine process could not be started or its output read
    #[error("failed to run engine for {operation}: {reason}")]
    Launch {
        operation: ProvisionOperation,
        reason: String,
    },
}

impl ProvisionError {
    /// Returns the classified cause, if the engine actually ran.
    pub fn cause(&self) -> Option<ProvisionCause> {
        match self {
            Self::Failed { cause, .. } => Some(*cause),
            Self::InvalidState { .. } | Self::Launch { .. } => None,
        }
    }
}

/// Integer parse failure during output resolution.
#[derive(Debug, Clone, thiserror::Error)]
#[error("output '{name}': cannot parse {input:?} as integer: {reason}")]
pub struct ParseError {
    /// Output (or map member) name
    pub name: String,
    /// Offending input
    pub input: String,
    /// Parser message
    pub reason: String,
}

/// Output lookup and typing errors.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// No output with this name
    #[error("output not found: {0}")]
    NotFound(String),

    /// Output exists but has the wrong shape for the requested kind
    #[error("output '{name}' is not a {expected}: found {found}")]
    Type {
        name: String,
        expected: OutputKind,
        found: String,
    },

    /// Integer parsing failed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Outputs are only available after a successful apply
    #[error("outputs unavailable in state '{state}'")]
    NotApplied { state: EnvironmentState },
}

/// Provider query errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Rate limiting, server error, timeout; safe to retry
    #[error("transient provider error: {0}")]
    Transient(String),

    /// The resource is not (yet) visible
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Auth failure, malformed request, unexpected payload; never retried
    #[error("provider error: {0}")]
    Permanent(String),
}

impl FetchError {
    /// Returns true for errors that are always retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns true when the provider reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
