//! Shared building blocks for infraprobe.
//!
//! - [`error`]: error taxonomy (`ProvisionError`, `OutputError`, `FetchError`, `ConfigError`)
//! - [`types`]: environments, output sets, expected/observed state, mismatch reports
//! - [`config`]: `infraprobe.toml` loading
//! - [`resolve`]: typed output resolution
//! - [`compare`]: the assertion engine
//! - [`metrics`]: metric names

pub mod compare;
pub mod config;
pub mod error;
pub mod metrics;
pub mod resolve;
pub mod types;

// Errors
pub use error::{
    ConfigError, FetchError, OutputError, ParseError, ProbeError, ProvisionCause, ProvisionError,
    ProvisionOperation,
};

// Config
pub use config::ProbeConfig;

// Domain types
pub use types::{
    AttributeValue, Environment, EnvironmentState, ExpectedState, HealthRecord, Mismatch,
    MismatchReport, ObservedState, OutputKind, OutputSet, Params, PlanResult, ProviderKind,
};

// Operations
pub use compare::compare;
pub use resolve::{Resolved, resolve};
