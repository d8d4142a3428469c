//! infraprobe runner: scenario definitions, checks, guaranteed teardown and
//! the `infraprobe` CLI.
//!
//! - [`scenario`]: scenario files
//! - [`checks`]: check declarations and probes
//! - [`guard`]: teardown guard
//! - [`orchestrator`]: per-scenario lifecycle and parallel runs
//! - [`outcome`]: scenario and run results

#![recursion_limit = "256"]

pub mod checks;
pub mod cli;
pub mod commands;
pub mod error;
pub mod guard;
pub mod logging;
pub mod orchestrator;
pub mod outcome;
pub mod output;
pub mod scenario;

pub use checks::{Check, CheckError, Probe};
pub use guard::EnvironmentGuard;
pub use orchestrator::{Orchestrator, RunSettings};
pub use outcome::{CheckOutcome, CheckStatus, RunSummary, ScenarioResult, StepOutcome};
pub use scenario::{Mode, Scenario, ScenarioFile};
