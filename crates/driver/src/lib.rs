//! Provisioning driver for infraprobe.
//!
//! - [`engine`]: the [`ProvisioningEngine`] trait and per-environment [`Workspace`]
//! - [`terraform`]: [`TerraformCli`], the production engine
//! - [`driver`]: [`ProvisioningDriver`], the lifecycle state machine
//! - [`parse`]: plan summaries, output documents, failure classification

pub mod driver;
pub mod engine;
pub mod parse;
pub mod terraform;

pub use driver::ProvisioningDriver;
pub use engine::{ProvisioningEngine, Workspace};
pub use terraform::TerraformCli;
