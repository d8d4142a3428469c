//! Provisioning engine abstraction.
//!
//! The [`ProvisioningEngine`] trait is the black-box boundary to the external
//! provisioning tool. Production code uses
//! [`TerraformCli`](crate::terraform::TerraformCli). Tests script their own
//! engine to inject failures.
//!
//! ```text
//!   ┌────────────────────┐
//!   │ ProvisioningDriver │  lifecycle state machine
//!   └─────────┬──────────┘
//!             ▼
//!   ┌────────────────────┐
//!   │ ProvisioningEngine │  (trait)
//!   └────────────────────┘
//!        │          │
//!        ▼          ▼
//!  TerraformCli   scripted test engines
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use infraprobe_core::error::ProvisionError;
use infraprobe_core::types::{Environment, OutputSet, PlanResult};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// An environment plus the private engine state that belongs to it.
///
/// Each workspace has its own state file and engine data directory, so any
/// number of environments built from the same module can run concurrently.
#[derive(Debug, Clone)]
pub struct Workspace {
    environment: Environment,
    root: PathBuf,
    /// Shared by clones. Held for the lifetime of each engine process.
    lock: Arc<Mutex<()>>,
}

impl Workspace {
    /// Places the workspace under `state_root/<environment id>`.
    ///
    /// `state_root` is made absolute because the engine runs with the module
    /// directory as its working directory.
    pub fn new(environment: Environment, state_root: &Path) -> Self {
        let state_root = std::path::absolute(state_root).unwrap_or_else(|_| state_root.to_owned());
        let root = state_root.join(&environment.id);
        Self {
            environment,
            root,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Directory owned by this workspace.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Engine state file.
    pub fn state_file(&self) -> PathBuf {
        self.root.join("terraform.tfstate")
    }

    /// Engine plugin/module cache directory.
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Waits until no other engine process runs against this workspace.
    ///
    /// An interrupted process keeps the lock until it has exited, so a
    /// following destroy sees the state it wrote.
    pub async fn lock(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.lock).lock_owned().await
    }
}

/// Operations of the external provisioning tool.
///
/// Every method works on one [`Workspace`]. Implementations must never share
/// state between workspaces.
pub trait ProvisioningEngine: Send + Sync + 'static {
    /// Prepares the module (providers, modules, backend).
    fn init(
        &self,
        workspace: &Workspace,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Computes a plan without touching live infrastructure.
    fn plan(
        &self,
        workspace: &Workspace,
    ) -> impl Future<Output = Result<PlanResult, ProvisionError>> + Send;

    /// Creates or updates live resources.
    fn apply(
        &self,
        workspace: &Workspace,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Reads outputs recorded by the last successful apply.
    fn outputs(
        &self,
        workspace: &Workspace,
    ) -> impl Future<Output = Result<OutputSet, ProvisionError>> + Send;

    /// Removes every resource tracked in the workspace state.
    fn destroy(
        &self,
        workspace: &Workspace,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;
}
