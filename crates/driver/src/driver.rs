//! Environment lifecycle driver.
//!
//! [`ProvisioningDriver`] owns one environment and enforces its lifecycle:
//!
//! ```text
//!  Idle ──plan──▶ Planning ──▶ Planned
//!   │                 └─(fail)─▶ Idle
//!   └──apply──▶ Applying ──▶ Applied ──destroy──▶ Destroying ──▶ Destroyed
//!                   │                                  └─(fail)─▶ DestroyFailed
//!                   └─(fail)─▶ ApplyFailed ──destroy──▶ ...
//! ```
//!
//! Destroy is also accepted from `Applying`: an apply future dropped by a
//! timeout or cancellation leaves the state there, and resources may exist.

use std::path::Path;
use std::sync::Arc;

use infraprobe_core::error::{OutputError, ProvisionError, ProvisionOperation};
use infraprobe_core::metrics::{LABEL_OPERATION, PROVISION_FAILURES_TOTAL};
use infraprobe_core::types::{Environment, EnvironmentState, OutputSet, PlanResult};
use metrics::counter;
use tracing::{info, warn};

use crate::engine::{ProvisioningEngine, Workspace};

/// Drives one environment through plan, apply and destroy.
pub struct ProvisioningDriver<E: ProvisioningEngine> {
    engine: Arc<E>,
    workspace: Workspace,
    state: EnvironmentState,
    outputs: Option<OutputSet>,
    run_init: bool,
    initialized: bool,
}

impl<E: ProvisioningEngine> ProvisioningDriver<E> {
    /// Creates a driver in state `Idle`. Nothing runs until an operation is called.
    pub fn new(engine: Arc<E>, environment: Environment, state_root: &Path) -> Self {
        Self {
            engine,
            workspace: Workspace::new(environment, state_root),
            state: EnvironmentState::Idle,
            outputs: None,
            run_init: true,
            initialized: false,
        }
    }

    /// Skips `init` before the first operation.
    pub fn without_init(mut self) -> Self {
        self.run_init = false;
        self
    }

    pub fn environment(&self) -> &Environment {
        self.workspace.environment()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn state(&self) -> EnvironmentState {
        self.state
    }

    /// Computes a plan. No live resources are created.
    ///
    /// A failed plan returns the environment to `Idle`.
    pub async fn plan(&mut self) -> Result<PlanResult, ProvisionError> {
        self.ensure_permitted(ProvisionOperation::Plan)?;
        self.ensure_initialized().await?;

        self.state = EnvironmentState::Planning;
        match self.engine.plan(&self.workspace).await {
            Ok(plan) => {
                self.state = EnvironmentState::Planned;
                info!(env_id = %self.environment().short_id(), plan = %plan, "plan complete");
                Ok(plan)
            }
            Err(e) => {
                self.state = EnvironmentState::Idle;
                Err(self.record_failure(e))
            }
        }
    }

    /// Creates live resources and captures the resulting outputs.
    ///
    /// On failure the environment is `ApplyFailed` and may hold partially
    /// created resources; the caller must still [`destroy`](Self::destroy).
    pub async fn apply(&mut self) -> Result<&OutputSet, ProvisionError> {
        self.ensure_permitted(ProvisionOperation::Apply)?;
        self.ensure_initialized().await?;

        self.state = EnvironmentState::Applying;
        info!(env_id = %self.environment().short_id(), "applying");

        if let Err(e) = self.engine.apply(&self.workspace).await {
            self.state = EnvironmentState::ApplyFailed;
            return Err(self.record_failure(e));
        }

        match self.engine.outputs(&self.workspace).await {
            Ok(outputs) => {
                self.state = EnvironmentState::Applied;
                info!(
                    env_id = %self.environment().short_id(),
                    outputs = outputs.len(),
                    "apply complete"
                );
                Ok(&*self.outputs.insert(outputs))
            }
            Err(e) => {
                // resources exist but cannot be inspected
                self.state = EnvironmentState::ApplyFailed;
                Err(self.record_failure(e))
            }
        }
    }

    /// Removes every resource of the environment.
    ///
    /// Permitted once per environment from `Applying`, `Applied` or
    /// `ApplyFailed`. Ends in `Destroyed` or `DestroyFailed`; both are terminal.
    pub async fn destroy(&mut self) -> Result<(), ProvisionError> {
        self.ensure_permitted(ProvisionOperation::Destroy)?;

        self.state = EnvironmentState::Destroying;
        self.outputs = None;
        info!(env_id = %self.environment().short_id(), "destroying");

        match self.engine.destroy(&self.workspace).await {
            Ok(()) => {
                self.state = EnvironmentState::Destroyed;
                info!(env_id = %self.environment().short_id(), "destroy complete");
                if let Err(e) = tokio::fs::remove_dir_all(self.workspace.root()).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            path = %self.workspace.root().display(),
                            error = %e,
                            "failed to remove workspace directory"
                        );
                    }
                }
                Ok(())
            }
            Err(e) => {
                self.state = EnvironmentState::DestroyFailed;
                warn!(
                    env_id = %self.environment().short_id(),
                    state_file = %self.workspace.state_file().display(),
                    "destroy failed, resources may remain; state file kept for manual cleanup"
                );
                Err(self.record_failure(e))
            }
        }
    }

    /// Returns the raw value of output `name`.
    pub fn output(&self, name: &str) -> Result<&serde_json::Value, OutputError> {
        self.outputs()?
            .get(name)
            .ok_or_else(|| OutputError::NotFound(name.to_owned()))
    }

    /// Returns all outputs. Only available while `Applied`.
    pub fn outputs(&self) -> Result<&OutputSet, OutputError> {
        match (&self.outputs, self.state) {
            (Some(outputs), state) if state.permits(ProvisionOperation::Output) => Ok(outputs),
            (_, state) => Err(OutputError::NotApplied { state }),
        }
    }

    fn ensure_permitted(&self, operation: ProvisionOperation) -> Result<(), ProvisionError> {
        if self.state.permits(operation) {
            Ok(())
        } else {
            Err(ProvisionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    async fn ensure_initialized(&mut self) -> Result<(), ProvisionError> {
        if !self.run_init || self.initialized {
            return Ok(());
        }
        self.engine
            .init(&self.workspace)
            .await
            .map_err(|e| self.record_failure(e))?;
        self.initialized = true;
        Ok(())
    }

    fn record_failure(&self, error: ProvisionError) -> ProvisionError {
        let operation = match &error {
            ProvisionError::Failed { operation, .. }
            | ProvisionError::InvalidState { operation, .. }
            | ProvisionError::Launch { operation, .. } => *operation,
        };
        counter!(PROVISION_FAILURES_TOTAL, LABEL_OPERATION => operation.to_string()).increment(1);
        warn!(
            env_id = %self.environment().short_id(),
            operation = %operation,
            error = %error,
            "engine operation failed"
        );
        error
    }
}
