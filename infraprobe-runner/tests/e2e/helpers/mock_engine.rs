//! Scripted provisioning engine.
//!
//! Records every call, per environment, so tests can assert that destroy ran
//! exactly once for each applied environment and that parallel scenarios
//! never shared a workspace.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use infraprobe_core::error::{ProvisionCause, ProvisionError, ProvisionOperation};
use infraprobe_core::types::{OutputSet, PlanResult};
use infraprobe_driver::{ProvisioningEngine, Workspace};

/// Call counters shared by all environments of one engine.
#[derive(Default)]
pub struct EngineCalls {
    pub inits: AtomicUsize,
    pub plans: AtomicUsize,
    pub applies: AtomicUsize,
    pub applies_done: AtomicUsize,
    pub destroys: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    destroys_by_env: Mutex<HashMap<String, usize>>,
    workspaces: Mutex<Vec<PathBuf>>,
}

#[allow(dead_code)]
impl EngineCalls {
    pub fn applies(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    /// Destroy count per environment id.
    pub fn destroys_by_env(&self) -> HashMap<String, usize> {
        self.destroys_by_env.lock().unwrap().clone()
    }

    /// Workspace roots seen by apply, in call order.
    pub fn workspaces(&self) -> Vec<PathBuf> {
        self.workspaces.lock().unwrap().clone()
    }
}

/// A provisioning engine driven entirely by its fields.
#[derive(Default)]
pub struct MockEngine {
    /// Returned by `outputs` after a successful apply.
    pub outputs: OutputSet,
    /// Makes apply fail with this cause.
    pub apply_failure: Option<ProvisionCause>,
    /// Makes destroy fail.
    pub destroy_fails: bool,
    /// Apply takes this long.
    pub apply_delay: Option<Duration>,
    pub calls: EngineCalls,
}

#[allow(dead_code)]
impl MockEngine {
    pub fn with_outputs(outputs: OutputSet) -> Self {
        Self {
            outputs,
            ..Self::default()
        }
    }

    pub fn apply_failure(mut self, cause: ProvisionCause) -> Self {
        self.apply_failure = Some(cause);
        self
    }

    pub fn destroy_fails(mut self) -> Self {
        self.destroy_fails = true;
        self
    }

    pub fn apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = Some(delay);
        self
    }
}

impl ProvisioningEngine for MockEngine {
    async fn init(&self, _: &Workspace) -> Result<(), ProvisionError> {
        self.calls.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn plan(&self, _: &Workspace) -> Result<PlanResult, ProvisionError> {
        self.calls.plans.fetch_add(1, Ordering::SeqCst);
        Ok(PlanResult {
            to_add: 3,
            to_change: 0,
            to_destroy: 0,
        })
    }

    async fn apply(&self, workspace: &Workspace) -> Result<(), ProvisionError> {
        self.calls.applies.fetch_add(1, Ordering::SeqCst);
        self.calls
            .workspaces
            .lock()
            .unwrap()
            .push(workspace.root().to_path_buf());

        let now = self.calls.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.apply_delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.applies_done.fetch_add(1, Ordering::SeqCst);

        match self.apply_failure {
            Some(cause) => Err(ProvisionError::Failed {
                operation: ProvisionOperation::Apply,
                cause,
                message: "Error: creating ELBv2 Target Group: DuplicateTargetGroupName".to_owned(),
            }),
            None => Ok(()),
        }
    }

    async fn outputs(&self, _: &Workspace) -> Result<OutputSet, ProvisionError> {
        Ok(self.outputs.clone())
    }

    async fn destroy(&self, workspace: &Workspace) -> Result<(), ProvisionError> {
        self.calls.destroys.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .destroys_by_env
            .lock()
            .unwrap()
            .entry(workspace.environment().id.clone())
            .or_default() += 1;

        if self.destroy_fails {
            return Err(ProvisionError::Failed {
                operation: ProvisionOperation::Destroy,
                cause: ProvisionCause::Other,
                message: "Error: deleting target group: ResourceInUse".to_owned(),
            });
        }
        Ok(())
    }
}
