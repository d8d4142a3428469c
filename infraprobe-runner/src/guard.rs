//! Teardown guard for applied environments.
//!
//! An [`EnvironmentGuard`] owns a [`ProvisioningDriver`] from before apply
//! until teardown. The normal path is an explicit, awaited
//! [`teardown`](EnvironmentGuard::teardown). If the guard is dropped while the
//! environment may still hold resources (the owning future was cancelled),
//! `Drop` schedules destroy on the current tokio runtime instead.
//!
//! Destroy always runs in its own task, so cancelling the caller mid-teardown
//! cannot interrupt it.

use infraprobe_core::error::{ProvisionError, ProvisionOperation};
use infraprobe_core::metrics::DEFERRED_TEARDOWNS_TOTAL;
use infraprobe_core::types::{EnvironmentState, OutputSet};
use infraprobe_driver::{ProvisioningDriver, ProvisioningEngine};
use metrics::counter;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

pub struct EnvironmentGuard<E: ProvisioningEngine> {
    driver: Option<ProvisioningDriver<E>>,
}

impl<E: ProvisioningEngine> EnvironmentGuard<E> {
    /// Takes ownership of `driver`. Teardown is armed from here on.
    pub fn arm(driver: ProvisioningDriver<E>) -> Self {
        Self {
            driver: Some(driver),
        }
    }

    pub fn state(&self) -> EnvironmentState {
        self.driver
            .as_ref()
            .map_or(EnvironmentState::Destroyed, ProvisioningDriver::state)
    }

    /// Applies the guarded environment.
    pub async fn apply(&mut self) -> Result<&OutputSet, ProvisionError> {
        match self.driver.as_mut() {
            Some(driver) => driver.apply().await,
            None => Err(ProvisionError::InvalidState {
                operation: ProvisionOperation::Apply,
                state: EnvironmentState::Destroyed,
            }),
        }
    }

    /// Destroys the environment if it may hold resources.
    ///
    /// Returns `None` when nothing needed destroying, otherwise the destroy
    /// outcome.
    pub async fn teardown(mut self) -> Option<Result<(), ProvisionError>> {
        let mut driver = self.driver.take()?;
        if !driver.state().may_hold_resources() {
            return None;
        }

        let handle = tokio::spawn(async move { driver.destroy().await });
        let outcome = match handle.await {
            Ok(result) => result,
            Err(e) => Err(ProvisionError::Launch {
                operation: ProvisionOperation::Destroy,
                reason: format!("teardown task failed: {e}"),
            }),
        };
        Some(outcome)
    }
}

impl<E: ProvisioningEngine> Drop for EnvironmentGuard<E> {
    fn drop(&mut self) {
        let Some(mut driver) = self.driver.take() else {
            return;
        };
        if !driver.state().may_hold_resources() {
            return;
        }

        let env_id = driver.environment().id.clone();
        let state_file = driver.workspace().state_file();
        match Handle::try_current() {
            Ok(runtime) => {
                warn!(env_id = %env_id, state = %driver.state(), "scenario cancelled, scheduling teardown");
                counter!(DEFERRED_TEARDOWNS_TOTAL).increment(1);
                runtime.spawn(async move {
                    match driver.destroy().await {
                        Ok(()) => info!(env_id = %env_id, "deferred teardown complete"),
                        Err(e) => error!(
                            env_id = %env_id,
                            error = %e,
                            state_file = %state_file.display(),
                            "deferred teardown failed, resources may remain"
                        ),
                    }
                });
            }
            Err(_) => {
                error!(
                    env_id = %env_id,
                    state_file = %state_file.display(),
                    "no runtime to tear down environment, resources may remain"
                );
            }
        }
    }
}
