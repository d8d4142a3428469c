//! Terraform CLI adapter.
//!
//! Runs the engine binary as a child process per operation. Each workspace
//! gets its own `-state` file and `TF_DATA_DIR`, so concurrent environments
//! built from the same module never see each other's state.
//!
//! An operation that times out or is abandoned (scenario timeout,
//! cancellation) interrupts the engine with SIGINT so it can write the
//! resources it already created to state. The process is killed only if it
//! is still running after the grace period. The workspace stays locked until
//! the process has exited, so the destroy that follows sees that state.

use std::ffi::OsString;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use infraprobe_core::config::EngineConfig;
use infraprobe_core::error::{ProvisionCause, ProvisionError, ProvisionOperation};
use infraprobe_core::types::{OutputSet, PlanResult};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::engine::{ProvisioningEngine, Workspace};
use crate::parse::{classify_failure, diagnostic_tail, parse_outputs, parse_plan_summary, render_var};

/// Default timeout for init and output.
const SHORT_OPERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Captured result of one engine invocation.
struct Captured {
    stdout: String,
    stderr: String,
}

/// [`ProvisioningEngine`] backed by the `terraform` binary (or a compatible one).
#[derive(Debug, Clone)]
pub struct TerraformCli {
    binary: OsString,
    plan_timeout: Duration,
    apply_timeout: Duration,
    destroy_timeout: Duration,
    interrupt_grace: Duration,
}

impl TerraformCli {
    /// Creates an adapter for `binary` with default timeouts.
    pub fn new(binary: impl Into<OsString>) -> Self {
        let defaults = EngineConfig::default();
        Self {
            binary: binary.into(),
            plan_timeout: defaults.plan_timeout(),
            apply_timeout: defaults.apply_timeout(),
            destroy_timeout: defaults.destroy_timeout(),
            interrupt_grace: defaults.interrupt_grace(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            binary: OsString::from(&config.binary),
            plan_timeout: config.plan_timeout(),
            apply_timeout: config.apply_timeout(),
            destroy_timeout: config.destroy_timeout(),
            interrupt_grace: config.interrupt_grace(),
        }
    }

    /// Overrides every operation timeout. Mainly for tests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.plan_timeout = timeout;
        self.apply_timeout = timeout;
        self.destroy_timeout = timeout;
        self
    }

    pub fn with_interrupt_grace(mut self, grace: Duration) -> Self {
        self.interrupt_grace = grace;
        self
    }

    fn timeout_for(&self, operation: ProvisionOperation) -> Duration {
        match operation {
            ProvisionOperation::Plan => self.plan_timeout,
            ProvisionOperation::Apply => self.apply_timeout,
            ProvisionOperation::Destroy => self.destroy_timeout,
            ProvisionOperation::Init | ProvisionOperation::Output => {
                SHORT_OPERATION_TIMEOUT.min(self.apply_timeout)
            }
        }
    }

    /// Arguments for a state-mutating or planning subcommand.
    fn lifecycle_args(operation: ProvisionOperation, workspace: &Workspace) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            operation.to_string().into(),
            "-input=false".into(),
            "-no-color".into(),
        ];
        if matches!(operation, ProvisionOperation::Apply | ProvisionOperation::Destroy) {
            args.push("-auto-approve".into());
        }

        let mut state = OsString::from("-state=");
        state.push(workspace.state_file());
        args.push(state);

        let env = workspace.environment();
        for path in &env.var_files {
            let mut arg = OsString::from("-var-file=");
            arg.push(path);
            args.push(arg);
        }
        for (name, value) in &env.params {
            args.push("-var".into());
            args.push(render_var(name, value).into());
        }
        args
    }

    async fn run(
        &self,
        operation: ProvisionOperation,
        workspace: &Workspace,
        args: Vec<OsString>,
    ) -> Result<Captured, ProvisionError> {
        let env = workspace.environment();
        let data_dir = workspace.data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| ProvisionError::Launch {
                operation,
                reason: format!("cannot create workspace {}: {e}", data_dir.display()),
            })?;

        let mut chdir = OsString::from("-chdir=");
        chdir.push(&env.module_path);

        let mut cmd = Command::new(&self.binary);
        cmd.arg(chdir)
            .args(&args)
            .env("TF_DATA_DIR", &data_dir)
            .env("TF_IN_AUTOMATION", "1")
            .env("TF_INPUT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            env_id = %env.short_id(),
            operation = %operation,
            "running engine"
        );

        let lock = workspace.lock().await;
        let mut child = cmd.spawn().map_err(|e| ProvisionError::Launch {
            operation,
            reason: format!("failed to spawn {}: {e}", self.binary.to_string_lossy()),
        })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut process = EngineProcess {
            child: Some(child),
            grace: self.interrupt_grace,
            lock: Some(lock),
        };

        let timeout = self.timeout_for(operation);
        let finished = tokio::time::timeout(timeout, async {
            tokio::try_join!(process.wait(), read_pipe(stdout), read_pipe(stderr))
        })
        .await;
        let (status, stdout, stderr) = match finished {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProvisionError::Launch {
                    operation,
                    reason: format!("failed to read engine output: {e}"),
                });
            }
            Err(_) => {
                warn!(
                    env_id = %env.short_id(),
                    operation = %operation,
                    timeout_secs = timeout.as_secs(),
                    "engine operation timed out, interrupting"
                );
                process.interrupt().await;
                return Err(ProvisionError::Failed {
                    operation,
                    cause: ProvisionCause::Timeout,
                    message: format!("no result after {}s", timeout.as_secs()),
                });
            }
        };

        let captured = Captured {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        };

        if status.success() {
            Ok(captured)
        } else {
            let cause = classify_failure(operation, &captured.stdout, &captured.stderr);
            Err(ProvisionError::Failed {
                operation,
                cause,
                message: diagnostic_tail(&captured.stdout, &captured.stderr),
            })
        }
    }
}

/// A running engine process that is interrupted rather than killed when it
/// is abandoned.
struct EngineProcess {
    child: Option<Child>,
    grace: Duration,
    /// Released only once the child has exited.
    lock: Option<OwnedMutexGuard<()>>,
}

impl EngineProcess {
    async fn wait(&mut self) -> io::Result<ExitStatus> {
        match self.child.as_mut() {
            Some(child) => child.wait().await,
            None => Err(io::Error::other("engine process already stopped")),
        }
    }

    /// Interrupts the child and waits for it to exit.
    async fn interrupt(&mut self) {
        if let Some(mut child) = self.child.take() {
            stop(&mut child, self.grace).await;
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        let lock = self.lock.take();
        let grace = self.grace;
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    stop(&mut child, grace).await;
                    drop(lock);
                });
            }
            Err(_) => {
                // kill_on_drop takes over
                warn!("no runtime to interrupt engine process, killing it");
            }
        }
    }
}

/// SIGINT, then SIGKILL once `grace` has passed.
async fn stop(child: &mut Child, grace: Duration) {
    if matches!(child.try_wait(), Ok(Some(_))) {
        return;
    }
    if !send_interrupt(child) {
        if let Err(e) = child.kill().await {
            warn!(error = %e, "failed to kill engine process");
        }
        return;
    }
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => info!(%status, "engine process exited after interrupt"),
        Ok(Err(e)) => warn!(error = %e, "failed to wait for interrupted engine process"),
        Err(_) => {
            warn!(grace_secs = grace.as_secs(), "engine ignored interrupt, killing it");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill engine process");
            }
        }
    }
}

#[cfg(unix)]
fn send_interrupt(child: &Child) -> bool {
    let Some(pid) = child.id().and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return false;
    };
    // SAFETY: `pid` is our own child and has not been reaped yet.
    unsafe { libc::kill(pid, libc::SIGINT) == 0 }
}

#[cfg(not(unix))]
fn send_interrupt(_child: &Child) -> bool {
    false
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

impl ProvisioningEngine for TerraformCli {
    async fn init(&self, workspace: &Workspace) -> Result<(), ProvisionError> {
        let args = vec!["init".into(), "-input=false".into(), "-no-color".into()];
        self.run(ProvisionOperation::Init, workspace, args).await?;
        Ok(())
    }

    async fn plan(&self, workspace: &Workspace) -> Result<PlanResult, ProvisionError> {
        let args = Self::lifecycle_args(ProvisionOperation::Plan, workspace);
        let captured = self.run(ProvisionOperation::Plan, workspace, args).await?;
        Ok(parse_plan_summary(&captured.stdout).unwrap_or_else(|| {
            warn!(
                env_id = %workspace.environment().short_id(),
                "plan succeeded without a change summary"
            );
            PlanResult::default()
        }))
    }

    async fn apply(&self, workspace: &Workspace) -> Result<(), ProvisionError> {
        let args = Self::lifecycle_args(ProvisionOperation::Apply, workspace);
        self.run(ProvisionOperation::Apply, workspace, args).await?;
        Ok(())
    }

    async fn outputs(&self, workspace: &Workspace) -> Result<OutputSet, ProvisionError> {
        let mut state = OsString::from("-state=");
        state.push(workspace.state_file());
        let args = vec!["output".into(), "-json".into(), "-no-color".into(), state];

        let captured = self.run(ProvisionOperation::Output, workspace, args).await?;
        parse_outputs(&captured.stdout).map_err(|e| ProvisionError::Launch {
            operation: ProvisionOperation::Output,
            reason: format!("invalid output document: {e}"),
        })
    }

    async fn destroy(&self, workspace: &Workspace) -> Result<(), ProvisionError> {
        let args = Self::lifecycle_args(ProvisionOperation::Destroy, workspace);
        self.run(ProvisionOperation::Destroy, workspace, args).await?;
        Ok(())
    }
}
