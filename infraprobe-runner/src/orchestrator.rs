//! Scenario orchestration.
//!
//! Apply-mode scenarios run as:
//!
//! ```text
//! arm guard -> apply -> create fetcher -> settle -> checks (poll until converged)
//!           \______________ scenario timeout / cancellation ______________/
//!                                                                  -> teardown
//! ```
//!
//! The scenario timeout and cancellation cover everything before teardown,
//! so destroy always gets to run. Scenarios share nothing mutable; each owns
//! its environment, driver and fetcher.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use infraprobe_core::config::ProbeConfig;
use infraprobe_core::error::FetchError;
use infraprobe_core::metrics::{
    LABEL_RESULT, MISMATCHES_TOTAL, SCENARIO_DURATION_SECONDS, SCENARIOS_TOTAL,
};
use infraprobe_driver::{ProvisioningDriver, ProvisioningEngine};
use infraprobe_fetcher::{FetcherFactory, StateFetcher};
use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::checks::Probe;
use crate::guard::EnvironmentGuard;
use crate::outcome::{CheckOutcome, CheckStatus, RunSummary, ScenarioResult, StepOutcome, millis};
use crate::scenario::{Mode, Scenario};

/// Run-wide settings taken from [`ProbeConfig`].
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Directory under which each environment gets its own workspace.
    pub state_root: PathBuf,
    pub run_init: bool,
    /// Wait after apply before the first provider query.
    pub settle_delay: Duration,
    /// How long a provider-backed check may keep re-polling.
    pub convergence_timeout: Duration,
    pub poll_interval: Duration,
    /// Bound on everything before teardown.
    pub scenario_timeout: Duration,
    pub max_parallel: usize,
}

impl RunSettings {
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self {
            state_root: config.engine.state_root(),
            run_init: config.engine.init,
            settle_delay: config.settle.delay(),
            convergence_timeout: config.settle.convergence_timeout(),
            poll_interval: config.settle.poll_interval(),
            scenario_timeout: config.runner.scenario_timeout(),
            max_parallel: config.runner.max_parallel,
        }
    }
}

enum Interrupt {
    TimedOut,
    Cancelled,
}

/// Runs scenarios against an engine and a fetcher factory.
pub struct Orchestrator<E: ProvisioningEngine, F: FetcherFactory> {
    engine: Arc<E>,
    fetchers: Arc<F>,
    settings: Arc<RunSettings>,
}

impl<E: ProvisioningEngine, F: FetcherFactory> Clone for Orchestrator<E, F> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            fetchers: Arc::clone(&self.fetchers),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<E: ProvisioningEngine, F: FetcherFactory> Orchestrator<E, F> {
    pub fn new(engine: Arc<E>, fetchers: Arc<F>, settings: RunSettings) -> Self {
        Self {
            engine,
            fetchers,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Runs one scenario to completion, teardown included.
    ///
    /// Never returns an error: every failure is recorded in the result.
    pub async fn run_scenario(&self, scenario: &Scenario, cancel: &CancellationToken) -> ScenarioResult {
        let started = Instant::now();
        let environment = scenario.environment();
        let span = info_span!(
            "scenario",
            scenario = %scenario.name,
            env_id = %environment.short_id(),
        );

        async move {
            let mut result = ScenarioResult::new(&scenario.name, &environment.id, scenario.mode);
            let mut driver =
                ProvisioningDriver::new(Arc::clone(&self.engine), environment, &self.settings.state_root);
            if !self.settings.run_init {
                driver = driver.without_init();
            }

            info!(mode = %scenario.mode, checks = scenario.checks.len(), "scenario started");
            match scenario.mode {
                Mode::Plan => self.plan_only(driver, &mut result, cancel).await,
                Mode::Apply => self.apply_and_verify(scenario, driver, &mut result, cancel).await,
            }

            result.set_duration(started.elapsed());
            record_metrics(&result, started.elapsed());
            if result.passed() {
                info!(duration_ms = result.duration_ms, "scenario passed");
            } else {
                warn!(
                    duration_ms = result.duration_ms,
                    mismatches = result.mismatches(),
                    "scenario failed"
                );
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Runs every scenario as its own task, at most `max_parallel` at a time.
    ///
    /// Results come back in input order. Once `cancel` fires, running
    /// scenarios tear down and scenarios not yet started are skipped.
    pub async fn run_all(&self, scenarios: Vec<Scenario>, cancel: &CancellationToken) -> RunSummary {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.settings.max_parallel.max(1)));
        let meta: Vec<(String, Mode)> = scenarios.iter().map(|s| (s.name.clone(), s.mode)).collect();
        let mut tasks = JoinSet::new();

        for (index, scenario) in scenarios.into_iter().enumerate() {
            let orchestrator = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let result = match permit {
                    Some(_permit) => orchestrator.run_scenario(&scenario, &cancel).await,
                    None => {
                        info!(scenario = %scenario.name, "run cancelled, scenario skipped");
                        let mut skipped = ScenarioResult::new(&scenario.name, "", scenario.mode);
                        skipped.cancelled = true;
                        skipped
                    }
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<ScenarioResult>> = meta.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(result);
                    }
                }
                Err(e) => error!(error = %e, "scenario task failed"),
            }
        }

        let results = slots
            .into_iter()
            .zip(meta)
            .map(|(slot, (name, mode))| {
                slot.unwrap_or_else(|| {
                    let mut lost = ScenarioResult::new(name, "", mode);
                    lost.error = Some("scenario task aborted".to_owned());
                    lost
                })
            })
            .collect();

        RunSummary {
            results,
            duration_ms: millis(started.elapsed()),
        }
    }

    async fn plan_only(
        &self,
        mut driver: ProvisioningDriver<E>,
        result: &mut ScenarioResult,
        cancel: &CancellationToken,
    ) {
        tokio::select! {
            outcome = tokio::time::timeout(self.settings.scenario_timeout, driver.plan()) => match outcome {
                Ok(Ok(plan)) => {
                    result.plan = Some(plan);
                    result.provision = Some(StepOutcome::Ok);
                }
                Ok(Err(e)) => result.provision = Some(StepOutcome::failed(&e)),
                Err(_) => {
                    warn!(timeout_secs = self.settings.scenario_timeout.as_secs(), "plan timed out");
                    result.timed_out = true;
                }
            },
            () = cancel.cancelled() => {
                warn!("plan cancelled");
                result.cancelled = true;
            }
        }
    }

    async fn apply_and_verify(
        &self,
        scenario: &Scenario,
        driver: ProvisioningDriver<E>,
        result: &mut ScenarioResult,
        cancel: &CancellationToken,
    ) {
        let mut guard = EnvironmentGuard::arm(driver);

        let interrupt = {
            let phase = self.verify(scenario, &mut guard, result);
            tokio::select! {
                biased;
                () = cancel.cancelled() => Some(Interrupt::Cancelled),
                outcome = tokio::time::timeout(self.settings.scenario_timeout, phase) => {
                    outcome.err().map(|_| Interrupt::TimedOut)
                }
            }
        };
        match interrupt {
            Some(Interrupt::TimedOut) => {
                warn!(
                    timeout_secs = self.settings.scenario_timeout.as_secs(),
                    state = %guard.state(),
                    "scenario timed out"
                );
                result.timed_out = true;
            }
            Some(Interrupt::Cancelled) => {
                warn!(state = %guard.state(), "scenario cancelled");
                result.cancelled = true;
            }
            None => {}
        }

        result.destroy = guard.teardown().await.map(StepOutcome::from_result);
        if let Some(StepOutcome::Failed { message, .. }) = &result.destroy {
            error!(error = %message, "teardown failed, resources may remain");
        }
    }

    /// Apply, then evaluate every check in declaration order.
    async fn verify(&self, scenario: &Scenario, guard: &mut EnvironmentGuard<E>, result: &mut ScenarioResult) {
        let outputs = match guard.apply().await {
            Ok(outputs) => outputs.clone(),
            Err(e) => {
                warn!(error = %e, "apply failed, skipping checks");
                result.provision = Some(StepOutcome::failed(&e));
                return;
            }
        };
        result.provision = Some(StepOutcome::Ok);

        if scenario.checks.is_empty() {
            return;
        }

        let fetcher = if scenario.needs_provider() {
            match self.fetchers.create(&scenario.provider, &outputs).await {
                Ok(fetcher) => {
                    if !self.settings.settle_delay.is_zero() {
                        debug!(delay_ms = millis(self.settings.settle_delay), "settling");
                        tokio::time::sleep(self.settings.settle_delay).await;
                    }
                    Ok(Some(fetcher))
                }
                Err(e) => {
                    warn!(provider = %scenario.provider.kind, error = %e, "cannot create provider fetcher");
                    Err(e)
                }
            }
        } else {
            Ok(None)
        };

        for check in &scenario.checks {
            let label = check.label();
            let status = match check.prepare(&outputs, &scenario.vars) {
                Err(e) => CheckStatus::Error {
                    message: e.to_string(),
                },
                Ok(Probe::Local(report)) => CheckStatus::from_report(report),
                Ok(probe) => match &fetcher {
                    Ok(Some(fetcher)) => self.converge(&probe, fetcher).await,
                    Ok(None) => CheckStatus::Error {
                        message: "no provider fetcher".to_owned(),
                    },
                    Err(e) => CheckStatus::Error {
                        message: e.to_string(),
                    },
                },
            };

            match &status {
                CheckStatus::Passed => info!(check = %label, "check passed"),
                CheckStatus::Failed { mismatches } => {
                    for mismatch in mismatches.entries() {
                        warn!(check = %label, mismatch = %mismatch, "mismatch");
                    }
                }
                CheckStatus::Error { message } => warn!(check = %label, error = %message, "check error"),
            }
            result.checks.push(CheckOutcome { check: label, status });
        }
    }

    /// Observes `probe` until it reports no mismatches or the convergence
    /// window closes. The last report wins.
    async fn converge(&self, probe: &Probe, fetcher: &F::Fetcher) -> CheckStatus {
        let deadline = Instant::now().checked_add(self.settings.convergence_timeout);
        let mut polls = 0u32;
        loop {
            polls += 1;
            let report = match probe.observe(fetcher).await {
                Ok(report) => report,
                Err(e) => return fetch_error_status(&e),
            };
            if report.is_empty() {
                return CheckStatus::Passed;
            }
            let next_poll = Instant::now().checked_add(self.settings.poll_interval);
            let window_open = match (next_poll, deadline) {
                (Some(next), Some(deadline)) => next <= deadline,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if !window_open {
                debug!(polls, "convergence window closed");
                return CheckStatus::Failed { mismatches: report };
            }
            debug!(polls, mismatches = report.len(), provider = %fetcher.provider(), "not converged yet");
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}

fn fetch_error_status(error: &FetchError) -> CheckStatus {
    CheckStatus::Error {
        message: error.to_string(),
    }
}

fn record_metrics(result: &ScenarioResult, elapsed: Duration) {
    let label = if result.passed() { "pass" } else { "fail" };
    counter!(SCENARIOS_TOTAL, LABEL_RESULT => label).increment(1);
    histogram!(SCENARIO_DURATION_SECONDS).record(elapsed.as_secs_f64());
    let mismatches = u64::try_from(result.mismatches()).unwrap_or(u64::MAX);
    if mismatches > 0 {
        counter!(MISMATCHES_TOTAL).increment(mismatches);
    }
}
