//! Scenario and run results.
//!
//! A mismatch is a value, not an error: it is carried in
//! [`CheckStatus::Failed`] next to the apply and destroy outcomes.

use std::time::Duration;

use infraprobe_core::error::{ProvisionCause, ProvisionError};
use infraprobe_core::types::{MismatchReport, PlanResult};
use serde::Serialize;

use crate::scenario::Mode;

/// Outcome of a provisioning step (plan/apply or destroy).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Ok,
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        cause: Option<ProvisionCause>,
        message: String,
    },
}

impl StepOutcome {
    pub fn failed(error: &ProvisionError) -> Self {
        Self::Failed {
            cause: error.cause(),
            message: error.to_string(),
        }
    }

    pub fn from_result(result: Result<(), ProvisionError>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(e) => Self::failed(&e),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed { mismatches: MismatchReport },
    /// The check could not be evaluated (bad output, provider error).
    Error { message: String },
}

impl CheckStatus {
    pub fn from_report(report: MismatchReport) -> Self {
        if report.is_empty() {
            Self::Passed
        } else {
            Self::Failed { mismatches: report }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub check: String,
    #[serde(flatten)]
    pub status: CheckStatus,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        matches!(self.status, CheckStatus::Passed)
    }

    pub fn mismatches(&self) -> usize {
        match &self.status {
            CheckStatus::Failed { mismatches } => mismatches.len(),
            _ => 0,
        }
    }
}

/// Everything that happened to one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub env_id: String,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanResult>,
    /// Plan (plan mode) or apply (apply mode) outcome; `None` if it never finished.
    pub provision: Option<StepOutcome>,
    pub checks: Vec<CheckOutcome>,
    /// `None` when nothing needed destroying.
    pub destroy: Option<StepOutcome>,
    pub timed_out: bool,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ScenarioResult {
    pub fn new(name: impl Into<String>, env_id: impl Into<String>, mode: Mode) -> Self {
        Self {
            name: name.into(),
            env_id: env_id.into(),
            mode,
            plan: None,
            provision: None,
            checks: Vec::new(),
            destroy: None,
            timed_out: false,
            cancelled: false,
            error: None,
            duration_ms: 0,
        }
    }

    /// Clean provision, every check passed, no destroy failure, not interrupted.
    pub fn passed(&self) -> bool {
        self.provision.as_ref().is_some_and(StepOutcome::is_ok)
            && self.checks.iter().all(CheckOutcome::passed)
            && self.destroy.as_ref().is_none_or(StepOutcome::is_ok)
            && !self.timed_out
            && !self.cancelled
            && self.error.is_none()
    }

    pub fn mismatches(&self) -> usize {
        self.checks.iter().map(CheckOutcome::mismatches).sum()
    }

    pub fn set_duration(&mut self, elapsed: Duration) {
        self.duration_ms = millis(elapsed);
    }
}

/// Results of a run, in scenario-file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub results: Vec<ScenarioResult>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn passed(&self) -> bool {
        self.results.iter().all(ScenarioResult::passed)
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.passed_count()
    }
}

pub(crate) fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
