//! Parsing of engine output: plan summaries, output JSON, failure causes.
//!
//! All functions here are pure so they can be tested without an engine binary.

use std::collections::BTreeMap;

use infraprobe_core::error::{ProvisionCause, ProvisionOperation};
use infraprobe_core::types::{OutputSet, PlanResult};
use serde::Deserialize;

/// Maximum number of diagnostic lines kept in an error message.
const MAX_DIAGNOSTIC_LINES: usize = 20;

const AUTH_MARKERS: &[&str] = &[
    "accessdenied",
    "access denied",
    "unauthorizedoperation",
    "invalidclienttokenid",
    "expiredtoken",
    "authorizationfailed",
    "no valid credential",
    "could not find default credentials",
    "permission denied",
];

const QUOTA_MARKERS: &[&str] = &[
    "limitexceeded",
    "limit exceeded",
    "quotaexceeded",
    "quota exceeded",
    "exceeded quota",
    "insufficient regional quota",
];

const CONFLICT_MARKERS: &[&str] = &[
    "already exists",
    "alreadyexists",
    "duplicate",
    "conflict",
    "resourceinuse",
    "error acquiring the state lock",
];

const TIMEOUT_MARKERS: &[&str] = &[
    "timeout while waiting",
    "context deadline exceeded",
    "timed out",
];

const PROGRESS_MARKERS: &[&str] = &["creation complete", "modifications complete"];

/// Classifies an engine failure from its captured output.
///
/// Markers are checked in order auth, quota, conflict, timeout. A failed apply
/// that logged completed resource operations before failing is
/// [`ProvisionCause::PartialApply`].
pub fn classify_failure(operation: ProvisionOperation, stdout: &str, stderr: &str) -> ProvisionCause {
    let stderr_lc = stderr.to_lowercase();
    let stdout_lc = stdout.to_lowercase();
    let mentions = |markers: &[&str]| {
        markers
            .iter()
            .any(|m| stderr_lc.contains(m) || stdout_lc.contains(m))
    };

    if mentions(AUTH_MARKERS) {
        ProvisionCause::Auth
    } else if mentions(QUOTA_MARKERS) {
        ProvisionCause::Quota
    } else if mentions(CONFLICT_MARKERS) {
        ProvisionCause::Conflict
    } else if mentions(TIMEOUT_MARKERS) {
        ProvisionCause::Timeout
    } else if operation == ProvisionOperation::Apply
        && PROGRESS_MARKERS.iter().any(|m| stdout_lc.contains(m))
    {
        ProvisionCause::PartialApply
    } else {
        ProvisionCause::Other
    }
}

/// Trims engine output to the tail worth showing in an error.
///
/// Prefers stderr and falls back to stdout when stderr is empty.
pub fn diagnostic_tail(stdout: &str, stderr: &str) -> String {
    let source = if stderr.trim().is_empty() { stdout } else { stderr };
    let lines: Vec<&str> = source
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(MAX_DIAGNOSTIC_LINES);
    lines[start..].join("\n")
}

/// Extracts the change summary from plan output.
///
/// Recognizes `Plan: N to add, N to change, N to destroy.` (with or without a
/// leading `N to import,`) and the `No changes.` banner. Returns `None` when
/// neither is present.
pub fn parse_plan_summary(stdout: &str) -> Option<PlanResult> {
    for line in stdout.lines().map(str::trim) {
        if line.starts_with("No changes.") {
            return Some(PlanResult::default());
        }
        let Some(rest) = line.strip_prefix("Plan:") else {
            continue;
        };

        let mut result = PlanResult::default();
        for part in rest.trim().trim_end_matches('.').split(',') {
            let mut words = part.split_whitespace();
            let (Some(count), Some("to"), Some(action)) = (words.next(), words.next(), words.next())
            else {
                continue;
            };
            let Ok(count) = count.parse::<u32>() else {
                continue;
            };
            match action {
                "add" => result.to_add = count,
                "change" => result.to_change = count,
                "destroy" => result.to_destroy = count,
                _ => {}
            }
        }
        return Some(result);
    }
    None
}

#[derive(Deserialize)]
struct RawOutput {
    value: serde_json::Value,
}

/// Parses the JSON document printed by `output -json`.
///
/// The document maps each output name to `{ "value": ..., "type": ..., "sensitive": ... }`.
/// Only values are kept.
pub fn parse_outputs(json: &str) -> Result<OutputSet, serde_json::Error> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(OutputSet::default());
    }
    let raw: BTreeMap<String, RawOutput> = serde_json::from_str(trimmed)?;
    Ok(raw.into_iter().map(|(name, o)| (name, o.value)).collect())
}

/// Renders a parameter as a `-var` argument.
///
/// Strings are passed raw. Everything else is rendered as JSON, which the
/// engine parses as an expression.
pub fn render_var(name: &str, value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => format!("{name}={s}"),
        other => format!("{name}={other}"),
    }
}
