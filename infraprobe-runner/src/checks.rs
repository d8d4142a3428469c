//! Scenario checks.
//!
//! A [`Check`] is declared in the scenario file. After apply it is
//! [prepared](Check::prepare) against the environment's outputs and params
//! into a [`Probe`], which can then be observed repeatedly while the
//! provider settles.

use std::collections::BTreeMap;
use std::fmt;

use infraprobe_core::compare;
use infraprobe_core::error::{FetchError, OutputError, ParseError};
use infraprobe_core::resolve::{map_integer, resolve, resolve_string, resolve_string_map};
use infraprobe_core::types::{
    AttributeValue, ExpectedState, Mismatch, MismatchReport, ObservedState, OutputKind, OutputSet,
    Params,
};
use infraprobe_fetcher::StateFetcher;
use serde::{Deserialize, Serialize};

/// Health-check members that must be declared, and whether each is an integer.
///
/// Other members of the declared map are ignored.
const HEALTH_CHECK_KEYS: &[(&str, bool)] = &[
    ("path", false),
    ("protocol", false),
    ("interval", true),
    ("timeout", true),
    ("healthy_threshold", true),
    ("unhealthy_threshold", true),
    ("matcher", false),
];

/// Attribute name used for attachment counts.
const ATTACHMENTS: &str = "attachments";

fn default_count_keys() -> Vec<String> {
    vec!["ip".to_owned(), "instances".to_owned()]
}

/// A declared check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Check {
    /// Compares a string-map output with the live resource's health check.
    HealthCheck {
        resource_output: String,
        expected_output: String,
    },
    /// Compares the sum of integer members of a map output with the number
    /// of attached targets.
    AttachmentCount {
        resource_output: String,
        count_output: String,
        #[serde(default = "default_count_keys")]
        count_keys: Vec<String>,
    },
    /// Compares literal attributes and attributes taken from scenario vars.
    Attributes {
        resource_output: String,
        #[serde(default)]
        expected: BTreeMap<String, AttributeValue>,
        /// attribute name → var name
        #[serde(default)]
        from_vars: BTreeMap<String, String>,
    },
    /// Asserts that outputs exist with the given kinds. No provider query.
    OutputPresent { outputs: BTreeMap<String, OutputKind> },
}

/// Why a check could not be evaluated.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("var '{name}': {reason}")]
    Var { name: String, reason: String },
}

/// A check bound to concrete identifiers and expectations.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    /// Compare `expected` with `describe_resource(id)`.
    Resource { id: String, expected: ExpectedState },
    /// Compare `expected` with the length of `list_attachments(id)`.
    Attachments { id: String, expected: i64 },
    /// Already decided without a provider.
    Local(MismatchReport),
}

impl Check {
    /// Short label for reports, e.g. `health_check(target_group_arn)`.
    pub fn label(&self) -> String {
        match self {
            Self::HealthCheck { resource_output, .. } => format!("health_check({resource_output})"),
            Self::AttachmentCount { resource_output, .. } => {
                format!("attachment_count({resource_output})")
            }
            Self::Attributes { resource_output, .. } => format!("attributes({resource_output})"),
            Self::OutputPresent { outputs } => {
                let names: Vec<&str> = outputs.keys().map(String::as_str).collect();
                format!("output_present({})", names.join(", "))
            }
        }
    }

    /// True when evaluating this check queries the provider.
    pub fn needs_provider(&self) -> bool {
        !matches!(self, Self::OutputPresent { .. })
    }

    /// Returns a description of the first problem with the declaration.
    pub fn validate(&self) -> Result<(), String> {
        let non_empty = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(format!("{field} must not be empty"))
            } else {
                Ok(())
            }
        };
        match self {
            Self::HealthCheck {
                resource_output,
                expected_output,
            } => {
                non_empty("resource_output", resource_output)?;
                non_empty("expected_output", expected_output)
            }
            Self::AttachmentCount {
                resource_output,
                count_output,
                count_keys,
            } => {
                non_empty("resource_output", resource_output)?;
                non_empty("count_output", count_output)?;
                if count_keys.is_empty() {
                    return Err("count_keys must not be empty".to_owned());
                }
                Ok(())
            }
            Self::Attributes {
                resource_output,
                expected,
                from_vars,
            } => {
                non_empty("resource_output", resource_output)?;
                if expected.is_empty() && from_vars.is_empty() {
                    return Err("expected or from_vars must name at least one attribute".to_owned());
                }
                Ok(())
            }
            Self::OutputPresent { outputs } => {
                if outputs.is_empty() {
                    return Err("outputs must not be empty".to_owned());
                }
                Ok(())
            }
        }
    }

    /// Binds the check to an applied environment.
    pub fn prepare(&self, outputs: &OutputSet, params: &Params) -> Result<Probe, CheckError> {
        match self {
            Self::HealthCheck {
                resource_output,
                expected_output,
            } => {
                let id = resolve_string(outputs, resource_output)?;
                let declared = resolve_string_map(outputs, expected_output)?;
                let mut expected = ExpectedState::new();
                for &(key, integer) in HEALTH_CHECK_KEYS {
                    if integer {
                        expected.insert(key, map_integer(&declared, expected_output, key)?);
                    } else {
                        let raw = declared
                            .get(key)
                            .ok_or_else(|| OutputError::NotFound(format!("{expected_output}.{key}")))?;
                        expected.insert(key, raw.as_str());
                    }
                }
                Ok(Probe::Resource { id, expected })
            }
            Self::AttachmentCount {
                resource_output,
                count_output,
                count_keys,
            } => {
                let id = resolve_string(outputs, resource_output)?;
                let counts = resolve_string_map(outputs, count_output)?;
                let mut expected = 0i64;
                for key in count_keys {
                    let count = map_integer(&counts, count_output, key)?;
                    expected = expected.checked_add(count).ok_or_else(|| {
                        OutputError::Parse(ParseError {
                            name: format!("{count_output}.{key}"),
                            input: count.to_string(),
                            reason: "attachment count total overflows i64".to_owned(),
                        })
                    })?;
                }
                Ok(Probe::Attachments { id, expected })
            }
            Self::Attributes {
                resource_output,
                expected,
                from_vars,
            } => {
                let id = resolve_string(outputs, resource_output)?;
                let mut state: ExpectedState = expected.clone().into_iter().collect();
                for (attribute, var) in from_vars {
                    let value = params.get(var).ok_or_else(|| CheckError::Var {
                        name: var.clone(),
                        reason: "not set in scenario vars".to_owned(),
                    })?;
                    let value = AttributeValue::from_json(value).ok_or_else(|| CheckError::Var {
                        name: var.clone(),
                        reason: "not a scalar".to_owned(),
                    })?;
                    state.insert(attribute.as_str(), value);
                }
                Ok(Probe::Resource { id, expected: state })
            }
            Self::OutputPresent { outputs: wanted } => {
                let entries = wanted
                    .iter()
                    .filter_map(|(name, kind)| {
                        let observed = match resolve(outputs, name, *kind) {
                            Ok(_) => return None,
                            Err(OutputError::NotFound(_)) => None,
                            Err(e) => Some(AttributeValue::Str(e.to_string())),
                        };
                        Some(Mismatch {
                            attribute: name.clone(),
                            expected: AttributeValue::Str(kind.to_string()),
                            observed,
                        })
                    })
                    .collect();
                Ok(Probe::Local(MismatchReport::new(entries)))
            }
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Probe {
    /// Queries the provider once and compares.
    pub async fn observe<F: StateFetcher>(&self, fetcher: &F) -> Result<MismatchReport, FetchError> {
        match self {
            Self::Resource { id, expected } => {
                let observed = fetcher.describe_resource(id).await?;
                Ok(compare(expected, &observed))
            }
            Self::Attachments { id, expected } => {
                let attached = fetcher.list_attachments(id).await?;
                let observed =
                    ObservedState::new().with(ATTACHMENTS, i64::try_from(attached.len()).unwrap_or(i64::MAX));
                Ok(compare(
                    &ExpectedState::new().with(ATTACHMENTS, *expected),
                    &observed,
                ))
            }
            Self::Local(report) => Ok(report.clone()),
        }
    }
}
