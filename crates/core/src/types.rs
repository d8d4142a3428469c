//! Domain types shared by the driver, fetchers and runner.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionOperation;

/// Module parameters, name to value. Values may be scalars or nested maps.
pub type Params = BTreeMap<String, serde_json::Value>;

/// Cloud provider an environment is provisioned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Aws,
    Azure,
    Gcp,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
        };
        f.write_str(name)
    }
}

/// The unit of provisioning.
///
/// Owned by exactly one scenario. The `id` keys the environment's private
/// engine state so parallel environments never share it.
#[derive(Debug, Clone, Serialize)]
pub struct Environment {
    /// Unique environment id
    pub id: String,
    /// Module directory
    pub module_path: PathBuf,
    /// Input variables
    pub params: Params,
    /// Variable files, relative to the module directory unless absolute
    pub var_files: Vec<PathBuf>,
    /// Provider identity
    pub provider: ProviderKind,
}

impl Environment {
    /// Creates an environment with a fresh id and no parameters.
    pub fn new(module_path: impl Into<PathBuf>, provider: ProviderKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            module_path: module_path.into(),
            params: Params::new(),
            var_files: Vec::new(),
            provider,
        }
    }

    /// Replaces the parameter set.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Sets a single parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Replaces the variable file list.
    pub fn with_var_files(mut self, var_files: Vec<PathBuf>) -> Self {
        self.var_files = var_files;
        self
    }

    /// Short id prefix for log fields.
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(8)]
    }
}

/// Lifecycle state of an [`Environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentState {
    Idle,
    Planning,
    Planned,
    Applying,
    Applied,
    ApplyFailed,
    Destroying,
    Destroyed,
    DestroyFailed,
}

impl EnvironmentState {
    /// Returns true if `operation` may start from this state.
    ///
    /// Destroy is permitted from `Applying` because an apply interrupted by
    /// cancellation may have left live resources behind.
    pub fn permits(self, operation: ProvisionOperation) -> bool {
        match operation {
            ProvisionOperation::Init => matches!(self, Self::Idle),
            ProvisionOperation::Plan | ProvisionOperation::Apply => matches!(self, Self::Idle),
            ProvisionOperation::Output => matches!(self, Self::Applied),
            ProvisionOperation::Destroy => {
                matches!(self, Self::Applying | Self::Applied | Self::ApplyFailed)
            }
        }
    }

    /// True once no further operation is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed | Self::DestroyFailed)
    }

    /// True if live resources may exist in this state.
    pub fn may_hold_resources(self) -> bool {
        matches!(self, Self::Applying | Self::Applied | Self::ApplyFailed)
    }
}

impl fmt::Display for EnvironmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Planned => "planned",
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::ApplyFailed => "apply_failed",
            Self::Destroying => "destroying",
            Self::Destroyed => "destroyed",
            Self::DestroyFailed => "destroy_failed",
        };
        f.write_str(name)
    }
}

/// Immutable output values from a successful apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputSet {
    values: BTreeMap<String, serde_json::Value>,
}

impl OutputSet {
    pub fn new(values: BTreeMap<String, serde_json::Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, serde_json::Value)> for OutputSet {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Output value kinds the resolver understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    String,
    Integer,
    StringMap,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::StringMap => "string map",
        };
        f.write_str(name)
    }
}

/// A discrete configuration value, as declared or as observed.
///
/// Values of different variants never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl AttributeValue {
    /// Converts a JSON scalar. Arrays, objects, null and non-integer numbers
    /// have no attribute form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_i64().map(Self::Int),
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }
}

macro_rules! attribute_state {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
        pub struct $name {
            attributes: BTreeMap<String, AttributeValue>,
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            /// Builder-style insert.
            pub fn with(mut self, attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
                self.insert(attribute, value);
                self
            }

            pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<AttributeValue>) {
                self.attributes.insert(attribute.into(), value.into());
            }

            pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
                self.attributes.get(attribute)
            }

            pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
                self.attributes.iter().map(|(k, v)| (k.as_str(), v))
            }

            pub fn len(&self) -> usize {
                self.attributes.len()
            }

            pub fn is_empty(&self) -> bool {
                self.attributes.is_empty()
            }
        }

        impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for $name {
            fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
                let mut state = Self::new();
                for (k, v) in iter {
                    state.insert(k, v);
                }
                state
            }
        }
    };
}

attribute_state!(
    /// Attributes a live resource must match.
    ExpectedState
);

attribute_state!(
    /// Attributes read from the provider control plane at query time.
    ObservedState
);

/// One attribute that disagrees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub attribute: String,
    pub expected: AttributeValue,
    /// `None` when the attribute is absent from the observation
    pub observed: Option<AttributeValue>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.observed {
            Some(observed) => write!(
                f,
                "{}: expected {}, observed {}",
                self.attribute, self.expected, observed
            ),
            None => write!(f, "{}: expected {}, observed <absent>", self.attribute, self.expected),
        }
    }
}

/// All disagreements found by one comparison. Empty means full agreement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MismatchReport {
    entries: Vec<Mismatch>,
}

impl MismatchReport {
    pub fn new(entries: Vec<Mismatch>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Mismatch] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl IntoIterator for MismatchReport {
    type Item = Mismatch;
    type IntoIter = std::vec::IntoIter<Mismatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Health of one target attached to a load-balancing resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthRecord {
    pub target_id: String,
    pub port: Option<i32>,
    pub state: String,
    pub reason: Option<String>,
}

/// Planned change counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanResult {
    pub to_add: u32,
    pub to_change: u32,
    pub to_destroy: u32,
}

impl PlanResult {
    pub fn has_changes(&self) -> bool {
        self.to_add + self.to_change + self.to_destroy > 0
    }
}

impl fmt::Display for PlanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_changes() {
            write!(
                f,
                "{} to add, {} to change, {} to destroy",
                self.to_add, self.to_change, self.to_destroy
            )
        } else {
            f.write_str("no changes")
        }
    }
}
