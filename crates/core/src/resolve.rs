//! Output resolution: typed values from an [`OutputSet`].
//!
//! Provisioning engines are loose about scalar representation. A count may
//! arrive as `3` or `"3"`, and map members are often all strings. The resolver
//! normalizes these forms and reports anything else as a typed error. It never
//! panics on bad input.

use std::collections::BTreeMap;

use crate::error::{OutputError, ParseError};
use crate::types::{OutputKind, OutputSet};

/// A resolved output value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    String(String),
    Integer(i64),
    StringMap(BTreeMap<String, String>),
}

/// Resolves `name` from `outputs` as `kind`.
pub fn resolve(outputs: &OutputSet, name: &str, kind: OutputKind) -> Result<Resolved, OutputError> {
    match kind {
        OutputKind::String => resolve_string(outputs, name).map(Resolved::String),
        OutputKind::Integer => resolve_integer(outputs, name).map(Resolved::Integer),
        OutputKind::StringMap => resolve_string_map(outputs, name).map(Resolved::StringMap),
    }
}

/// Resolves a scalar output as a string.
pub fn resolve_string(outputs: &OutputSet, name: &str) -> Result<String, OutputError> {
    let value = lookup(outputs, name)?;
    scalar_to_string(value).ok_or_else(|| type_error(name, OutputKind::String, value))
}

/// Resolves an output as an integer, accepting numeric strings.
pub fn resolve_integer(outputs: &OutputSet, name: &str) -> Result<i64, OutputError> {
    let value = lookup(outputs, name)?;
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| type_error(name, OutputKind::Integer, value)),
        serde_json::Value::String(s) => Ok(parse_integer(name, s)?),
        _ => Err(type_error(name, OutputKind::Integer, value)),
    }
}

/// Resolves a flat object output as a map of strings.
///
/// Scalar members are rendered to strings; nested members are a type error.
pub fn resolve_string_map(
    outputs: &OutputSet,
    name: &str,
) -> Result<BTreeMap<String, String>, OutputError> {
    let value = lookup(outputs, name)?;
    let serde_json::Value::Object(members) = value else {
        return Err(type_error(name, OutputKind::StringMap, value));
    };

    members
        .iter()
        .map(|(key, member)| {
            scalar_to_string(member)
                .map(|s| (key.clone(), s))
                .ok_or_else(|| type_error(&format!("{name}.{key}"), OutputKind::String, member))
        })
        .collect()
}

/// Parses a decimal integer, surrounding whitespace allowed.
pub fn parse_integer(name: &str, input: &str) -> Result<i64, ParseError> {
    input.trim().parse::<i64>().map_err(|e| ParseError {
        name: name.to_owned(),
        input: input.to_owned(),
        reason: e.to_string(),
    })
}

/// Reads `key` from a resolved string map as an integer.
pub fn map_integer(
    map: &BTreeMap<String, String>,
    map_name: &str,
    key: &str,
) -> Result<i64, OutputError> {
    let member = format!("{map_name}.{key}");
    let raw = map.get(key).ok_or_else(|| OutputError::NotFound(member.clone()))?;
    Ok(parse_integer(&member, raw)?)
}

fn lookup<'a>(outputs: &'a OutputSet, name: &str) -> Result<&'a serde_json::Value, OutputError> {
    outputs
        .get(name)
        .ok_or_else(|| OutputError::NotFound(name.to_owned()))
}

fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn type_error(name: &str, expected: OutputKind, found: &serde_json::Value) -> OutputError {
    let found = match found {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "map",
    };
    OutputError::Type {
        name: name.to_owned(),
        expected,
        found: found.to_owned(),
    }
}
