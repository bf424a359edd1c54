//! Normalization of raw oracle completions into field values.
//!
//! Steps, in order:
//! 1. [`strip_code_fence`] removes a "```json" markdown wrapper.
//! 2. [`parse_completion`] parses the remainder strictly as a JSON object.
//! 3. [`reconcile`] checks the returned keys against the requested ones and
//!    coerces each value to `Option<String>`.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::FieldValues;

pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse model response as JSON";

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("{}", PARSE_FAILURE_MESSAGE)]
    NotJson(#[source] serde_json::Error),
    #[error("{}", PARSE_FAILURE_MESSAGE)]
    NotObject,
    #[error("{0}")]
    KeySetMismatch(KeySetMismatch),
}

/// Difference between the requested key set and the one the oracle returned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeySetMismatch {
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
}

impl fmt::Display for KeySetMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model response keys did not match requested fields")?;
        if !self.missing.is_empty() {
            write!(f, "; missing: {}", self.missing.join(", "))?;
        }
        if !self.unexpected.is_empty() {
            write!(f, "; unexpected: {}", self.unexpected.join(", "))?;
        }
        Ok(())
    }
}

impl KeySetMismatch {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Remove a leading "```json" fence and its closing "```", if the completion
/// starts with one. Anything else is returned untouched.
pub fn strip_code_fence(raw: &str) -> &str {
    match raw.trim().strip_prefix(JSON_FENCE) {
        Some(rest) => rest.trim_end().strip_suffix(FENCE).unwrap_or(rest).trim(),
        None => raw,
    }
}

/// Parse a completion as a JSON object, after fence stripping.
pub fn parse_completion(raw: &str) -> Result<Map<String, Value>, ResponseError> {
    let body = strip_code_fence(raw);
    match serde_json::from_str::<Value>(body).map_err(ResponseError::NotJson)? {
        Value::Object(map) => Ok(map),
        _ => Err(ResponseError::NotObject),
    }
}

/// Compare the returned keys with `requested` (duplicates collapse).
pub fn key_set_difference(object: &Map<String, Value>, requested: &[String]) -> KeySetMismatch {
    let wanted: BTreeSet<&str> = requested.iter().map(String::as_str).collect();
    let got: BTreeSet<&str> = object.keys().map(String::as_str).collect();

    KeySetMismatch {
        missing: wanted.difference(&got).map(|k| k.to_string()).collect(),
        unexpected: got.difference(&wanted).map(|k| k.to_string()).collect(),
    }
}

/// Turn a parsed object into field values.
///
/// With `enforce` set, any difference from the requested key set is an error.
/// Without it the object passes through as returned, extras included.
pub fn reconcile(
    object: Map<String, Value>,
    requested: &[String],
    enforce: bool,
) -> Result<FieldValues, ResponseError> {
    if enforce {
        let diff = key_set_difference(&object, requested);
        if !diff.is_empty() {
            return Err(ResponseError::KeySetMismatch(diff));
        }
    }

    Ok(object
        .into_iter()
        .map(|(key, value)| (key, coerce_value(value)))
        .collect())
}

/// Coerce one JSON value to the string-or-null shape returned to callers.
pub fn coerce_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other @ (Value::Array(_) | Value::Object(_)) => Some(other.to_string()),
    }
}
