//! Caller-supplied field specifications and resolution to canonical keys.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// One field the caller wants filled in.
///
/// Arrives either as a bare JSON string or as an object carrying optional
/// `id` / `name` / `label` / `type` members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    Name(String),
    Descriptor(FieldDescriptor),
}

/// Rich form-field metadata, as scraped from an HTML form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Free-form type hint ("text", "money", "date", ...). Advisory only.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
}

#[derive(Error, Debug)]
pub enum FieldSpecError {
    #[error("No form fields provided")]
    Missing,
    #[error("Form fields list is empty")]
    Empty,
    #[error("Invalid formFields JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl FieldSpec {
    /// Canonical key for this spec: label, then name, then id, then a
    /// positional `field_<index>` placeholder. Blank values are skipped.
    pub fn resolved_key(&self, index: usize) -> String {
        let key = match self {
            FieldSpec::Name(name) => non_blank(Some(name)),
            FieldSpec::Descriptor(d) => non_blank(d.label.as_ref())
                .or_else(|| non_blank(d.name.as_ref()))
                .or_else(|| non_blank(d.id.as_ref())),
        };
        match key {
            Some(k) => k.to_string(),
            None => format!("field_{index}"),
        }
    }

    pub fn field_type(&self) -> Option<&str> {
        match self {
            FieldSpec::Name(_) => None,
            FieldSpec::Descriptor(d) => non_blank(d.field_type.as_ref()),
        }
    }
}

/// Resolve every spec to its key, preserving request order and duplicates.
pub fn resolve_keys(specs: &[FieldSpec]) -> Vec<String> {
    specs
        .iter()
        .enumerate()
        .map(|(i, spec)| spec.resolved_key(i))
        .collect()
}

/// Parse the `formFields` form value: a JSON array of strings and/or
/// descriptor objects. Rejects blank input and empty arrays.
pub fn parse_field_specs(raw: &str) -> Result<Vec<FieldSpec>, FieldSpecError> {
    if raw.trim().is_empty() {
        return Err(FieldSpecError::Missing);
    }
    let specs: Vec<FieldSpec> = serde_json::from_str(raw)?;
    if specs.is_empty() {
        return Err(FieldSpecError::Empty);
    }
    Ok(specs)
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}
