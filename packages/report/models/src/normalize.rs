//! Coercion of raw records into the canonical [`Report`] shape.
//!
//! Every backend stores reports as loosely-typed JSON. Whatever comes back
//! (hand-edited files, documents written by older code, in-memory values)
//! passes through [`normalize_report`] before it reaches a caller, so field
//! presence and types are the same regardless of where a record lived.
//!
//! Normalization is idempotent: feeding a normalized report's JSON back in
//! yields the same report.

use serde_json::{Map, Value};

use crate::{
    DEFAULT_CATEGORY, DEFAULT_SOURCE, DEFAULT_STATUS, MAX_DESCRIPTION_LENGTH, Report,
};

/// Normalizes a raw record. Returns `None` if `raw` is not a JSON object.
#[must_use]
pub fn normalize_report(raw: &Value) -> Option<Report> {
    raw.as_object().map(normalize_object)
}

/// Normalizes a raw JSON object.
///
/// Coordinates are kept only as a pair: if either latitude or longitude
/// fails to coerce, both are `None`.
#[must_use]
pub fn normalize_object(obj: &Map<String, Value>) -> Report {
    let (latitude, longitude) = match (
        obj.get("latitude").and_then(coerce_coordinate),
        obj.get("longitude").and_then(coerce_coordinate),
    ) {
        (Some(lat), Some(lng)) => (Some(lat), Some(lng)),
        _ => (None, None),
    };

    Report {
        id: coerce_id(obj.get("id")),
        category: label_or(obj.get("category"), DEFAULT_CATEGORY),
        description: coerce_description(obj.get("description")),
        latitude,
        longitude,
        photo_url: optional_string(obj.get("photoUrl")),
        contact_name: optional_string(obj.get("contactName")),
        contact_email: optional_string(obj.get("contactEmail")),
        status: label_or(obj.get("status"), DEFAULT_STATUS),
        source: label_or(obj.get("source"), DEFAULT_SOURCE),
        created_at: optional_string(obj.get("createdAt")),
        updated_at: optional_string(obj.get("updatedAt")),
    }
}

/// Coerces a raw coordinate.
///
/// Accepts a JSON number or a numeric-looking string (surrounding
/// whitespace allowed). Everything else, including non-finite values such
/// as `"NaN"` or `"Infinity"`, is `None`. Never defaults to zero.
#[must_use]
pub fn coerce_coordinate(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn coerce_id(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn label_or(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn coerce_description(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(|s| s.chars().take(MAX_DESCRIPTION_LENGTH).collect())
        .unwrap_or_default()
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}
