//! Conversion between plain JSON and Firestore's typed value encoding.
//!
//! The Firestore REST API wraps every field value in a single-key object
//! naming its type (`{"stringValue": "heat"}`, `{"doubleValue": -12.05}`,
//! `{"integerValue": "3"}`, ...). Reports are stored as plain JSON
//! everywhere else, so documents are encoded on the way in and decoded on
//! the way out.

use serde_json::{Map, Value, json};

/// Encodes a plain JSON value as a Firestore `Value`.
#[must_use]
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => n.as_i64().map_or_else(
            || json!({ "doubleValue": n.as_f64() }),
            |i| json!({ "integerValue": i.to_string() }),
        ),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encodes every field of a plain JSON object.
#[must_use]
pub fn encode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Decodes a Firestore `Value` into plain JSON.
///
/// Timestamps and references decode to their string form, geo points to
/// `{"latitude", "longitude"}` objects. Unrecognized encodings and
/// non-finite doubles decode to `null`.
#[must_use]
pub fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|obj| obj.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "booleanValue" => inner.as_bool().map_or(Value::Null, Value::Bool),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map_or(Value::Null, Value::from),
            Value::Number(n) => Value::Number(n.clone()),
            _ => Value::Null,
        },
        "doubleValue" => inner
            .as_f64()
            .filter(|f| f.is_finite())
            .map_or(Value::Null, Value::from),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            inner.as_str().map_or(Value::Null, Value::from)
        }
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(decode_fields(inner.get("fields"))),
        "geoPointValue" => json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(Value::Null),
            "longitude": inner.get("longitude").cloned().unwrap_or(Value::Null),
        }),
        _ => Value::Null,
    }
}

/// Decodes a Firestore `fields` object into a plain JSON object.
#[must_use]
pub fn decode_fields(fields: Option<&Value>) -> Map<String, Value> {
    fields
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .map(|(key, value)| (key.clone(), decode_value(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// Extracts the document id (last path segment) from a full document name
/// such as `projects/p/databases/(default)/documents/reports/abc`.
#[must_use]
pub fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
