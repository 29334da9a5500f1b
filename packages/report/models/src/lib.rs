#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Citizen report types, query options, and field normalization.
//!
//! A [`Report`] is the canonical shape every storage backend hands back to
//! callers. Raw records (parsed from disk, fetched from a document database,
//! or assembled in memory) are coerced into that shape by
//! [`normalize_report`], which is the only way a [`Report`] is produced from
//! untrusted data.

pub mod normalize;

pub use normalize::{coerce_coordinate, normalize_object, normalize_report};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of reports returned by a listing when no limit is given.
pub const DEFAULT_LIMIT: usize = 100;

/// Smallest limit a listing will honor.
pub const MIN_LIMIT: usize = 1;

/// Largest limit a listing will honor.
pub const MAX_LIMIT: usize = 500;

/// Maximum description length in characters. Longer text is truncated.
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Category assigned when a record carries none.
pub const DEFAULT_CATEGORY: &str = "other";

/// Lifecycle status assigned at creation.
pub const DEFAULT_STATUS: &str = "open";

/// Provenance tag assigned at creation.
pub const DEFAULT_SOURCE: &str = "citizen";

/// Fields an update is allowed to touch.
///
/// `updatedAt` is stamped by the repository on every update and is not part
/// of this list.
pub const PATCHABLE_FIELDS: &[&str] = &[
    "category",
    "description",
    "latitude",
    "longitude",
    "photoUrl",
    "contactName",
    "contactEmail",
    "status",
];

/// Fields a creation payload may carry. Everything else (including `id` and
/// the timestamps) is stamped by the repository.
pub const CREATABLE_FIELDS: &[&str] = &[
    "category",
    "description",
    "latitude",
    "longitude",
    "photoUrl",
    "contactName",
    "contactEmail",
    "status",
    "source",
];

/// Known report categories.
///
/// Storage does not enforce this set; a report's `category` is a free-form
/// string. These variants exist so front ends can offer and validate the
/// usual choices.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportCategory {
    /// Urban heat, hot spots, lack of shade
    Heat,
    /// Green space, trees, parks
    Green,
    /// Flooding and drainage problems
    Flooding,
    /// Litter, dumping, overflowing bins
    Waste,
    /// Air quality, smoke, dust
    Air,
    /// Water quality and supply
    Water,
    /// Anything else
    Other,
}

impl ReportCategory {
    /// Returns all known categories.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Heat,
            Self::Green,
            Self::Flooding,
            Self::Waste,
            Self::Air,
            Self::Water,
            Self::Other,
        ]
    }
}

/// Known report lifecycle states.
///
/// Like [`ReportCategory`], the stored `status` is a plain string and this
/// enum only names the values moderation workflows use.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportStatus {
    /// Newly submitted, not yet reviewed
    Open,
    /// Confirmed by a moderator
    Validated,
    /// Being acted upon
    InProgress,
    /// Addressed
    Resolved,
    /// Rejected as invalid or duplicate
    Rejected,
}

/// A citizen-submitted environmental observation in canonical form.
///
/// Serializes with every field present; absent optional values are written
/// as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Opaque unique identifier, stamped at creation.
    pub id: String,
    /// Free-form category, usually one of [`ReportCategory`].
    pub category: String,
    /// Free text, at most [`MAX_DESCRIPTION_LENGTH`] characters.
    pub description: String,
    /// Latitude (WGS84), `None` when absent or invalid.
    pub latitude: Option<f64>,
    /// Longitude (WGS84), `None` when absent or invalid.
    pub longitude: Option<f64>,
    /// Link to an attached photo.
    pub photo_url: Option<String>,
    /// Name of the reporting citizen.
    pub contact_name: Option<String>,
    /// Email of the reporting citizen.
    pub contact_email: Option<String>,
    /// Lifecycle flag, usually one of [`ReportStatus`].
    pub status: String,
    /// Provenance tag.
    pub source: String,
    /// Creation time (RFC 3339, UTC). Never changes after creation.
    pub created_at: Option<String>,
    /// Last modification time (RFC 3339, UTC).
    pub updated_at: Option<String>,
}

impl Report {
    /// Renders the report as a JSON object with every field present.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::from(self.id.as_str()));
        map.insert("category".to_string(), Value::from(self.category.as_str()));
        map.insert(
            "description".to_string(),
            Value::from(self.description.as_str()),
        );
        map.insert("latitude".to_string(), number_or_null(self.latitude));
        map.insert("longitude".to_string(), number_or_null(self.longitude));
        map.insert("photoUrl".to_string(), string_or_null(self.photo_url.as_deref()));
        map.insert(
            "contactName".to_string(),
            string_or_null(self.contact_name.as_deref()),
        );
        map.insert(
            "contactEmail".to_string(),
            string_or_null(self.contact_email.as_deref()),
        );
        map.insert("status".to_string(), Value::from(self.status.as_str()));
        map.insert("source".to_string(), Value::from(self.source.as_str()));
        map.insert(
            "createdAt".to_string(),
            string_or_null(self.created_at.as_deref()),
        );
        map.insert(
            "updatedAt".to_string(),
            string_or_null(self.updated_at.as_deref()),
        );
        Value::Object(map)
    }

    /// Returns the coordinates as `(latitude, longitude)` when both are
    /// present.
    #[must_use]
    pub const fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// Sort key for listings. Records without a creation time sort last.
    #[must_use]
    pub fn created_at_key(&self) -> &str {
        self.created_at.as_deref().unwrap_or("")
    }
}

fn number_or_null(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::from)
}

fn string_or_null(value: Option<&str>) -> Value {
    value.map_or(Value::Null, Value::from)
}

/// A geographic bounding box in WGS84 coordinates.
///
/// Equivalent to the ordered sequence `[minLng, minLat, maxLng, maxLat]`.
/// Edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Builds a box from `[minLng, minLat, maxLng, maxLat]`.
    ///
    /// Returns `None` unless there are exactly four finite values.
    #[must_use]
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [west, south, east, north] if values.iter().all(|v| v.is_finite()) => {
                Some(Self::new(*west, *south, *east, *north))
            }
            _ => None,
        }
    }

    /// Parses `"west,south,east,north"`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>().ok())
            .collect::<Option<_>>()?;
        Self::from_slice(&parts)
    }

    /// Builds a box from a raw JSON value: a four-element array of numbers
    /// (or numeric strings), or a `"west,south,east,north"` string.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => {
                let parts: Vec<f64> = items.iter().map(coerce_coordinate).collect::<Option<_>>()?;
                Self::from_slice(&parts)
            }
            Value::String(s) => Self::parse(s),
            _ => None,
        }
    }

    /// Whether the point lies inside the box, edges included.
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        longitude >= self.west
            && longitude <= self.east
            && latitude >= self.south
            && latitude <= self.north
    }
}

/// Clamps a requested listing limit into `[MIN_LIMIT, MAX_LIMIT]`.
///
/// Absent or non-numeric (`NaN`) limits fall back to [`DEFAULT_LIMIT`].
/// Fractional limits truncate toward zero.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn clamp_limit(limit: Option<f64>) -> usize {
    match limit {
        Some(n) if !n.is_nan() => n.trunc().clamp(MIN_LIMIT as f64, MAX_LIMIT as f64) as usize,
        _ => DEFAULT_LIMIT,
    }
}

/// Filters and limit for a report listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    /// Requested maximum number of results, clamped by [`clamp_limit`].
    pub limit: Option<f64>,
    /// Spatial filter. Reports without coordinates never match.
    pub bbox: Option<BoundingBox>,
    /// Exact-match status filter.
    pub status: Option<String>,
    /// Exact-match category filter.
    pub category: Option<String>,
}

impl ListOptions {
    /// Builds options from raw query input.
    ///
    /// `limit` accepts a number or a numeric string; anything else is
    /// treated as absent. `bbox` accepts anything [`BoundingBox::from_value`]
    /// does. Empty `status`/`category` strings are ignored.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        Self {
            limit: obj.get("limit").and_then(parse_limit),
            bbox: obj.get("bbox").and_then(BoundingBox::from_value),
            status: non_empty_string(obj.get("status")),
            category: non_empty_string(obj.get("category")),
        }
    }

    /// The effective limit after clamping.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        clamp_limit(self.limit)
    }

    /// Whether a report passes the status, category, and bbox filters.
    #[must_use]
    pub fn matches(&self, report: &Report) -> bool {
        if self
            .status
            .as_deref()
            .is_some_and(|status| report.status != status)
        {
            return false;
        }
        if self
            .category
            .as_deref()
            .is_some_and(|category| report.category != category)
        {
            return false;
        }
        match self.bbox {
            None => true,
            Some(bbox) => report
                .coordinates()
                .is_some_and(|(lat, lng)| bbox.contains(lat, lng)),
        }
    }
}

fn parse_limit(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Payload for creating a report.
///
/// Holds raw JSON values for the creatable fields only; coordinates may be
/// numbers or numeric strings and are coerced on normalization. Anything
/// outside [`CREATABLE_FIELDS`] (notably `id`, `createdAt`, `updatedAt`) is
/// dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewReport {
    fields: Map<String, Value>,
}

impl NewReport {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a payload from a raw JSON object, keeping only creatable
    /// fields. Non-objects yield an empty payload.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self {
            fields: allowed_fields(value, CREATABLE_FIELDS),
        }
    }

    /// Sets a creatable field. Returns `false` (and ignores the value) for
    /// any other field name.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> bool {
        if !CREATABLE_FIELDS.contains(&field) {
            return false;
        }
        self.fields.insert(field.to_string(), value.into());
        true
    }

    /// Sets the category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.set("category", category.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.set("description", description.into());
        self
    }

    /// Sets the raw latitude (number or numeric string).
    #[must_use]
    pub fn latitude(mut self, latitude: impl Into<Value>) -> Self {
        self.set("latitude", latitude);
        self
    }

    /// Sets the raw longitude (number or numeric string).
    #[must_use]
    pub fn longitude(mut self, longitude: impl Into<Value>) -> Self {
        self.set("longitude", longitude);
        self
    }

    /// Sets the photo URL.
    #[must_use]
    pub fn photo_url(mut self, url: impl Into<String>) -> Self {
        self.set("photoUrl", url.into());
        self
    }

    /// Sets the contact name.
    #[must_use]
    pub fn contact_name(mut self, name: impl Into<String>) -> Self {
        self.set("contactName", name.into());
        self
    }

    /// Sets the contact email.
    #[must_use]
    pub fn contact_email(mut self, email: impl Into<String>) -> Self {
        self.set("contactEmail", email.into());
        self
    }

    /// Stamps identity and timestamps onto the payload and normalizes it.
    ///
    /// `createdAt` and `updatedAt` both receive `timestamp`. Missing
    /// `status`/`source` take their defaults.
    #[must_use]
    pub fn into_report(self, id: String, timestamp: &str) -> Report {
        let mut map = self.fields;
        map.insert("id".to_string(), Value::String(id));
        map.insert("createdAt".to_string(), Value::from(timestamp));
        map.insert("updatedAt".to_string(), Value::from(timestamp));
        map.entry("status")
            .or_insert_with(|| Value::from(DEFAULT_STATUS));
        map.entry("source")
            .or_insert_with(|| Value::from(DEFAULT_SOURCE));

        normalize_object(&map)
    }
}

/// A partial update restricted to [`PATCHABLE_FIELDS`].
///
/// Applied as a shallow merge: fields present in the patch replace the
/// stored values, everything else is kept. Setting a field to `null`
/// clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportPatch {
    fields: Map<String, Value>,
    updated_at: Option<String>,
}

impl ReportPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a patch from a raw JSON object, silently dropping fields that
    /// are not patchable (`id`, `createdAt`, `source`, ...).
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self {
            fields: allowed_fields(value, PATCHABLE_FIELDS),
            updated_at: None,
        }
    }

    /// Sets a patchable field. Returns `false` (and ignores the value) for
    /// any other field name.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> bool {
        if !PATCHABLE_FIELDS.contains(&field) {
            return false;
        }
        self.fields.insert(field.to_string(), value.into());
        true
    }

    /// Sets the status.
    #[must_use]
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.set("status", status.into());
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.set("category", category.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.set("description", description.into());
        self
    }

    /// Sets the raw latitude.
    #[must_use]
    pub fn latitude(mut self, latitude: impl Into<Value>) -> Self {
        self.set("latitude", latitude);
        self
    }

    /// Sets the raw longitude.
    #[must_use]
    pub fn longitude(mut self, longitude: impl Into<Value>) -> Self {
        self.set("longitude", longitude);
        self
    }

    /// Sets the photo link.
    #[must_use]
    pub fn photo_url(mut self, url: impl Into<String>) -> Self {
        self.set("photoUrl", url.into());
        self
    }

    /// Sets the reporter's name.
    #[must_use]
    pub fn contact_name(mut self, name: impl Into<String>) -> Self {
        self.set("contactName", name.into());
        self
    }

    /// Sets the reporter's email.
    #[must_use]
    pub fn contact_email(mut self, email: impl Into<String>) -> Self {
        self.set("contactEmail", email.into());
        self
    }

    /// Stamps the modification time carried alongside the patched fields.
    #[must_use]
    pub fn stamped(mut self, updated_at: impl Into<String>) -> Self {
        self.updated_at = Some(updated_at.into());
        self
    }

    /// Whether the patch carries no field changes (a stamp alone does not
    /// count).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The modification time stamped onto this patch, if any.
    #[must_use]
    pub fn updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }

    /// All fields this patch writes, including `updatedAt` when stamped.
    ///
    /// This is the field set a document database merge-write receives.
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = self.fields.clone();
        if let Some(updated_at) = &self.updated_at {
            fields.insert("updatedAt".to_string(), Value::from(updated_at.as_str()));
        }
        fields
    }

    /// The fields a partial write must store so that the stored record ends
    /// up equal to [`Self::merge_into`] of `existing`.
    ///
    /// Every patched field (plus `updatedAt`) is taken from the normalized
    /// merge, so empty labels carry their defaults and unusable values are
    /// replaced by `null`. Touching either coordinate writes both, since an
    /// invalid coordinate clears the pair.
    #[must_use]
    pub fn canonical_fields(&self, existing: &Report) -> Map<String, Value> {
        let Value::Object(merged) = self.merge_into(existing).to_value() else {
            return self.to_fields();
        };

        let mut keys: Vec<String> = self.to_fields().into_iter().map(|(k, _)| k).collect();
        if keys.iter().any(|k| k == "latitude" || k == "longitude") {
            keys.extend(["latitude".to_string(), "longitude".to_string()]);
        }

        keys.into_iter()
            .filter_map(|key| merged.get(&key).cloned().map(|value| (key, value)))
            .collect()
    }

    /// Shallow-merges the patch over `existing` and normalizes the result.
    #[must_use]
    pub fn merge_into(&self, existing: &Report) -> Report {
        let Value::Object(mut map) = existing.to_value() else {
            return existing.clone();
        };
        map.extend(self.to_fields());
        normalize_object(&map)
    }
}

fn allowed_fields(value: &Value, allowed: &[&str]) -> Map<String, Value> {
    value
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(key, _)| allowed.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default()
}
