//! Record shapes that flow through the pipeline: the raw decoded unit, the
//! canonical typed record, the stored row it is compared against, and the
//! patch staged for an update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::ContentKind;

/// A typed field value.
///
/// Serialized untagged so the stored JSON stays a plain object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Empty text and zero numbers count as "no value" when merging.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Int(v) => *v == 0,
            Self::Float(v) => *v == 0.0,
            Self::Text(s) => s.trim().is_empty(),
        }
    }

    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// One playable or downloadable entry inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub label: String,
    pub url: String,
}

impl Episode {
    #[must_use]
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// A named set of episodes from one upstream source label (one player/CDN).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayGroup {
    pub source_label: String,
    pub episodes: Vec<Episode>,
    pub server_tag: String,
    pub note: String,
}

/// A group exactly as the wire delivered it, before episode parsing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawGroup {
    pub label: String,
    pub server: String,
    pub note: String,
    pub episodes: String,
}

/// The raw decoded unit of one page.
///
/// `fields` is keyed by canonical field name; decoders translate wire keys
/// through the kind schema before filling it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub kind: ContentKind,
    pub remote_id: String,
    pub remote_category_id: String,
    pub fields: BTreeMap<String, String>,
    pub play: Vec<RawGroup>,
    pub down: Vec<RawGroup>,
}

impl RemoteRecord {
    #[must_use]
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            remote_id: String::new(),
            remote_category_id: String::new(),
            fields: BTreeMap::new(),
            play: Vec::new(),
            down: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", String::as_str)
    }

    #[must_use]
    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }
}

/// A remote record after normalization: typed, filtered, derived.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub kind: ContentKind,
    pub remote_id: String,
    pub category_id: i32,
    pub parent_category_id: i32,
    pub fields: BTreeMap<String, FieldValue>,
    pub play: Vec<PlayGroup>,
    pub down: Vec<PlayGroup>,
}

impl CanonicalRecord {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Text form of a field, empty when absent.
    #[must_use]
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).map(FieldValue::as_text).unwrap_or_default()
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.text("name")
    }
}

/// A row of the local store as seen by the merge engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: i32,
    pub kind: ContentKind,
    pub category_id: i32,
    pub locked: bool,
    pub fields: BTreeMap<String, FieldValue>,
    pub play: Vec<PlayGroup>,
    pub down: Vec<PlayGroup>,
}

impl StoredRecord {
    #[must_use]
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).map(FieldValue::as_text).unwrap_or_default()
    }
}

/// Fields staged for an update of an existing row.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPatch {
    pub fields: BTreeMap<String, FieldValue>,
    pub play: Option<Vec<PlayGroup>>,
    pub down: Option<Vec<PlayGroup>>,
    pub updated_at: DateTime<Utc>,
}

impl FieldPatch {
    #[must_use]
    pub fn new(updated_at: DateTime<Utc>) -> Self {
        Self {
            fields: BTreeMap::new(),
            play: None,
            down: None,
            updated_at,
        }
    }

    /// True when nothing but the timestamp would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.play.is_none() && self.down.is_none()
    }

    /// Names of the staged columns, for outcome lines and logs.
    #[must_use]
    pub fn changed(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.keys().cloned().collect();
        if self.play.is_some() {
            names.push("play".to_string());
        }
        if self.down.is_some() {
            names.push("down".to_string());
        }
        names
    }
}
