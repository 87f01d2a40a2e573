//! Domain types for remote catalog collection with strong typing.
//!
//! Newtype ids keep source ids from being mixed with record or category ids,
//! and the small enums here replace the stringly-typed switches a source
//! configuration is stored as.

pub mod events;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a configured collection source.
///
/// # Examples
///
/// ```rust
/// use catalog_collect::domain::SourceId;
///
/// let id = SourceId::new(7);
/// assert_eq!(id.value(), 7);
/// assert_eq!(id.to_string(), "7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourceId(i32);

impl SourceId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        debug_assert!(id >= 0, "SourceId should be non-negative");
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SourceId> for i32 {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

impl From<i32> for SourceId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl Serialize for SourceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(self.0)
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i32::deserialize(deserializer)?;
        Ok(Self::new(id))
    }
}

/// The six content kinds a remote catalog can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Video,
    Article,
    Actor,
    Role,
    Website,
    Manga,
}

impl ContentKind {
    pub const ALL: [Self; 6] = [
        Self::Video,
        Self::Article,
        Self::Actor,
        Self::Role,
        Self::Website,
        Self::Manga,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Article => "article",
            Self::Actor => "actor",
            Self::Role => "role",
            Self::Website => "website",
            Self::Manga => "manga",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" | "vod" => Ok(Self::Video),
            "article" | "art" => Ok(Self::Article),
            "actor" => Ok(Self::Actor),
            "role" => Ok(Self::Role),
            "website" => Ok(Self::Website),
            "manga" | "comic" => Ok(Self::Manga),
            other => Err(format!("unknown content kind: {other}")),
        }
    }
}

/// Wire format a source publishes its listings in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    Xml,
    Json,
    #[default]
    Auto,
}

impl WireFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Json => "json",
            Self::Auto => "auto",
        }
    }
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" => Ok(Self::Xml),
            "json" => Ok(Self::Json),
            "" | "auto" => Ok(Self::Auto),
            other => Err(format!("unknown wire format: {other}")),
        }
    }
}

/// Whether a source may insert new records, update existing ones, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceMode {
    InsertOnly,
    UpdateOnly,
    #[default]
    Both,
}

impl SourceMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InsertOnly => "insertOnly",
            Self::UpdateOnly => "updateOnly",
            Self::Both => "both",
        }
    }

    #[must_use]
    pub const fn allows_insert(self) -> bool {
        matches!(self, Self::InsertOnly | Self::Both)
    }

    #[must_use]
    pub const fn allows_update(self) -> bool {
        matches!(self, Self::UpdateOnly | Self::Both)
    }
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "insertOnly" | "insert" | "1" => Ok(Self::InsertOnly),
            "updateOnly" | "update" | "2" => Ok(Self::UpdateOnly),
            "" | "both" | "0" => Ok(Self::Both),
            other => Err(format!("unknown source mode: {other}")),
        }
    }
}

/// How an incoming play/download group is combined with an existing group of
/// the same source label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMergePolicy {
    Replace,
    #[default]
    Union,
}

impl GroupMergePolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Union => "union",
        }
    }
}

impl FromStr for GroupMergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "union" | "merge" => Ok(Self::Union),
            other => Err(format!("unknown group merge policy: {other}")),
        }
    }
}
