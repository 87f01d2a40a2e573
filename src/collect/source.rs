//! Operator-configured collection sources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{ContentKind, GroupMergePolicy, SourceId, SourceMode, WireFormat};

/// Per-kind behavior of a source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KindRules {
    pub mode: SourceMode,
    /// Dedup rule letters, e.g. `"ab"` for name + category.
    pub dedup: String,
    /// Merge rule letters; empty means existing records are never updated.
    pub merge: String,
}

/// A remote catalog the operator registered.
///
/// Created and edited by the operator, read on every run, never written by
/// the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSource {
    pub id: SourceId,
    pub name: String,
    pub base_url: String,
    pub format: WireFormat,
    /// Appended verbatim to every query string.
    pub query_suffix: String,
    pub rules: BTreeMap<ContentKind, KindRules>,
    pub sync_images: bool,
    /// Records whose name contains any of these are dropped.
    pub name_filter: Vec<String>,
    /// Years accepted; empty accepts every year.
    pub year_filter: Vec<String>,
    /// Play source labels accepted; empty accepts all.
    pub play_sources: Vec<String>,
    pub down_sources: Vec<String>,
    /// Falls back to `collect.group_merge_policy` when unset.
    pub group_merge: Option<GroupMergePolicy>,
}

impl CollectionSource {
    #[must_use]
    pub fn new(id: SourceId, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            base_url: base_url.into(),
            format: WireFormat::Auto,
            query_suffix: String::new(),
            rules: BTreeMap::new(),
            sync_images: false,
            name_filter: Vec::new(),
            year_filter: Vec::new(),
            play_sources: Vec::new(),
            down_sources: Vec::new(),
            group_merge: None,
        }
    }

    /// Rules for a kind, defaulting to "both, dedup by name, never merge".
    #[must_use]
    pub fn rules_for(&self, kind: ContentKind) -> KindRules {
        self.rules.get(&kind).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn group_merge_or(&self, global: GroupMergePolicy) -> GroupMergePolicy {
        self.group_merge.unwrap_or(global)
    }

    #[must_use]
    pub fn with_rules(mut self, kind: ContentKind, rules: KindRules) -> Self {
        self.rules.insert(kind, rules);
        self
    }
}
