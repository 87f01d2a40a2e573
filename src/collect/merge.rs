//! Insert/update/skip decisions and field merging.

use chrono::{DateTime, Utc};

use crate::collect::dedup::{BlendPolicy, DedupKey};
use crate::collect::episodes::sort_episodes;
use crate::collect::error::{CollectResult, SkipReason};
use crate::collect::record::{CanonicalRecord, FieldPatch, FieldValue, PlayGroup, StoredRecord};
use crate::collect::schema::{MergeTarget, schema};
use crate::collect::source::KindRules;
use crate::collect::store::RecordStore;
use crate::domain::GroupMergePolicy;

/// What to do with one canonical record.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeDecision {
    Insert,
    Update { id: i32, patch: FieldPatch },
    Skip(SkipReason),
}

impl MergeDecision {
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::Insert => "inserted",
            Self::Update { .. } => "updated",
            Self::Skip(reason) => reason.as_str(),
        }
    }
}

/// Combines existing groups with incoming ones by source label.
///
/// New labels are appended. An existing label is either replaced wholesale
/// or unioned: existing episodes first, then incoming episodes with unseen
/// urls, re-sorted by episode number.
#[must_use]
pub fn merge_groups(
    existing: &[PlayGroup],
    incoming: &[PlayGroup],
    policy: GroupMergePolicy,
) -> Vec<PlayGroup> {
    let mut merged = existing.to_vec();

    for group in incoming {
        match merged.iter_mut().find(|g| g.source_label == group.source_label) {
            None => merged.push(group.clone()),
            Some(current) => match policy {
                GroupMergePolicy::Replace => *current = group.clone(),
                GroupMergePolicy::Union => {
                    for ep in &group.episodes {
                        if !current.episodes.iter().any(|e| e.url == ep.url) {
                            current.episodes.push(ep.clone());
                        }
                    }
                    sort_episodes(&mut current.episodes);
                    if !group.server_tag.is_empty() {
                        current.server_tag.clone_from(&group.server_tag);
                    }
                    if !group.note.is_empty() {
                        current.note.clone_from(&group.note);
                    }
                }
            },
        }
    }

    merged
}

/// Serial counters ("updated to episode N") never move backwards.
fn merge_serial(existing: &str, incoming: &str) -> Option<String> {
    let incoming = incoming.trim();
    if incoming.is_empty() {
        return None;
    }

    let merged = match (existing.trim().parse::<u64>(), incoming.parse::<u64>()) {
        (Ok(old), Ok(new)) => old.max(new).to_string(),
        _ => incoming.to_string(),
    };

    (merged != existing.trim()).then_some(merged)
}

pub struct MergeEngine<'a> {
    pub rules: &'a KindRules,
    pub group_policy: GroupMergePolicy,
    pub blend: BlendPolicy,
    pub store: &'a dyn RecordStore,
}

impl MergeEngine<'_> {
    #[must_use]
    pub fn key(&self, record: &CanonicalRecord) -> DedupKey {
        DedupKey::build(record, &self.rules.dedup, self.blend)
    }

    /// Decides the fate of a record against the store.
    pub async fn resolve(
        &self,
        record: &CanonicalRecord,
        key: &DedupKey,
    ) -> CollectResult<MergeDecision> {
        if record.category_id == 0 {
            return Ok(MergeDecision::Skip(SkipReason::CategoryUnbound));
        }

        match self.store.find_match(key).await? {
            None if !self.rules.mode.allows_insert() => {
                Ok(MergeDecision::Skip(SkipReason::NotConfiguredToInsert))
            }
            None => Ok(MergeDecision::Insert),
            Some(existing) => Ok(self.decide_update(record, &existing, Utc::now())),
        }
    }

    /// Stages the merge-rule fields that differ from the stored row.
    #[must_use]
    pub fn decide_update(
        &self,
        record: &CanonicalRecord,
        existing: &StoredRecord,
        now: DateTime<Utc>,
    ) -> MergeDecision {
        if self.rules.merge.trim().is_empty() {
            return MergeDecision::Skip(SkipReason::NoRuleConfigured);
        }
        if existing.locked {
            return MergeDecision::Skip(SkipReason::RecordLocked);
        }
        if !self.rules.mode.allows_update() {
            return MergeDecision::Skip(SkipReason::NotConfiguredToUpdate);
        }

        let schema = schema(record.kind);
        let mut patch = FieldPatch::new(now);

        for letter in self.rules.merge.chars() {
            let Some(target) = schema.merge_target(letter) else {
                continue;
            };

            match target {
                MergeTarget::Field(name) => {
                    let Some(incoming) = record.field(name) else {
                        continue;
                    };
                    if !incoming.is_empty() && existing.fields.get(name) != Some(incoming) {
                        patch.fields.insert(name.to_string(), incoming.clone());
                    }
                }
                MergeTarget::Serial(name) => {
                    if let Some(value) = merge_serial(&existing.text(name), &record.text(name)) {
                        patch.fields.insert(name.to_string(), FieldValue::Text(value));
                    }
                }
                MergeTarget::PlayGroups => {
                    if !record.play.is_empty() {
                        let merged = merge_groups(&existing.play, &record.play, self.group_policy);
                        if merged != existing.play {
                            patch.play = Some(merged);
                        }
                    }
                }
                MergeTarget::DownGroups => {
                    if !record.down.is_empty() {
                        let merged = merge_groups(&existing.down, &record.down, self.group_policy);
                        if merged != existing.down {
                            patch.down = Some(merged);
                        }
                    }
                }
            }
        }

        if patch.is_empty() {
            MergeDecision::Skip(SkipReason::NoChangedFields)
        } else {
            MergeDecision::Update {
                id: existing.id,
                patch,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::error::CollectError;
    use crate::collect::record::Episode;
    use crate::collect::store::InsertOutcome;
    use crate::domain::{ContentKind, SourceMode};
    use std::collections::BTreeMap;

    struct NoStore;

    #[async_trait::async_trait]
    impl RecordStore for NoStore {
        async fn find_match(&self, _key: &DedupKey) -> CollectResult<Option<StoredRecord>> {
            Ok(None)
        }

        async fn find_by_fingerprint(
            &self,
            _kind: ContentKind,
            _fingerprint: &str,
        ) -> CollectResult<Option<StoredRecord>> {
            Ok(None)
        }

        async fn insert_record(
            &self,
            _record: &CanonicalRecord,
            _fingerprint: &str,
        ) -> CollectResult<InsertOutcome> {
            Err(CollectError::StoreWriteFailure("read-only".into()))
        }

        async fn update_record(&self, _id: i32, _patch: &FieldPatch) -> CollectResult<()> {
            Err(CollectError::StoreWriteFailure("read-only".into()))
        }
    }

    fn group(label: &str, eps: &[(&str, &str)]) -> PlayGroup {
        PlayGroup {
            source_label: label.into(),
            episodes: eps.iter().map(|(l, u)| Episode::new(*l, *u)).collect(),
            ..Default::default()
        }
    }

    fn urls(group: &PlayGroup) -> Vec<&str> {
        group.episodes.iter().map(|e| e.url.as_str()).collect()
    }

    fn record(fields: &[(&str, &str)], play: Vec<PlayGroup>) -> CanonicalRecord {
        CanonicalRecord {
            kind: ContentKind::Video,
            remote_id: "1".into(),
            category_id: 20,
            parent_category_id: 0,
            fields: fields.iter().map(|(k, v)| ((*k).to_string(), FieldValue::from(*v))).collect(),
            play,
            down: vec![],
        }
    }

    fn stored(fields: &[(&str, &str)], play: Vec<PlayGroup>) -> StoredRecord {
        StoredRecord {
            id: 7,
            kind: ContentKind::Video,
            category_id: 20,
            locked: false,
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), FieldValue::from(*v)))
                .collect::<BTreeMap<_, _>>(),
            play,
            down: vec![],
        }
    }

    fn engine(rules: &KindRules) -> MergeEngine<'_> {
        MergeEngine {
            rules,
            group_policy: GroupMergePolicy::Union,
            blend: BlendPolicy::default(),
            store: &NoStore,
        }
    }

    fn rules(mode: SourceMode, merge: &str) -> KindRules {
        KindRules {
            mode,
            dedup: "a".into(),
            merge: merge.into(),
        }
    }

    #[test]
    fn test_union_appends_unseen_episodes_in_order() {
        let existing = vec![group("m3u8", &[("1", "u1"), ("2", "u2")])];
        let incoming = vec![group("m3u8", &[("2", "u2"), ("3", "u3")])];

        let merged = merge_groups(&existing, &incoming, GroupMergePolicy::Union);
        assert_eq!(merged.len(), 1);
        assert_eq!(urls(&merged[0]), vec!["u1", "u2", "u3"]);
    }

    #[test]
    fn test_new_label_is_appended_and_replace_overwrites() {
        let existing = vec![group("m3u8", &[("1", "u1"), ("2", "u2")])];
        let incoming = vec![group("m3u8", &[("1", "n1")]), group("mp4", &[("1", "v1")])];

        let merged = merge_groups(&existing, &incoming, GroupMergePolicy::Replace);
        assert_eq!(merged.len(), 2);
        assert_eq!(urls(&merged[0]), vec!["n1"]);
        assert_eq!(merged[1].source_label, "mp4");
    }

    #[test]
    fn test_serial_never_regresses() {
        assert_eq!(merge_serial("12", "10"), None);
        assert_eq!(merge_serial("12", "13"), Some("13".into()));
        assert_eq!(merge_serial("", "3"), Some("3".into()));
        assert_eq!(merge_serial("12", "完结"), Some("完结".into()));
        assert_eq!(merge_serial("12", ""), None);
    }

    #[test]
    fn test_stages_only_changed_non_empty_fields() {
        let rules = rules(SourceMode::Both, "cdj");
        let incoming = record(&[("serial", "10"), ("remarks", "HD"), ("pic", "")], vec![]);
        let existing = stored(&[("serial", "12"), ("remarks", "SD"), ("pic", "a.jpg")], vec![]);

        let MergeDecision::Update { id, patch } =
            engine(&rules).decide_update(&incoming, &existing, Utc::now())
        else {
            panic!("expected update");
        };
        assert_eq!(id, 7);
        assert_eq!(patch.changed(), vec!["remarks".to_string()]);
    }

    #[test]
    fn test_identical_groups_mean_no_change() {
        let rules = rules(SourceMode::Both, "a");
        let play = vec![group("m3u8", &[("1", "u1")])];
        let decision =
            engine(&rules).decide_update(&record(&[], play.clone()), &stored(&[], play), Utc::now());
        assert_eq!(decision, MergeDecision::Skip(SkipReason::NoChangedFields));
    }

    #[test]
    fn test_skip_reasons_in_precedence_order() {
        let incoming = record(&[("remarks", "HD")], vec![]);
        let mut existing = stored(&[], vec![]);
        existing.locked = true;

        let none = rules(SourceMode::Both, "");
        assert_eq!(
            engine(&none).decide_update(&incoming, &existing, Utc::now()),
            MergeDecision::Skip(SkipReason::NoRuleConfigured)
        );

        let both = rules(SourceMode::Both, "d");
        assert_eq!(
            engine(&both).decide_update(&incoming, &existing, Utc::now()),
            MergeDecision::Skip(SkipReason::RecordLocked)
        );

        existing.locked = false;
        let insert_only = rules(SourceMode::InsertOnly, "d");
        assert_eq!(
            engine(&insert_only).decide_update(&incoming, &existing, Utc::now()),
            MergeDecision::Skip(SkipReason::NotConfiguredToUpdate)
        );
    }

    #[tokio::test]
    async fn test_resolve_unbound_and_update_only() {
        let rules = rules(SourceMode::UpdateOnly, "d");
        let engine = engine(&rules);

        let mut unbound = record(&[("name", "x")], vec![]);
        unbound.category_id = 0;
        let key = engine.key(&unbound);
        assert_eq!(
            engine.resolve(&unbound, &key).await.unwrap(),
            MergeDecision::Skip(SkipReason::CategoryUnbound)
        );

        let bound = record(&[("name", "x")], vec![]);
        let key = engine.key(&bound);
        assert_eq!(
            engine.resolve(&bound, &key).await.unwrap(),
            MergeDecision::Skip(SkipReason::NotConfiguredToInsert)
        );
    }
}
