//! Composite dedup keys built from rule letters.

use uuid::Uuid;

use crate::collect::record::CanonicalRecord;
use crate::collect::schema::{DedupColumn, schema};
use crate::domain::ContentKind;

/// How cast and director terms combine when a rule selects both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendPolicy {
    /// Every term must match.
    AllOf,
    /// Cast and director form one OR group; metadata quality for the two
    /// differs too much across sources to require both.
    #[default]
    CastOrDirector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Equals,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupTerm {
    pub letter: char,
    pub column: DedupColumn,
    pub value: String,
    pub op: MatchOp,
}

/// Conjunction of `terms`, plus an optional disjunction over `any_of`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupKey {
    pub kind: ContentKind,
    pub terms: Vec<DedupTerm>,
    pub any_of: Vec<DedupTerm>,
}

impl DedupKey {
    /// Builds the key for a record. Unknown letters are ignored; a rule with
    /// no usable letter falls back to name only. Terms come out ordered by
    /// letter whatever the rule order.
    #[must_use]
    pub fn build(record: &CanonicalRecord, rule: &str, blend: BlendPolicy) -> Self {
        let schema = schema(record.kind);

        let mut letters: Vec<char> = rule
            .chars()
            .filter(|c| schema.dedup_column(*c).is_some())
            .collect();
        letters.sort_unstable();
        letters.dedup();
        if letters.is_empty() {
            letters.push('a');
        }

        let mut terms: Vec<DedupTerm> = letters
            .into_iter()
            .filter_map(|letter| {
                let column = schema.dedup_column(letter)?;
                let value = match column {
                    DedupColumn::Category => record.category_id.to_string(),
                    other => record.text(other.field()).trim().to_string(),
                };
                let op = if column.is_fuzzy() {
                    MatchOp::Contains
                } else {
                    MatchOp::Equals
                };
                Some(DedupTerm {
                    letter,
                    column,
                    value,
                    op,
                })
            })
            .collect();

        let blended = |t: &DedupTerm| matches!(t.column, DedupColumn::Cast | DedupColumn::Director);
        let mut any_of = Vec::new();
        if blend == BlendPolicy::CastOrDirector
            && terms.iter().any(|t| t.column == DedupColumn::Cast)
            && terms.iter().any(|t| t.column == DedupColumn::Director)
        {
            any_of = terms.iter().filter(|t| blended(t)).cloned().collect();
            terms.retain(|t| !blended(t));
        }

        Self {
            kind: record.kind,
            terms,
            any_of,
        }
    }

    /// Stable identifier of the key's exact term values, stored with every
    /// inserted record under a unique `(kind, dedup_key)` index.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut canonical = self.kind.to_string();
        for term in self.terms.iter().chain(self.any_of.iter()) {
            canonical.push('|');
            canonical.push(term.letter);
            canonical.push('=');
            canonical.push_str(&term.value);
        }
        Uuid::new_v5(&Uuid::NAMESPACE_OID, canonical.as_bytes()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::record::FieldValue;
    use std::collections::BTreeMap;

    fn record() -> CanonicalRecord {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), FieldValue::from("Frieren"));
        fields.insert("year".to_string(), FieldValue::from("2023"));
        fields.insert("actor".to_string(), FieldValue::from("Atsumi Tanezaki"));
        fields.insert("director".to_string(), FieldValue::from("Keiichiro Saito"));
        CanonicalRecord {
            kind: ContentKind::Video,
            remote_id: "101".into(),
            category_id: 20,
            parent_category_id: 0,
            fields,
            play: vec![],
            down: vec![],
        }
    }

    fn letters(terms: &[DedupTerm]) -> String {
        terms.iter().map(|t| t.letter).collect()
    }

    #[test]
    fn test_terms_ordered_by_letter() {
        let key = DedupKey::build(&record(), "cba", BlendPolicy::default());
        assert_eq!(letters(&key.terms), "abc");
        assert_eq!(key.terms[1].value, "20");
        assert!(key.any_of.is_empty());
    }

    #[test]
    fn test_empty_rule_means_name_only() {
        let key = DedupKey::build(&record(), "", BlendPolicy::default());
        assert_eq!(letters(&key.terms), "a");
        assert_eq!(key.terms[0].value, "Frieren");

        let key = DedupKey::build(&record(), "xyz", BlendPolicy::default());
        assert_eq!(letters(&key.terms), "a");
    }

    #[test]
    fn test_cast_is_fuzzy() {
        let key = DedupKey::build(&record(), "af", BlendPolicy::default());
        assert_eq!(key.terms[1].op, MatchOp::Contains);
        assert_eq!(key.terms[0].op, MatchOp::Equals);
    }

    #[test]
    fn test_cast_and_director_blend_into_or_group() {
        let key = DedupKey::build(&record(), "afg", BlendPolicy::CastOrDirector);
        assert_eq!(letters(&key.terms), "a");
        assert_eq!(letters(&key.any_of), "fg");

        let strict = DedupKey::build(&record(), "afg", BlendPolicy::AllOf);
        assert_eq!(letters(&strict.terms), "afg");
        assert!(strict.any_of.is_empty());
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = DedupKey::build(&record(), "ab", BlendPolicy::default());
        let b = DedupKey::build(&record(), "ba", BlendPolicy::default());
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = DedupKey::build(&record(), "a", BlendPolicy::default());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
