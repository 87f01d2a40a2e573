//! Remote record to canonical record.

use rand::Rng;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::collect::episodes::build_groups;
use crate::collect::error::{CollectError, CollectResult, SkipReason};
use crate::collect::pseudo::PseudoRewriter;
use crate::collect::record::{CanonicalRecord, FieldValue, PlayGroup, RemoteRecord};
use crate::collect::schema::{FieldType, schema};
use crate::collect::source::CollectionSource;
use crate::collect::taxonomy::CategoryTree;

const SUMMARY_CHARS: usize = 100;
const MAX_SCORE: f64 = 10.0;

/// Strips markup tags, decodes entities and collapses whitespace.
#[must_use]
pub fn strip_markup(raw: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    static SPACE: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid regex"));
    let space = SPACE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex"));

    let without_tags = tags.replace_all(raw, " ");
    let decoded = html_escape::decode_html_entities(&without_tags);
    space.replace_all(decoded.trim(), " ").into_owned()
}

/// ASCII slug of a name, transliterating non-Latin scripts.
///
/// ```rust
/// use catalog_collect::collect::normalize::slugify;
///
/// assert_eq!(slugify("Frieren: Beyond Journey's End"), "frieren-beyond-journey-s-end");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let ascii = deunicode::deunicode(name).to_ascii_lowercase();

    let mut slug = String::with_capacity(ascii.len());
    for ch in ascii.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Uppercased first ASCII letter of the slug, `0` when it has none.
#[must_use]
pub fn initial_letter(slug: &str) -> String {
    slug.chars()
        .find(char::is_ascii_alphabetic)
        .map_or_else(|| "0".to_string(), |c| c.to_ascii_uppercase().to_string())
}

#[must_use]
pub fn summarize(body: &str) -> String {
    strip_markup(body).chars().take(SUMMARY_CHARS).collect()
}

fn coerce(ty: FieldType, raw: &str) -> FieldValue {
    let raw = raw.trim();
    match ty {
        FieldType::Text => FieldValue::Text(strip_markup(raw)),
        FieldType::Rich => FieldValue::Text(raw.to_string()),
        FieldType::Int => FieldValue::Int(parse_int(raw)),
        FieldType::Float => FieldValue::Float(parse_float(raw)),
        FieldType::Score => FieldValue::Float(parse_float(raw).min(MAX_SCORE)),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn parse_int(raw: &str) -> i64 {
    raw.parse::<i64>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v as i64)
        })
        .unwrap_or(0)
        .max(0)
}

fn parse_float(raw: &str) -> f64 {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(0.0)
}

fn filter_groups(groups: Vec<PlayGroup>, allowed: &[String]) -> Vec<PlayGroup> {
    if allowed.is_empty() {
        return groups;
    }
    groups
        .into_iter()
        .filter(|g| allowed.iter().any(|a| a == &g.source_label))
        .collect()
}

/// Everything normalization needs besides the record itself.
pub struct Normalizer<'a> {
    pub source: &'a CollectionSource,
    pub tree: &'a CategoryTree,
    pub pseudo: &'a PseudoRewriter,
}

impl Normalizer<'_> {
    /// Filters, rewrites, types and derives one record.
    ///
    /// An unbound category is rejected before the name and year filters.
    pub fn normalize<R: Rng + ?Sized>(
        &self,
        mut remote: RemoteRecord,
        category_id: i32,
        rng: &mut R,
    ) -> CollectResult<CanonicalRecord> {
        if category_id == 0 {
            return Err(CollectError::RecordSkipped(SkipReason::CategoryUnbound));
        }

        let schema = schema(remote.kind);

        let name = remote.field("name").trim().to_string();
        if self
            .source
            .name_filter
            .iter()
            .any(|kw| !kw.trim().is_empty() && name.contains(kw.trim()))
        {
            return Err(CollectError::RecordSkipped(SkipReason::NameFiltered));
        }

        if !self.source.year_filter.is_empty() && schema.field("year").is_some() {
            let year = remote.field("year").trim();
            if !self.source.year_filter.iter().any(|y| y.trim() == year) {
                return Err(CollectError::RecordSkipped(SkipReason::YearFiltered));
            }
        }

        self.pseudo.apply(&mut remote, rng);

        let mut fields: BTreeMap<String, FieldValue> = schema
            .fields
            .iter()
            .map(|spec| (spec.name.to_string(), coerce(spec.ty, remote.field(spec.name))))
            .collect();

        let name = fields
            .get("name")
            .map(FieldValue::as_text)
            .unwrap_or_default();

        let slug = match fields.get("slug").map(FieldValue::as_text) {
            Some(s) if !s.trim().is_empty() => s,
            _ => slugify(&name),
        };
        let letter = match fields.get("letter").map(FieldValue::as_text) {
            Some(l) if !l.trim().is_empty() => l.trim().to_uppercase(),
            _ => initial_letter(&slug),
        };
        fields.insert("slug".into(), FieldValue::Text(slug));
        fields.insert("letter".into(), FieldValue::Text(letter));

        if fields.get("blurb").is_none_or(FieldValue::is_empty) {
            let body = remote.field("content");
            if !body.trim().is_empty() {
                fields.insert("blurb".into(), FieldValue::Text(summarize(body)));
            }
        }

        let play = filter_groups(build_groups(&remote.play), &self.source.play_sources);
        let down = filter_groups(build_groups(&remote.down), &self.source.down_sources);

        Ok(CanonicalRecord {
            kind: remote.kind,
            remote_id: remote.remote_id,
            category_id,
            parent_category_id: self.tree.parent(category_id),
            fields,
            play,
            down,
        })
    }
}
