//! "Pseudo-original" rewriting of incoming text.
//!
//! Each pass is a pure rewrite over the configured word tables. Passes run in
//! a fixed order (name, play labels, region, language, body synonyms, body
//! filler) before any field is derived, so the slug and summary reflect the
//! rewritten text.

use rand::Rng;
use rand::seq::IndexedRandom;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::warn;

use crate::collect::record::RemoteRecord;
use crate::config::PseudoConfig;

const FILLER_BOUNDARIES: &[char] = &['。', '！', '？', '，', '；', '.', '!', '?', ',', ';'];

#[derive(Debug, Clone, Default)]
pub struct PseudoRewriter {
    config: PseudoConfig,
    pattern: Option<Regex>,
}

impl PseudoRewriter {
    #[must_use]
    pub fn new(config: &PseudoConfig) -> Self {
        Self {
            config: config.clone(),
            pattern: synonym_pattern(&config.synonyms),
        }
    }

    /// A rewriter with every pass off.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Replaces every synonym-table key found in `text`, longest key first,
    /// in a single left-to-right pass so replacements are never re-rewritten.
    #[must_use]
    pub fn substitute(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };

        pattern
            .replace_all(text, |caps: &regex::Captures| {
                let found = &caps[0];
                self.config
                    .synonyms
                    .get(found)
                    .cloned()
                    .unwrap_or_else(|| found.to_string())
            })
            .into_owned()
    }

    /// Inserts `filler_count` filler words after randomly chosen sentence
    /// boundaries outside markup tags. Text without a boundary gets the words
    /// appended.
    pub fn inject_filler<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> String {
        if self.config.filler_words.is_empty() || self.config.filler_count == 0 {
            return text.to_string();
        }

        let mut candidates = Vec::new();
        let mut in_tag = false;
        for (idx, ch) in text.char_indices() {
            match ch {
                '<' => in_tag = true,
                '>' => in_tag = false,
                c if !in_tag && FILLER_BOUNDARIES.contains(&c) => {
                    candidates.push(idx + c.len_utf8());
                }
                _ => {}
            }
        }
        if candidates.is_empty() {
            candidates.push(text.len());
        }

        let mut inserts: Vec<(usize, &str)> = (0..self.config.filler_count)
            .filter_map(|_| {
                let at = candidates[rng.random_range(0..candidates.len())];
                self.config
                    .filler_words
                    .choose(&mut *rng)
                    .map(|word| (at, word.as_str()))
            })
            .collect();
        inserts.sort_by(|a, b| b.0.cmp(&a.0));

        let mut out = text.to_string();
        for (at, word) in inserts {
            out.insert_str(at, word);
        }
        out
    }

    /// Runs every enabled pass over a record, in order.
    pub fn apply<R: Rng + ?Sized>(&self, record: &mut RemoteRecord, rng: &mut R) {
        if !self.config.any_enabled() {
            return;
        }

        if self.config.rewrite_name {
            self.rewrite_field(record, "name");
        }

        if self.config.rewrite_play_labels {
            for group in record.play.iter_mut().chain(record.down.iter_mut()) {
                group.label = self.substitute(&group.label);
            }
        }

        if self.config.rewrite_region {
            self.rewrite_field(record, "region");
        }

        if self.config.rewrite_language {
            self.rewrite_field(record, "language");
        }

        if self.config.rewrite_content {
            self.rewrite_field(record, "content");
        }

        if self.config.inject_filler
            && let Some(body) = record.fields.get_mut("content")
            && !body.trim().is_empty()
        {
            *body = self.inject_filler(body, rng);
        }
    }

    fn rewrite_field(&self, record: &mut RemoteRecord, name: &str) {
        if let Some(value) = record.fields.get_mut(name) {
            *value = self.substitute(value);
        }
    }
}

fn synonym_pattern(table: &BTreeMap<String, String>) -> Option<Regex> {
    let mut keys: Vec<&str> = table
        .keys()
        .map(String::as_str)
        .filter(|k| !k.is_empty())
        .collect();
    if keys.is_empty() {
        return None;
    }
    keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));

    let alternation = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");

    match Regex::new(&alternation) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(event = "pseudo.synonyms_invalid", error = %e, "Synonym table disabled");
            None
        }
    }
}
