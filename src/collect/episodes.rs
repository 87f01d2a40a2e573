//! Multi-value play/download encoding.
//!
//! Groups are joined with `$$$`, episodes inside a group with `#`, and each
//! episode is `label$url`. Remote feeds escape `//` as `||` so their own
//! markup survives; that escape is undone before splitting.

use regex::Regex;
use std::sync::OnceLock;

use crate::collect::record::{Episode, PlayGroup, RawGroup};

pub const GROUP_SEPARATOR: &str = "$$$";
pub const EPISODE_SEPARATOR: &str = "#";
pub const LABEL_SEPARATOR: char = '$';
const SLASH_ESCAPE: &str = "||";

#[must_use]
pub fn unescape_slashes(raw: &str) -> String {
    raw.replace(SLASH_ESCAPE, "//")
}

/// Parses one group's `label$url#label$url` string.
///
/// Entries without a label get a generated `第N集` label from their position.
#[must_use]
pub fn parse_episodes(raw: &str) -> Vec<Episode> {
    let raw = unescape_slashes(raw);

    raw.split(EPISODE_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .enumerate()
        .map(|(i, item)| match item.split_once(LABEL_SEPARATOR) {
            Some((label, rest)) => {
                // Some feeds append a third `$flag` segment; only the url matters.
                let url = rest.split(LABEL_SEPARATOR).next().unwrap_or_default();
                let label = if label.trim().is_empty() {
                    generated_label(i)
                } else {
                    label.trim().to_string()
                };
                Episode::new(label, url.trim())
            }
            None => Episode::new(generated_label(i), item),
        })
        .filter(|ep| !ep.url.is_empty())
        .collect()
}

fn generated_label(index: usize) -> String {
    format!("第{}集", index + 1)
}

/// First integer appearing in an episode label ("第3集", "EP3", "3话" all give 3).
#[must_use]
pub fn episode_number(label: &str) -> Option<u64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\d+").expect("Invalid regex"));
    re.find(label).and_then(|m| m.as_str().parse().ok())
}

/// Stable sort by episode number; labels without a number keep their
/// relative order after every numbered entry.
pub fn sort_episodes(episodes: &mut [Episode]) {
    episodes.sort_by_key(|ep| episode_number(&ep.label).map_or((1, 0), |n| (0, n)));
}

/// Turns raw wire groups into ordered play groups with unique labels.
///
/// A repeated label folds its episodes into the first group with that label,
/// skipping urls already present.
#[must_use]
pub fn build_groups(raw: &[RawGroup]) -> Vec<PlayGroup> {
    let mut groups: Vec<PlayGroup> = Vec::new();

    for (i, group) in raw.iter().enumerate() {
        let mut episodes = parse_episodes(&group.episodes);
        if episodes.is_empty() {
            continue;
        }

        let label = if group.label.trim().is_empty() {
            format!("source{}", i + 1)
        } else {
            group.label.trim().to_string()
        };

        if let Some(existing) = groups.iter_mut().find(|g| g.source_label == label) {
            for ep in episodes {
                if !existing.episodes.iter().any(|e| e.url == ep.url) {
                    existing.episodes.push(ep);
                }
            }
            sort_episodes(&mut existing.episodes);
            continue;
        }

        sort_episodes(&mut episodes);
        groups.push(PlayGroup {
            source_label: label,
            episodes,
            server_tag: group.server.trim().to_string(),
            note: group.note.trim().to_string(),
        });
    }

    groups
}

/// Splits the four parallel `$$$` strings a feed or the store carries.
#[must_use]
pub fn split_parallel(from: &str, server: &str, note: &str, urls: &str) -> Vec<RawGroup> {
    if urls.trim().is_empty() {
        return Vec::new();
    }

    let froms: Vec<&str> = from.split(GROUP_SEPARATOR).collect();
    let servers: Vec<&str> = server.split(GROUP_SEPARATOR).collect();
    let notes: Vec<&str> = note.split(GROUP_SEPARATOR).collect();

    urls.split(GROUP_SEPARATOR)
        .enumerate()
        .map(|(i, episodes)| RawGroup {
            label: froms.get(i).copied().unwrap_or_default().to_string(),
            server: servers.get(i).copied().unwrap_or_default().to_string(),
            note: notes.get(i).copied().unwrap_or_default().to_string(),
            episodes: episodes.to_string(),
        })
        .collect()
}

/// The `$$$`-joined columns for a set of groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedGroups {
    pub from: String,
    pub server: String,
    pub note: String,
    pub url: String,
}

#[must_use]
pub fn encode_episodes(episodes: &[Episode]) -> String {
    episodes
        .iter()
        .map(|ep| format!("{}{LABEL_SEPARATOR}{}", ep.label, ep.url))
        .collect::<Vec<_>>()
        .join(EPISODE_SEPARATOR)
}

fn join_groups(groups: &[PlayGroup], part: impl Fn(&PlayGroup) -> String) -> String {
    groups.iter().map(part).collect::<Vec<_>>().join(GROUP_SEPARATOR)
}

#[must_use]
pub fn encode_groups(groups: &[PlayGroup]) -> EncodedGroups {
    EncodedGroups {
        from: join_groups(groups, |g| g.source_label.clone()),
        server: join_groups(groups, |g| g.server_tag.clone()),
        note: join_groups(groups, |g| g.note.clone()),
        url: join_groups(groups, |g| encode_episodes(&g.episodes)),
    }
}

/// Decodes stored columns back into groups. Stored data is already ordered,
/// so no re-sorting happens here.
#[must_use]
pub fn decode_groups(encoded: &EncodedGroups) -> Vec<PlayGroup> {
    split_parallel(&encoded.from, &encoded.server, &encoded.note, &encoded.url)
        .into_iter()
        .map(|raw| PlayGroup {
            source_label: raw.label,
            episodes: parse_episodes(&raw.episodes),
            server_tag: raw.server,
            note: raw.note,
        })
        .filter(|g| !g.episodes.is_empty())
        .collect()
}
