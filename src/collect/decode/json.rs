use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::{DecodedPage, PageMeta, RemoteCategory, parse_count};
use crate::collect::episodes::split_parallel;
use crate::collect::error::{CollectError, CollectResult};
use crate::collect::record::{RawGroup, RemoteRecord};
use crate::collect::schema::{GroupKeys, KindSchema, schema};
use crate::domain::ContentKind;

#[derive(Deserialize)]
struct Envelope {
    #[serde(default, deserialize_with = "lenient_count")]
    page: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pagecount: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    limit: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    total: u32,
    #[serde(default, deserialize_with = "lenient_objects")]
    list: Vec<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient_objects")]
    class: Vec<Map<String, Value>>,
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_count(&value_text(&value)))
}

fn lenient_objects<'de, D>(deserializer: D) -> Result<Vec<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Flattens a scalar (or list of scalars) into the text form the normalizer
/// expects.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => String::new(),
    }
}

pub fn decode(raw: &[u8], kind: ContentKind) -> CollectResult<DecodedPage> {
    let envelope: Envelope = serde_json::from_slice(raw)
        .map_err(|e| CollectError::MalformedFeed(format!("invalid JSON envelope: {e}")))?;

    let schema = schema(kind);
    let records = envelope
        .list
        .iter()
        .map(|item| decode_record(schema, item))
        .collect();

    let categories = envelope
        .class
        .iter()
        .map(|c| RemoteCategory {
            id: c.get("type_id").map(value_text).unwrap_or_default(),
            parent_id: c.get("type_pid").map(value_text).unwrap_or_default(),
            name: c.get("type_name").map(value_text).unwrap_or_default(),
        })
        .filter(|c| !c.id.is_empty())
        .collect();

    Ok(DecodedPage {
        meta: PageMeta {
            page: envelope.page,
            page_count: envelope.pagecount,
            limit: envelope.limit,
            total: envelope.total,
        },
        records,
        categories,
    })
}

fn decode_record(schema: &KindSchema, item: &Map<String, Value>) -> RemoteRecord {
    let mut record = RemoteRecord::new(schema.kind);

    for (key, value) in item {
        let key = key.as_str();
        if schema.id_wire.contains(&key) {
            if record.remote_id.is_empty() {
                record.remote_id = value_text(value);
            }
        } else if schema.category_wire.contains(&key) {
            if record.remote_category_id.is_empty() {
                record.remote_category_id = value_text(value);
            }
        } else if let Some(spec) = schema.field_for_wire(key) {
            record
                .fields
                .entry(spec.name.to_string())
                .or_insert_with(|| value_text(value));
        }
    }

    if let Some(keys) = schema.play {
        record.play = decode_groups(item, keys);
    }
    if let Some(keys) = schema.down {
        record.down = decode_groups(item, keys);
    }

    record
}

/// Groups arrive either as a `label -> episodes` object under the url key, or
/// as parallel `$$$`-joined from/server/note/url strings.
fn decode_groups(item: &Map<String, Value>, keys: GroupKeys) -> Vec<RawGroup> {
    let text = |key: &str| item.get(key).map(value_text).unwrap_or_default();

    match item.get(keys.url) {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(label, episodes)| RawGroup {
                label: label.clone(),
                episodes: value_text(episodes),
                ..Default::default()
            })
            .collect(),
        Some(_) => split_parallel(
            &text(keys.from),
            &text(keys.server),
            &text(keys.note),
            &text(keys.url),
        ),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "code": 1,
        "msg": "list",
        "page": "2",
        "pagecount": 5,
        "limit": "20",
        "total": 93,
        "list": [
            {
                "vod_id": 101,
                "type_id": 6,
                "vod_name": "Frieren",
                "vod_area": "Japan",
                "vod_year": 2023,
                "vod_actor": ["Atsumi Tanezaki", "Kana Ichinose"],
                "vod_play_from": "m3u8$$$mp4",
                "vod_play_url": "EP2$u2#EP1$u1$$$1$v1",
                "vod_unknown": "ignored"
            },
            {
                "vod_id": "102",
                "type_id": "7",
                "vod_name": "Dungeon Meshi",
                "vod_play_url": {"m3u8": "第1集$w1#第2集$w2"}
            }
        ],
        "class": [{"type_id": 6, "type_name": "Anime"}, {"type_id": 7, "type_pid": 6, "type_name": "TV"}]
    }"#;

    #[test]
    fn test_decodes_envelope_with_string_numbers() {
        let page = decode(PAGE.as_bytes(), ContentKind::Video).unwrap();
        assert_eq!(
            page.meta,
            PageMeta {
                page: 2,
                page_count: 5,
                limit: 20,
                total: 93
            }
        );
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.categories.len(), 2);
        assert_eq!(page.categories[1].parent_id, "6");
    }

    #[test]
    fn test_maps_wire_keys_to_canonical_fields() {
        let page = decode(PAGE.as_bytes(), ContentKind::Video).unwrap();
        let first = &page.records[0];

        assert_eq!(first.remote_id, "101");
        assert_eq!(first.remote_category_id, "6");
        assert_eq!(first.field("name"), "Frieren");
        assert_eq!(first.field("region"), "Japan");
        assert_eq!(first.field("year"), "2023");
        assert_eq!(first.field("actor"), "Atsumi Tanezaki,Kana Ichinose");
        assert!(!first.fields.contains_key("vod_unknown"));
    }

    #[test]
    fn test_decodes_both_group_encodings() {
        let page = decode(PAGE.as_bytes(), ContentKind::Video).unwrap();

        let parallel = &page.records[0].play;
        assert_eq!(parallel.len(), 2);
        assert_eq!(parallel[0].label, "m3u8");
        assert_eq!(parallel[1].episodes, "1$v1");

        let mapped = &page.records[1].play;
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped[0].label, "m3u8");
        assert_eq!(mapped[0].episodes, "第1集$w1#第2集$w2");
    }

    #[test]
    fn test_invalid_json_is_malformed_feed() {
        let err = decode(b"{\"page\": ", ContentKind::Video).unwrap_err();
        assert!(matches!(err, CollectError::MalformedFeed(_)));
    }

    #[test]
    fn test_null_list_decodes_to_empty_page() {
        let page = decode(br#"{"code":0,"list":null,"pagecount":0}"#, ContentKind::Video).unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.meta.page_count, 0);
    }
}
