use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

use super::{DecodedPage, PageMeta, RemoteCategory, parse_count};
use crate::collect::error::{CollectError, CollectResult};
use crate::collect::record::{RawGroup, RemoteRecord};
use crate::collect::schema::{KindSchema, schema};
use crate::domain::ContentKind;

/// Wraps every non-CDATA `<pic>` body in CDATA.
///
/// Image urls are the field remote feeds most often emit with raw `&` query
/// strings; without this one bad url fails the whole page.
#[must_use]
pub fn scrub(xml: &str) -> Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?s)<pic>(.*?)</pic>").expect("Invalid regex"));

    re.replace_all(xml, |caps: &regex::Captures| {
        let inner = caps.get(1).map_or("", |m| m.as_str());
        if inner.trim_start().starts_with("<![CDATA[") {
            format!("<pic>{inner}</pic>")
        } else {
            format!("<pic><![CDATA[{inner}]]></pic>")
        }
    })
}

/// Text collected for the element currently being read.
///
/// Escaped text and entity references are decoded when flushed; CDATA is
/// taken verbatim.
#[derive(Default)]
struct TextBuf {
    escaped: String,
    out: String,
}

impl TextBuf {
    fn push_escaped(&mut self, s: &str) {
        self.escaped.push_str(s);
    }

    fn push_raw(&mut self, s: &str) {
        self.flush();
        self.out.push_str(s);
    }

    fn flush(&mut self) {
        if !self.escaped.is_empty() {
            self.out
                .push_str(&html_escape::decode_html_entities(&self.escaped));
            self.escaped.clear();
        }
    }

    fn take(&mut self) -> String {
        self.flush();
        std::mem::take(&mut self.out).trim().to_string()
    }

    fn clear(&mut self) {
        self.escaped.clear();
        self.out.clear();
    }
}

fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        (a.key.as_ref() == name.as_bytes()).then(|| {
            html_escape::decode_html_entities(&String::from_utf8_lossy(&a.value)).into_owned()
        })
    })
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Where the reader currently is, relative to the elements it cares about.
enum Capture {
    None,
    Field(String),
    Group(RawGroup),
    Category(RemoteCategory),
}

pub fn decode(raw: &[u8], kind: ContentKind) -> CollectResult<DecodedPage> {
    let text = String::from_utf8_lossy(raw);
    let scrubbed = scrub(&text);
    parse(&scrubbed, schema(kind))
}

#[allow(clippy::too_many_lines)]
fn parse(xml: &str, schema: &KindSchema) -> CollectResult<DecodedPage> {
    // Whitespace around entity references is significant, so text is trimmed
    // per field on flush rather than per event.
    let mut reader = Reader::from_str(xml);

    let mut page = DecodedPage::default();
    let mut saw_list = false;
    let mut stack: Vec<String> = Vec::new();
    let mut record: Option<RemoteRecord> = None;
    let mut capture = Capture::None;
    let mut buf = TextBuf::default();

    loop {
        let event = reader.read_event().map_err(|e| {
            CollectError::MalformedFeed(format!(
                "XML parse error at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                let parent = stack.last().map(String::as_str);

                match (name.as_str(), parent) {
                    ("list", _) => {
                        saw_list = true;
                        page.meta = PageMeta {
                            page: attr(&e, "page").map_or(0, |v| parse_count(&v)),
                            page_count: attr(&e, "pagecount").map_or(0, |v| parse_count(&v)),
                            limit: attr(&e, "pagesize").map_or(0, |v| parse_count(&v)),
                            total: attr(&e, "recordcount").map_or(0, |v| parse_count(&v)),
                        };
                    }
                    (n, Some("list")) if n == schema.xml_element => {
                        record = Some(RemoteRecord::new(schema.kind));
                    }
                    ("dd", Some("dl")) if record.is_some() => {
                        buf.clear();
                        capture = Capture::Group(RawGroup {
                            label: attr(&e, "flag").unwrap_or_default(),
                            server: attr(&e, "server").unwrap_or_default(),
                            note: attr(&e, "note").unwrap_or_default(),
                            episodes: String::new(),
                        });
                    }
                    ("ty", Some("class")) => {
                        buf.clear();
                        capture = Capture::Category(RemoteCategory {
                            id: attr(&e, "id").unwrap_or_default(),
                            parent_id: attr(&e, "pid").unwrap_or_default(),
                            name: String::new(),
                        });
                    }
                    (n, Some(p)) if record.is_some() && p == schema.xml_element && n != "dl" => {
                        buf.clear();
                        capture = Capture::Field(n.to_string());
                    }
                    _ => {}
                }

                stack.push(name);
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.pop();

                match std::mem::replace(&mut capture, Capture::None) {
                    Capture::Field(field) if field == name => {
                        if let Some(rec) = record.as_mut() {
                            assign(schema, rec, &field, buf.take());
                        }
                    }
                    Capture::Group(mut group) if name == "dd" => {
                        group.episodes = buf.take();
                        if let Some(rec) = record.as_mut() {
                            rec.play.push(group);
                        }
                    }
                    Capture::Category(mut category) if name == "ty" => {
                        category.name = buf.take();
                        if !category.id.is_empty() {
                            page.categories.push(category);
                        }
                    }
                    other => capture = other,
                }

                if name == schema.xml_element
                    && stack.last().map(String::as_str) == Some("list")
                    && let Some(rec) = record.take()
                {
                    page.records.push(rec);
                }
            }
            Event::Text(t) => {
                if !matches!(capture, Capture::None) {
                    buf.push_escaped(&String::from_utf8_lossy(&t));
                }
            }
            Event::GeneralRef(r) => {
                if !matches!(capture, Capture::None) {
                    buf.push_escaped(&format!("&{};", String::from_utf8_lossy(&r)));
                }
            }
            Event::CData(c) => {
                if !matches!(capture, Capture::None) {
                    buf.push_raw(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_list && page.categories.is_empty() {
        return Err(CollectError::MalformedFeed(
            "XML document has neither <list> nor <class>".to_string(),
        ));
    }

    Ok(page)
}

fn assign(schema: &KindSchema, record: &mut RemoteRecord, element: &str, value: String) {
    if schema.id_wire.contains(&element) {
        record.remote_id = value;
    } else if schema.category_wire.contains(&element) {
        record.remote_category_id = value;
    } else if let Some(spec) = schema.field_for_wire(element) {
        record.fields.entry(spec.name.to_string()).or_insert(value);
    }
}
