//! Wire decoders: one remote page in, page metadata plus raw records out.

pub mod json;
pub mod xml;

use crate::collect::error::CollectResult;
use crate::collect::record::RemoteRecord;
use crate::domain::{ContentKind, WireFormat};

/// Pagination metadata reported by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageMeta {
    pub page: u32,
    pub page_count: u32,
    pub limit: u32,
    pub total: u32,
}

/// One entry of the remote taxonomy (`class` block).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCategory {
    pub id: String,
    pub parent_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedPage {
    pub meta: PageMeta,
    pub records: Vec<RemoteRecord>,
    pub categories: Vec<RemoteCategory>,
}

/// Decodes a page in the given wire format; `Auto` sniffs the first
/// non-whitespace byte.
pub fn decode(raw: &[u8], format: WireFormat, kind: ContentKind) -> CollectResult<DecodedPage> {
    match resolve_format(raw, format) {
        WireFormat::Xml => xml::decode(raw, kind),
        _ => json::decode(raw, kind),
    }
}

#[must_use]
pub fn resolve_format(raw: &[u8], format: WireFormat) -> WireFormat {
    match format {
        WireFormat::Auto => {
            let first = raw
                .iter()
                .copied()
                .find(|b| !b.is_ascii_whitespace() && *b != 0xEF && *b != 0xBB && *b != 0xBF);
            if first == Some(b'<') {
                WireFormat::Xml
            } else {
                WireFormat::Json
            }
        }
        other => other,
    }
}

/// Lenient numeric parse shared by both decoders: anything unparsable is 0.
pub(crate) fn parse_count(raw: &str) -> u32 {
    let raw = raw.trim();
    raw.parse::<u32>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0 && *v <= f64::from(u32::MAX))
                .map(|v| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let n = v as u32;
                    n
                })
        })
        .unwrap_or(0)
}
