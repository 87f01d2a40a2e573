//! Progress events emitted while a collection run is in flight.
//!
//! Events go out over a broadcast channel; the CLI subscribes to render
//! progress lines, and nothing in the pipeline waits on a receiver.

use serde::Serialize;

use crate::domain::{ContentKind, SourceId};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum CollectEvent {
    RunStarted {
        source_id: SourceId,
        kind: ContentKind,
        page: u32,
    },
    PageStarted {
        source_id: SourceId,
        kind: ContentKind,
        page: u32,
        total_pages: Option<u32>,
    },
    RecordProcessed {
        source_id: SourceId,
        kind: ContentKind,
        page: u32,
        line: String,
    },
    PageFinished {
        source_id: SourceId,
        kind: ContentKind,
        page: u32,
        total_pages: u32,
    },
    RunFinished {
        source_id: SourceId,
        kind: ContentKind,
        pages_completed: u32,
        total_pages: u32,
        state: String,
    },
}
