//! Page-by-page run state with a persisted cancel flag.
//!
//! ```text
//! Running(1) -> Running(2) -> ... -> Done
//!      \             \
//!       +-> Cancelled +-> Cancelled
//! ```
//!
//! The run row lives in the store for the whole run, so an operator can set
//! its cancel flag from another process, and a failed page leaves the row
//! pointing at itself for a later `--resume`.

use serde::Serialize;
use tracing::info;

use crate::collect::error::CollectResult;
use crate::collect::store::RunStateStore;
use crate::domain::{ContentKind, SourceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContinuationState {
    pub source_id: SourceId,
    pub kind: ContentKind,
    pub current_page: u32,
    pub total_pages: u32,
    pub cancel_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Running(u32),
    Done,
    Cancelled,
}

/// Where a run goes after `page` was ingested.
#[must_use]
pub const fn next_phase(page: u32, total_pages: u32, selection: bool) -> RunPhase {
    if selection || page >= total_pages {
        RunPhase::Done
    } else {
        RunPhase::Running(page + 1)
    }
}

pub struct ContinuationDriver<'a> {
    store: &'a dyn RunStateStore,
    source: SourceId,
    kind: ContentKind,
    selection: bool,
}

impl<'a> ContinuationDriver<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn RunStateStore,
        source: SourceId,
        kind: ContentKind,
        selection: bool,
    ) -> Self {
        Self {
            store,
            source,
            kind,
            selection,
        }
    }

    /// Opens the run and returns its first page.
    ///
    /// With `resume`, a stored run continues at its stored page. Any stale
    /// cancel flag is cleared.
    pub async fn begin(&self, start_page: Option<u32>, resume: bool) -> CollectResult<u32> {
        let stored = if resume {
            self.store.load_run(self.source, self.kind).await?
        } else {
            None
        };

        let page = stored
            .as_ref()
            .map_or_else(|| start_page.unwrap_or(1), |s| s.current_page)
            .max(1);

        if let Some(state) = &stored {
            info!(
                event = "collect.resumed",
                source = %self.source,
                kind = %self.kind,
                page = state.current_page,
                total = state.total_pages,
                "Resuming run"
            );
        }

        self.store.start_run(self.source, self.kind, page).await?;
        Ok(page)
    }

    pub async fn cancel_requested(&self) -> CollectResult<bool> {
        Ok(self
            .store
            .load_run(self.source, self.kind)
            .await?
            .is_some_and(|s| s.cancel_requested))
    }

    /// Records that `page` was ingested and moves to the next phase.
    pub async fn page_done(&self, page: u32, total_pages: u32) -> CollectResult<RunPhase> {
        let phase = next_phase(page, total_pages, self.selection);
        match phase {
            RunPhase::Running(next) => {
                self.store
                    .advance_run(self.source, self.kind, next, total_pages)
                    .await?;
            }
            RunPhase::Done | RunPhase::Cancelled => {
                self.store.finish_run(self.source, self.kind).await?;
            }
        }
        Ok(phase)
    }

    pub async fn cancel(&self) -> CollectResult<RunPhase> {
        self.store.finish_run(self.source, self.kind).await?;
        Ok(RunPhase::Cancelled)
    }
}
