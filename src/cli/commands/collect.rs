//! Collection run command handler

use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::clients::FeedQuery;
use crate::collect::{RunOutcome, RunRequest, RunStateStore};
use crate::domain::ContentKind;
use crate::domain::events::CollectEvent;
use crate::state::SharedState;

use super::resolve_source;

#[derive(Debug, Default)]
pub struct CollectArgs {
    pub type_id: Option<String>,
    pub hours: Option<u32>,
    pub ids: Vec<String>,
    pub keyword: Option<String>,
    pub page: Option<u32>,
    pub resume: bool,
}

pub async fn cmd_collect(
    state: &SharedState,
    id_or_name: &str,
    kind: &str,
    args: CollectArgs,
) -> anyhow::Result<()> {
    let Some(source) = resolve_source(&state.store, id_or_name).await? else {
        println!("Source not found: {id_or_name}");
        return Ok(());
    };
    let kind: ContentKind = kind.parse().map_err(anyhow::Error::msg)?;

    let query = FeedQuery::records(kind)
        .with_type(args.type_id)
        .with_hours(args.hours)
        .with_ids(args.ids)
        .with_keyword(args.keyword);

    let request = RunRequest {
        kind,
        query,
        start_page: args.page,
        resume: args.resume,
    };

    let mut events = state.event_bus.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            match event {
                CollectEvent::PageStarted {
                    page, total_pages, ..
                } => match total_pages {
                    Some(total) => println!("── page {page}/{total}"),
                    None => println!("── page {page}"),
                },
                CollectEvent::RecordProcessed { line, .. } => println!("   {line}"),
                CollectEvent::RunFinished { .. } => break,
                _ => {}
            }
        }
    });

    let store = state.store.clone();
    let source_id = source.id;
    let interrupt = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            println!();
            println!("Interrupt received; stopping after the current page...");
            if let Err(e) = store.request_cancel(source_id, kind).await {
                warn!("Failed to request cancel: {e}");
            }
        }
    });

    let result = state.context.run(&source, request).await;
    interrupt.abort();
    // `RunFinished` is only sent by runs that return a summary.
    if result.is_ok() {
        let _ = printer.await;
    } else {
        printer.abort();
    }

    let summary = result?;

    println!();
    println!(
        "Run {}: {} page(s) of {}",
        summary.outcome,
        summary.pages_completed,
        summary.total_pages.max(summary.pages_completed)
    );
    for (outcome, count) in &summary.counts {
        println!("  {outcome:<24} {count}");
    }

    match summary.outcome {
        RunOutcome::Failed { .. } => {
            println!();
            println!(
                "Continue with: catalog-collect collect {} {} --resume",
                source.id, kind
            );
        }
        RunOutcome::Cancelled | RunOutcome::Done => {}
    }

    Ok(())
}
