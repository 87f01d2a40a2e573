//! Run status and cancellation command handlers

use crate::collect::RunStateStore;
use crate::config::Config;
use crate::db::Store;
use crate::domain::ContentKind;

use super::resolve_source;

pub async fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let runs = store.list_runs().await?;

    if runs.is_empty() {
        println!("No runs in progress.");
        return Ok(());
    }

    println!("{:<8} {:<8} {:>10} {}", "SOURCE", "KIND", "PAGE", "STATE");
    for run in runs {
        let total = if run.total_pages > 0 {
            run.total_pages.to_string()
        } else {
            "?".to_string()
        };
        let state = if run.cancel_requested {
            "cancelling"
        } else {
            "running or stopped"
        };
        println!(
            "{:<8} {:<8} {:>10} {state}",
            run.source_id,
            run.kind.as_str(),
            format!("{}/{total}", run.current_page)
        );
    }

    println!();
    println!("Continue a stopped run with: catalog-collect collect <source> <kind> --resume");
    Ok(())
}

pub async fn cmd_cancel(config: &Config, id_or_name: &str, kind: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let Some(source) = resolve_source(&store, id_or_name).await? else {
        println!("Source not found: {id_or_name}");
        return Ok(());
    };
    let kind: ContentKind = kind.parse().map_err(anyhow::Error::msg)?;

    if store.request_cancel(source.id, kind).await? {
        println!("✓ Cancel requested; the run stops before its next page.");
    } else {
        println!("No {kind} run in progress for source #{}.", source.id);
    }
    Ok(())
}
