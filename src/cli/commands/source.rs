//! Source management command handlers

use crate::collect::{CollectionSource, KindRules};
use crate::config::Config;
use crate::db::Store;
use crate::domain::{ContentKind, GroupMergePolicy, SourceId, WireFormat};

use super::resolve_source;

pub async fn cmd_source_add(
    config: &Config,
    name: &str,
    url: &str,
    format: &str,
    suffix: &str,
    sync_images: bool,
    group_merge: Option<&str>,
) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    if url::Url::parse(url).is_err() {
        println!("Invalid url: {url}");
        return Ok(());
    }
    let format: WireFormat = format.parse().map_err(anyhow::Error::msg)?;
    let group_merge: Option<GroupMergePolicy> = group_merge
        .map(str::parse)
        .transpose()
        .map_err(anyhow::Error::msg)?;

    if store.get_source_by_name(name).await?.is_some() {
        println!("A source named '{name}' already exists.");
        return Ok(());
    }

    let mut source = CollectionSource::new(SourceId::default(), name, url);
    source.format = format;
    source.query_suffix = suffix.to_string();
    source.sync_images = sync_images;
    source.group_merge = group_merge;

    let id = store.add_source(&source).await?;

    println!("✓ Added source #{id}: {name}");
    println!("  URL: {url}");
    println!();
    println!("Next: bind its categories with 'catalog-collect taxonomy {id}'");
    println!("and set per-kind rules with 'catalog-collect source rules {id} <kind>'.");

    Ok(())
}

pub async fn cmd_source_list(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let sources = store.list_sources().await?;

    if sources.is_empty() {
        println!("No sources configured.");
        println!();
        println!("Add one with: catalog-collect source add <name> <url>");
        return Ok(());
    }

    println!("Sources ({} total)", sources.len());
    println!("{:-<70}", "");

    for source in sources {
        let images = if source.sync_images { "images" } else { "-" };
        println!(
            "#{:<4} {:<20} {:<5} {:<7} {}",
            source.id,
            source.name,
            source.format.as_str(),
            images,
            source.base_url
        );
    }

    Ok(())
}

pub async fn cmd_source_show(config: &Config, id_or_name: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let Some(source) = resolve_source(&store, id_or_name).await? else {
        println!("Source not found: {id_or_name}");
        return Ok(());
    };

    println!("Source #{}: {}", source.id, source.name);
    println!("{:-<50}", "");
    println!("  URL:          {}", source.base_url);
    println!("  Format:       {}", source.format.as_str());
    if !source.query_suffix.is_empty() {
        println!("  Suffix:       {}", source.query_suffix);
    }
    println!("  Sync images:  {}", if source.sync_images { "yes" } else { "no" });
    println!(
        "  Group merge:  {}",
        source
            .group_merge_or(config.collect.group_merge_policy)
            .as_str()
    );
    println!("  Name filter:  {}", join_or_dash(&source.name_filter));
    println!("  Year filter:  {}", join_or_dash(&source.year_filter));
    println!("  Play sources: {}", join_or_dash(&source.play_sources));
    println!("  Down sources: {}", join_or_dash(&source.down_sources));

    println!();
    println!("Rules:");
    if source.rules.is_empty() {
        println!("  (none; every kind inserts, dedups by name and never updates)");
    }
    for (kind, rules) in &source.rules {
        println!(
            "  {:<8} mode={:<10} dedup={:<8} merge={}",
            kind.as_str(),
            rules.mode.as_str(),
            if rules.dedup.is_empty() { "-" } else { rules.dedup.as_str() },
            if rules.merge.is_empty() { "-" } else { rules.merge.as_str() },
        );
    }

    let bindings = store.list_bindings(source.id).await?;
    println!();
    println!("Bindings: {}", bindings.len());

    Ok(())
}

pub async fn cmd_source_remove(config: &Config, id_or_name: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let Some(source) = resolve_source(&store, id_or_name).await? else {
        println!("Source not found: {id_or_name}");
        return Ok(());
    };

    if store.remove_source(source.id).await? {
        println!("✓ Removed source #{}: {}", source.id, source.name);
    }
    Ok(())
}

pub async fn cmd_source_rules(
    config: &Config,
    id_or_name: &str,
    kind: &str,
    mode: Option<&str>,
    dedup: Option<&str>,
    merge: Option<&str>,
) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let Some(mut source) = resolve_source(&store, id_or_name).await? else {
        println!("Source not found: {id_or_name}");
        return Ok(());
    };
    let kind: ContentKind = kind.parse().map_err(anyhow::Error::msg)?;

    let mut rules: KindRules = source.rules_for(kind);
    if let Some(mode) = mode {
        rules.mode = mode.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(dedup) = dedup {
        rules.dedup = dedup.trim().to_string();
    }
    if let Some(merge) = merge {
        rules.merge = merge.trim().to_string();
    }

    source.rules.insert(kind, rules.clone());
    store.update_source(&source).await?;

    println!(
        "✓ {} rules for source #{}: mode={} dedup={} merge={}",
        kind,
        source.id,
        rules.mode.as_str(),
        rules.dedup,
        rules.merge
    );
    Ok(())
}

pub async fn cmd_source_filters(
    config: &Config,
    id_or_name: &str,
    names: Option<Vec<String>>,
    years: Option<Vec<String>>,
    play: Option<Vec<String>>,
    down: Option<Vec<String>>,
) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let Some(mut source) = resolve_source(&store, id_or_name).await? else {
        println!("Source not found: {id_or_name}");
        return Ok(());
    };

    let clean = |list: Vec<String>| -> Vec<String> {
        list.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    if let Some(names) = names {
        source.name_filter = clean(names);
    }
    if let Some(years) = years {
        source.year_filter = clean(years);
    }
    if let Some(play) = play {
        source.play_sources = clean(play);
    }
    if let Some(down) = down {
        source.down_sources = clean(down);
    }

    store.update_source(&source).await?;
    println!("✓ Filters updated for source #{}", source.id);
    Ok(())
}

fn join_or_dash(list: &[String]) -> String {
    if list.is_empty() {
        "-".to_string()
    } else {
        list.join(", ")
    }
}
