//! Category binding command handlers

use crate::config::Config;
use crate::db::Store;

use super::resolve_source;

pub async fn cmd_bind_add(
    config: &Config,
    id_or_name: &str,
    remote: &str,
    local: i32,
) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let Some(source) = resolve_source(&store, id_or_name).await? else {
        println!("Source not found: {id_or_name}");
        return Ok(());
    };
    let Some(category) = store.get_category(local).await? else {
        println!("Local category {local} not found.");
        println!("Create it with: catalog-collect category add <name>");
        return Ok(());
    };

    store.bind_category(source.id, remote, local).await?;
    println!(
        "✓ {} remote category {} -> #{} {}",
        source.name, remote, category.id, category.name
    );
    Ok(())
}

pub async fn cmd_bind_list(config: &Config, id_or_name: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let Some(source) = resolve_source(&store, id_or_name).await? else {
        println!("Source not found: {id_or_name}");
        return Ok(());
    };

    let bindings = store.list_bindings(source.id).await?;
    if bindings.is_empty() {
        println!("Source #{} has no bindings; its records will be skipped.", source.id);
        return Ok(());
    }

    println!("Bindings of #{} {}", source.id, source.name);
    println!("{:-<40}", "");
    for (remote, local) in bindings {
        println!("  {remote:>8} -> #{local}");
    }
    Ok(())
}

pub async fn cmd_bind_remove(config: &Config, id_or_name: &str, remote: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let Some(source) = resolve_source(&store, id_or_name).await? else {
        println!("Source not found: {id_or_name}");
        return Ok(());
    };

    if store.unbind_category(source.id, remote).await? {
        println!("✓ Removed binding of remote category {remote}");
    } else {
        println!("Remote category {remote} was not bound.");
    }
    Ok(())
}
