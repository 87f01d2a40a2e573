//! Local category command handlers

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_category_add(config: &Config, name: &str, parent: i32) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    if parent > 0 && store.get_category(parent).await?.is_none() {
        println!("Parent category {parent} not found.");
        return Ok(());
    }

    let id = store.add_category(name.trim(), parent).await?;
    println!("✓ Added category #{id}: {name}");
    Ok(())
}

pub async fn cmd_category_list(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let categories = store.list_categories().await?;

    if categories.is_empty() {
        println!("No categories yet.");
        println!();
        println!("Add one with: catalog-collect category add <name> [--parent <id>]");
        return Ok(());
    }

    for top in categories.iter().filter(|c| c.parent_id == 0) {
        println!("#{:<4} {}", top.id, top.name);
        for child in categories.iter().filter(|c| c.parent_id == top.id) {
            println!("  #{:<4} {}", child.id, child.name);
        }
    }

    let orphans: Vec<_> = categories
        .iter()
        .filter(|c| c.parent_id != 0 && !categories.iter().any(|p| p.id == c.parent_id))
        .collect();
    for orphan in orphans {
        println!("#{:<4} {} (missing parent {})", orphan.id, orphan.name, orphan.parent_id);
    }

    Ok(())
}
