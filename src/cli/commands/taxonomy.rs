//! Remote taxonomy command handler

use crate::collect::taxonomy::Binder;
use crate::state::SharedState;

use super::resolve_source;

pub async fn cmd_taxonomy(state: &SharedState, id_or_name: &str) -> anyhow::Result<()> {
    let Some(source) = resolve_source(&state.store, id_or_name).await? else {
        println!("Source not found: {id_or_name}");
        return Ok(());
    };

    let page = state.context.fetch_taxonomy(&source).await?;
    if page.categories.is_empty() {
        println!("Source #{} published no categories.", source.id);
        return Ok(());
    }

    let binder = Binder::load(&state.store).await?;
    let described = binder.describe(source.id, &page.categories);

    println!("Remote categories of #{} {}", source.id, source.name);
    println!("{:-<60}", "");

    let mut unbound = 0;
    for (remote, local) in described {
        let indent = if remote.parent_id.is_empty() || remote.parent_id == "0" {
            ""
        } else {
            "  "
        };
        let bound = if local > 0 {
            format!("-> #{local}")
        } else {
            unbound += 1;
            "(unbound)".to_string()
        };
        println!("{indent}{:>6} {:<30} {bound}", remote.id, remote.name);
    }

    if unbound > 0 {
        println!();
        println!("{unbound} unbound; their records will be skipped.");
        println!(
            "Bind with: catalog-collect bind add {} <remote id> <local id>",
            source.id
        );
    }

    Ok(())
}
