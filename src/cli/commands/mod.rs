mod bind;
mod category;
mod collect;
mod record;
mod source;
mod status;
mod taxonomy;

pub use bind::{cmd_bind_add, cmd_bind_list, cmd_bind_remove};
pub use category::{cmd_category_add, cmd_category_list};
pub use collect::{CollectArgs, cmd_collect};
pub use record::cmd_record_lock;
pub use source::{
    cmd_source_add, cmd_source_filters, cmd_source_list, cmd_source_remove, cmd_source_rules,
    cmd_source_show,
};
pub use status::{cmd_cancel, cmd_status};
pub use taxonomy::cmd_taxonomy;

use crate::collect::CollectionSource;
use crate::db::Store;
use crate::domain::SourceId;

/// Looks a source up by numeric ID first, then by name.
pub(crate) async fn resolve_source(
    store: &Store,
    id_or_name: &str,
) -> anyhow::Result<Option<CollectionSource>> {
    if let Ok(id) = id_or_name.trim().parse::<i32>()
        && let Some(source) = store.get_source(SourceId::new(id)).await?
    {
        return Ok(Some(source));
    }
    store.get_source_by_name(id_or_name.trim()).await
}
