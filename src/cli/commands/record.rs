//! Record lock command handler

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_record_lock(config: &Config, id: i32, locked: bool) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    if !store.set_record_locked(id, locked).await? {
        println!("Record {id} not found.");
        return Ok(());
    }

    if locked {
        println!("✓ Record {id} locked; runs will no longer update it.");
    } else {
        println!("✓ Record {id} unlocked.");
    }
    Ok(())
}
