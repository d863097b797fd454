use std::path::Path;

use caliber_core::queue::QueueStore;

use crate::commands::common::open_queue;
use crate::error::CliError;

pub async fn run_purge(db_path: &Path) -> Result<(), CliError> {
    let store = open_queue(db_path).await?;
    let removed = store.purge_completed().await?;
    println!("Removed {removed} completed operation(s)");
    Ok(())
}
