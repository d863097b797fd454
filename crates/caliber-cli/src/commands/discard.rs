use std::path::Path;

use caliber_core::queue::QueueStore;

use crate::commands::common::{normalize_operation_identifier, open_queue, resolve_operation};
use crate::error::CliError;

pub async fn run_discard(id: &str, db_path: &Path) -> Result<(), CliError> {
    let query = normalize_operation_identifier(id)?;
    let store = open_queue(db_path).await?;
    let op = resolve_operation(&query, &store).await?;

    store.remove(&op.id).await?;
    println!("{}", op.id);
    Ok(())
}
