use std::path::Path;

use caliber_core::queue::QueueStore;
use caliber_core::OperationKind;

use crate::commands::common::{open_queue, parse_operation};
use crate::error::CliError;

pub async fn run_enqueue(
    kind: OperationKind,
    table: &str,
    payload: &str,
    owner: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let op = parse_operation(kind, table, payload, owner)?;
    let store = open_queue(db_path).await?;
    let id = store.enqueue(op).await?;
    println!("{id}");
    Ok(())
}
