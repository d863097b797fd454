use std::path::Path;

use caliber_core::queue::QueueStore;
use caliber_core::{OperationId, OperationStatus};

use crate::commands::common::{normalize_operation_identifier, open_queue, resolve_operation};
use crate::error::CliError;

pub async fn run_retry(id: Option<&str>, all_failed: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_queue(db_path).await?;
    let requeued = requeue(&store, id, all_failed).await?;
    for id in &requeued {
        println!("{id}");
    }
    if requeued.is_empty() {
        println!("No failed operations to retry.");
    }
    Ok(())
}

/// Return the selected records to pending; returns their ids
pub async fn requeue(
    store: &impl QueueStore,
    id: Option<&str>,
    all_failed: bool,
) -> Result<Vec<OperationId>, CliError> {
    if all_failed {
        let mut ids = Vec::new();
        for op in store.list(Some(OperationStatus::Failed)).await? {
            store.requeue(&op.id).await?;
            ids.push(op.id);
        }
        return Ok(ids);
    }

    let query = normalize_operation_identifier(id.ok_or(CliError::MissingRetryTarget)?)?;
    let op = resolve_operation(&query, store).await?;
    if !matches!(op.status, OperationStatus::Failed | OperationStatus::Conflict) {
        return Err(CliError::NotRetryable(op.id.to_string(), op.status));
    }
    store.requeue(&op.id).await?;
    Ok(vec![op.id])
}
