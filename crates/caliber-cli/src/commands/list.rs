use std::path::Path;

use caliber_core::queue::QueueStore;
use caliber_core::OperationStatus;

use crate::commands::common::{format_operation_lines, open_queue};
use crate::error::CliError;

pub async fn run_list(
    status: Option<OperationStatus>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_queue(db_path).await?;
    let operations = store.list(status).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&operations)?);
        return Ok(());
    }

    if operations.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    for line in format_operation_lines(&operations) {
        println!("{line}");
    }
    Ok(())
}
