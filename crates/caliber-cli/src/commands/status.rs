use std::path::Path;

use caliber_core::queue::QueueStore;

use crate::commands::common::{format_stats_lines, open_queue};
use crate::error::CliError;

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_queue(db_path).await?;
    let stats = store.stats().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        for line in format_stats_lines(&stats) {
            println!("{line}");
        }
    }
    Ok(())
}
