use std::env;
use std::path::{Path, PathBuf};

use caliber_core::queue::{LibSqlQueueStore, QueueStats, QueueStore};
use caliber_core::{
    NewOperation, OperationId, OperationKind, QueueOperation, SyncPhase, SyncResult, SyncStatus,
};
use chrono::DateTime;
use serde_json::Value;

use crate::error::CliError;

pub const DB_PATH_ENV: &str = "CALIBER_QUEUE_DB";

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("caliber").join("queue.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub async fn open_queue(path: &Path) -> Result<LibSqlQueueStore, CliError> {
    Ok(LibSqlQueueStore::open(path).await?)
}

pub fn normalize_operation_identifier(id: &str) -> Result<String, CliError> {
    let id = id.trim();
    if id.is_empty() {
        Err(CliError::EmptyOperationId)
    } else {
        Ok(id.to_ascii_lowercase())
    }
}

pub fn normalize_owner(owner: &str) -> Result<String, CliError> {
    let owner = owner.trim();
    if owner.is_empty() {
        Err(CliError::EmptyOwner)
    } else {
        Ok(owner.to_string())
    }
}

/// Find a record by full id or unique id prefix
pub async fn resolve_operation(
    query: &str,
    store: &impl QueueStore,
) -> Result<QueueOperation, CliError> {
    if let Ok(id) = query.parse::<OperationId>() {
        if let Some(op) = store.get(&id).await? {
            return Ok(op);
        }
    }

    let mut matching = store
        .list(None)
        .await?
        .into_iter()
        .filter(|op| op.id.as_str().starts_with(query))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::OperationNotFound(query.to_string())),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|op| short_id(&op.id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousOperationId(format!(
                "Operation ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Build enqueue input from command-line arguments
pub fn parse_operation(
    kind: OperationKind,
    table: &str,
    payload: &str,
    owner: Option<&str>,
) -> Result<NewOperation, CliError> {
    let table = table.trim();
    if table.is_empty() {
        return Err(CliError::EmptyTable);
    }

    let data: Value = serde_json::from_str(payload)
        .map_err(|error| CliError::InvalidPayload(error.to_string()))?;
    if !data.is_object() {
        return Err(CliError::InvalidPayload(
            "payload must be a JSON object".to_string(),
        ));
    }
    if matches!(kind, OperationKind::Update | OperationKind::Delete) && data.get("id").is_none() {
        return Err(CliError::InvalidPayload(format!(
            "{kind} payload must include an id"
        )));
    }

    let op = NewOperation {
        kind,
        table: table.to_string(),
        data,
        owner_id: None,
    };
    match owner {
        Some(owner) => Ok(op.with_owner(normalize_owner(owner)?)),
        None => Ok(op),
    }
}

pub fn short_id(id: &OperationId) -> String {
    id.as_str().chars().take(13).collect()
}

pub fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_operation_lines(operations: &[QueueOperation]) -> Vec<String> {
    operations
        .iter()
        .map(|op| {
            let mut line = format!(
                "{}  {:<9} {:<6} {:<16} retries={} queued={}",
                short_id(&op.id),
                op.status.as_str(),
                op.kind.as_str(),
                op.table,
                op.retries,
                format_timestamp(op.enqueued_at)
            );
            if let Some(row_id) = op.row_id() {
                line.push_str(&format!(" row={row_id}"));
            }
            if let Some(error) = &op.error {
                line.push_str(&format!(" error={error}"));
            }
            line
        })
        .collect()
}

pub fn format_stats_lines(stats: &QueueStats) -> Vec<String> {
    vec![
        format!("pending    {}", stats.pending),
        format!("completed  {}", stats.completed),
        format!("failed     {}", stats.failed),
        format!("conflict   {}", stats.conflict),
        format!("total      {}", stats.total()),
    ]
}

pub fn format_sync_status(status: &SyncStatus) -> String {
    let phase = match status.phase {
        SyncPhase::Idle => "idle",
        SyncPhase::Syncing => "syncing",
        SyncPhase::Error => "error",
    };
    format!("[{phase}] {:.0}%", status.progress)
}

pub fn format_sync_result(result: &SyncResult) -> String {
    format!(
        "Sync finished: {} succeeded, {} failed, {} conflict(s)",
        result.success, result.failed, result.conflicts
    )
}
