//! libSQL-backed queue store

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use libsql::{params, Connection, Row};

use super::{OperationUpdate, QueueStats, QueueStore};
use crate::db::Database;
use crate::error::Result;
use crate::models::{DataConflict, NewOperation, OperationId, OperationStatus, QueueOperation};

const SELECT_COLUMNS: &str = "SELECT id, kind, table_name, data, owner_id, enqueued_at, retries, \
     last_attempt, error, status, conflict FROM sync_queue";

/// Durable queue store persisted in the local database
pub struct LibSqlQueueStore {
    db: Database,
    processing: AtomicBool,
}

impl LibSqlQueueStore {
    /// Wrap an already-open database
    pub const fn new(db: Database) -> Self {
        Self {
            db,
            processing: AtomicBool::new(false),
        }
    }

    /// Open (or create) the queue database at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path).await?))
    }

    /// Open an in-memory queue (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    fn conn(&self) -> &Connection {
        self.db.connection()
    }

    async fn query_operations(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<QueueOperation>> {
        let mut rows = self.conn().query(sql, params).await?;
        let mut operations = Vec::new();
        let mut malformed = Vec::new();

        while let Some(row) = rows.next().await? {
            match parse_operation(&row) {
                Ok(op) => operations.push(op),
                Err(reason) => {
                    let id: String = row.get(0)?;
                    malformed.push((id, reason));
                }
            }
        }

        for (id, reason) in malformed {
            self.quarantine(&id, &reason).await?;
        }

        Ok(operations)
    }

    /// Take a record that cannot be decoded out of replay
    async fn quarantine(&self, id: &str, reason: &str) -> Result<()> {
        tracing::error!("Malformed queue record {}: {}", id, reason);
        self.conn()
            .execute(
                "UPDATE sync_queue SET status = 'failed', error = ? WHERE id = ?",
                params![format!("Malformed queue record: {reason}"), id],
            )
            .await?;
        Ok(())
    }
}

fn parse_operation(row: &Row) -> std::result::Result<QueueOperation, String> {
    let read = |error: libsql::Error| error.to_string();

    let id: String = row.get(0).map_err(read)?;
    let kind: String = row.get(1).map_err(read)?;
    let data: String = row.get(3).map_err(read)?;
    let status: String = row.get(9).map_err(read)?;
    let conflict: Option<String> = row.get(10).map_err(read)?;
    let retries: i64 = row.get(6).map_err(read)?;

    Ok(QueueOperation {
        id: id
            .parse()
            .map_err(|error| format!("invalid id {id}: {error}"))?,
        kind: kind.parse()?,
        table: row.get(2).map_err(read)?,
        data: serde_json::from_str(&data).map_err(|error| format!("invalid payload: {error}"))?,
        owner_id: row.get(4).map_err(read)?,
        enqueued_at: row.get(5).map_err(read)?,
        retries: u32::try_from(retries).map_err(|_| format!("invalid retry count {retries}"))?,
        last_attempt: row.get(7).map_err(read)?,
        error: row.get(8).map_err(read)?,
        status: status.parse()?,
        conflict: conflict
            .map(|conflict| serde_json::from_str::<DataConflict>(&conflict))
            .transpose()
            .map_err(|error| format!("invalid conflict snapshot: {error}"))?,
    })
}

impl QueueStore for LibSqlQueueStore {
    async fn enqueue(&self, op: NewOperation) -> Result<OperationId> {
        let operation = QueueOperation::from_new(op);
        self.conn()
            .execute(
                "INSERT INTO sync_queue (id, kind, table_name, data, owner_id, enqueued_at, retries, status)
                 VALUES (?, ?, ?, ?, ?, ?, 0, 'pending')",
                params![
                    operation.id.as_str(),
                    operation.kind.as_str(),
                    operation.table.clone(),
                    serde_json::to_string(&operation.data)?,
                    operation.owner_id.clone(),
                    operation.enqueued_at
                ],
            )
            .await?;

        tracing::debug!(
            "Enqueued {} on {} as {}",
            operation.kind,
            operation.table,
            operation.id
        );
        Ok(operation.id)
    }

    async fn get(&self, id: &OperationId) -> Result<Option<QueueOperation>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let operations = self.query_operations(&sql, params![id.as_str()]).await?;
        Ok(operations.into_iter().next())
    }

    async fn get_pending(&self) -> Result<Vec<QueueOperation>> {
        self.list(Some(OperationStatus::Pending)).await
    }

    async fn list(&self, status: Option<OperationStatus>) -> Result<Vec<QueueOperation>> {
        match status {
            Some(status) => {
                let sql = format!(
                    "{SELECT_COLUMNS} WHERE status = ? ORDER BY enqueued_at ASC, rowid ASC"
                );
                self.query_operations(&sql, params![status.as_str()]).await
            }
            None => {
                let sql = format!("{SELECT_COLUMNS} ORDER BY enqueued_at ASC, rowid ASC");
                self.query_operations(&sql, ()).await
            }
        }
    }

    async fn update(&self, id: &OperationId, update: OperationUpdate) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE sync_queue SET
                    retries = COALESCE(?, retries),
                    last_attempt = COALESCE(?, last_attempt),
                    error = COALESCE(?, error)
                 WHERE id = ?",
                params![
                    update.retries.map(i64::from),
                    update.last_attempt,
                    update.error,
                    id.as_str()
                ],
            )
            .await?;
        Ok(())
    }

    async fn mark_completed(&self, id: &OperationId) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE sync_queue SET status = 'completed', conflict = NULL WHERE id = ?",
                params![id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: &OperationId, error: &str) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE sync_queue SET status = 'failed', error = ? WHERE id = ?",
                params![error, id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn mark_conflict(&self, id: &OperationId, conflict: &DataConflict) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE sync_queue SET status = 'conflict', conflict = ? WHERE id = ?",
                params![serde_json::to_string(conflict)?, id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn requeue(&self, id: &OperationId) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE sync_queue SET
                    status = 'pending',
                    retries = 0,
                    last_attempt = NULL,
                    error = NULL,
                    conflict = NULL
                 WHERE id = ?",
                params![id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, id: &OperationId) -> Result<()> {
        self.conn()
            .execute("DELETE FROM sync_queue WHERE id = ?", params![id.as_str()])
            .await?;
        Ok(())
    }

    async fn purge_completed(&self) -> Result<usize> {
        let removed = self
            .conn()
            .execute("DELETE FROM sync_queue WHERE status = 'completed'", ())
            .await?;
        Ok(usize::try_from(removed).unwrap_or(usize::MAX))
    }

    async fn clear(&self) -> Result<()> {
        self.conn().execute("DELETE FROM sync_queue", ()).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats> {
        let mut rows = self
            .conn()
            .query("SELECT status, COUNT(*) FROM sync_queue GROUP BY status", ())
            .await?;

        let mut stats = QueueStats::default();
        while let Some(row) = rows.next().await? {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let count = usize::try_from(count).unwrap_or_default();
            match status.parse::<OperationStatus>() {
                Ok(OperationStatus::Pending) => stats.pending += count,
                Ok(OperationStatus::Completed) => stats.completed += count,
                Ok(OperationStatus::Failed) => stats.failed += count,
                Ok(OperationStatus::Conflict) => stats.conflict += count,
                Err(error) => tracing::warn!("Ignoring queue rows: {}", error),
            }
        }
        Ok(stats)
    }

    fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    fn set_processing(&self, value: bool) {
        self.processing.store(value, Ordering::Release);
    }

    fn try_begin_processing(&self) -> bool {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
