//! Durable holding area for mutations awaiting replay.
//!
//! `QueueStore` is the contract the sync engine drains. Two stores ship with
//! the crate: `MemoryQueueStore` for tests and ephemeral sessions, and
//! `LibSqlQueueStore`, which persists records in the local libSQL database.

mod libsql_store;
mod memory;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{DataConflict, NewOperation, OperationId, OperationStatus, QueueOperation};

pub use libsql_store::LibSqlQueueStore;
pub use memory::MemoryQueueStore;

/// Bookkeeping written after a failed replay attempt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationUpdate {
    pub retries: Option<u32>,
    pub last_attempt: Option<i64>,
    pub error: Option<String>,
}

impl OperationUpdate {
    /// Record one more failed attempt at `now`
    pub fn failed_attempt(retries: u32, now: i64, error: impl Into<String>) -> Self {
        Self {
            retries: Some(retries),
            last_attempt: Some(now),
            error: Some(error.into()),
        }
    }

    fn apply(&self, op: &mut QueueOperation) {
        if let Some(retries) = self.retries {
            op.retries = retries;
        }
        if let Some(last_attempt) = self.last_attempt {
            op.last_attempt = Some(last_attempt);
        }
        if let Some(error) = &self.error {
            op.error = Some(error.clone());
        }
    }
}

/// Record counts per status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub conflict: usize,
}

impl QueueStats {
    pub const fn total(&self) -> usize {
        self.pending + self.completed + self.failed + self.conflict
    }

    /// Records that still need attention (everything but completed)
    pub const fn outstanding(&self) -> usize {
        self.pending + self.failed + self.conflict
    }

    fn count(&mut self, status: OperationStatus) {
        match status {
            OperationStatus::Pending => self.pending += 1,
            OperationStatus::Completed => self.completed += 1,
            OperationStatus::Failed => self.failed += 1,
            OperationStatus::Conflict => self.conflict += 1,
        }
    }
}

/// Storage operations for queued mutations.
///
/// Mutating an unknown id is a no-op. The processing flag is process-local
/// state and is never persisted.
#[allow(async_fn_in_trait)]
pub trait QueueStore {
    /// Buffer a new mutation; returns its assigned id
    async fn enqueue(&self, op: NewOperation) -> Result<OperationId>;

    /// Get a record by id
    async fn get(&self, id: &OperationId) -> Result<Option<QueueOperation>>;

    /// Pending records, oldest first
    async fn get_pending(&self) -> Result<Vec<QueueOperation>>;

    /// All records, or only those with `status`, oldest first
    async fn list(&self, status: Option<OperationStatus>) -> Result<Vec<QueueOperation>>;

    /// Apply retry bookkeeping to a record
    async fn update(&self, id: &OperationId, update: OperationUpdate) -> Result<()>;

    /// Tombstone a record as applied
    async fn mark_completed(&self, id: &OperationId) -> Result<()>;

    /// Move a record out of automatic replay with a terminal error
    async fn mark_failed(&self, id: &OperationId, error: &str) -> Result<()>;

    /// Park a record until the user resolves `conflict`
    async fn mark_conflict(&self, id: &OperationId, conflict: &DataConflict) -> Result<()>;

    /// Return a failed or conflicted record to pending with a fresh retry budget
    async fn requeue(&self, id: &OperationId) -> Result<()>;

    /// Discard a record
    async fn remove(&self, id: &OperationId) -> Result<()>;

    /// Drop completed tombstones; returns how many were removed
    async fn purge_completed(&self) -> Result<usize>;

    /// Drop every record
    async fn clear(&self) -> Result<()>;

    /// Counts per status
    async fn stats(&self) -> Result<QueueStats> {
        let mut stats = QueueStats::default();
        for op in self.list(None).await? {
            stats.count(op.status);
        }
        Ok(stats)
    }

    /// Whether a drain pass currently holds the queue
    fn is_processing(&self) -> bool;

    /// Set or clear the drain flag
    fn set_processing(&self, value: bool);

    /// Atomically claim the drain flag; false if another pass holds it
    fn try_begin_processing(&self) -> bool;
}
