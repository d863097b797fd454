//! In-process queue store

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{OperationUpdate, QueueStore};
use crate::error::Result;
use crate::models::{DataConflict, NewOperation, OperationId, OperationStatus, QueueOperation};

/// Queue store backed by a `Vec` in insertion order
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    operations: Mutex<Vec<QueueOperation>>,
    processing: AtomicBool,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed record, e.g. one restored from elsewhere
    pub fn insert(&self, op: QueueOperation) {
        self.operations.lock().push(op);
    }

    fn with_operation(&self, id: &OperationId, f: impl FnOnce(&mut QueueOperation)) {
        let mut operations = self.operations.lock();
        if let Some(op) = operations.iter_mut().find(|op| op.id == *id) {
            f(op);
        }
    }

    fn sorted(mut operations: Vec<QueueOperation>) -> Vec<QueueOperation> {
        // stable: equal timestamps keep insertion order
        operations.sort_by_key(|op| op.enqueued_at);
        operations
    }
}

impl QueueStore for MemoryQueueStore {
    async fn enqueue(&self, op: NewOperation) -> Result<OperationId> {
        let operation = QueueOperation::from_new(op);
        let id = operation.id;
        tracing::debug!("Enqueued {} on {} as {}", operation.kind, operation.table, id);
        self.operations.lock().push(operation);
        Ok(id)
    }

    async fn get(&self, id: &OperationId) -> Result<Option<QueueOperation>> {
        Ok(self.operations.lock().iter().find(|op| op.id == *id).cloned())
    }

    async fn get_pending(&self) -> Result<Vec<QueueOperation>> {
        self.list(Some(OperationStatus::Pending)).await
    }

    async fn list(&self, status: Option<OperationStatus>) -> Result<Vec<QueueOperation>> {
        let operations = self
            .operations
            .lock()
            .iter()
            .filter(|op| status.is_none_or(|status| op.status == status))
            .cloned()
            .collect();
        Ok(Self::sorted(operations))
    }

    async fn update(&self, id: &OperationId, update: OperationUpdate) -> Result<()> {
        self.with_operation(id, |op| update.apply(op));
        Ok(())
    }

    async fn mark_completed(&self, id: &OperationId) -> Result<()> {
        self.with_operation(id, |op| {
            op.status = OperationStatus::Completed;
            op.conflict = None;
        });
        Ok(())
    }

    async fn mark_failed(&self, id: &OperationId, error: &str) -> Result<()> {
        self.with_operation(id, |op| {
            op.status = OperationStatus::Failed;
            op.error = Some(error.to_string());
        });
        Ok(())
    }

    async fn mark_conflict(&self, id: &OperationId, conflict: &DataConflict) -> Result<()> {
        self.with_operation(id, |op| {
            op.status = OperationStatus::Conflict;
            op.conflict = Some(conflict.clone());
        });
        Ok(())
    }

    async fn requeue(&self, id: &OperationId) -> Result<()> {
        self.with_operation(id, |op| {
            op.status = OperationStatus::Pending;
            op.retries = 0;
            op.last_attempt = None;
            op.error = None;
            op.conflict = None;
        });
        Ok(())
    }

    async fn remove(&self, id: &OperationId) -> Result<()> {
        self.operations.lock().retain(|op| op.id != *id);
        Ok(())
    }

    async fn purge_completed(&self) -> Result<usize> {
        let mut operations = self.operations.lock();
        let before = operations.len();
        operations.retain(|op| op.status != OperationStatus::Completed);
        Ok(before - operations.len())
    }

    async fn clear(&self) -> Result<()> {
        self.operations.lock().clear();
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enqueue_and_get_pending_in_order() {
        let store = MemoryQueueStore::new();
        let a = store
            .enqueue(NewOperation::create("firearms", json!({"make": "Ruger"})))
            .await
            .unwrap();
        let b = store
            .enqueue(NewOperation::delete("firearms", "row-2"))
            .await
            .unwrap();

        let pending = store.get_pending().await.unwrap();
        let ids: Vec<_> = pending.iter().map(|op| op.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_same_timestamp_keeps_insertion_order() {
        let store = MemoryQueueStore::new();
        let mut later = QueueOperation::from_new(NewOperation::delete("ammo", "b"));
        let mut earlier = QueueOperation::from_new(NewOperation::delete("ammo", "a"));
        later.enqueued_at = 100;
        earlier.enqueued_at = 100;
        store.insert(later.clone());
        store.insert(earlier.clone());

        let pending = store.get_pending().await.unwrap();
        assert_eq!(pending[0].id, later.id);
        assert_eq!(pending[1].id, earlier.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_terminal_states_leave_pending() {
        let store = MemoryQueueStore::new();
        let done = store
            .enqueue(NewOperation::delete("ammo", "1"))
            .await
            .unwrap();
        let failed = store
            .enqueue(NewOperation::delete("ammo", "2"))
            .await
            .unwrap();
        let conflicted = store
            .enqueue(NewOperation::update("ammo", json!({"id": "3"})))
            .await
            .unwrap();

        store.mark_completed(&done).await.unwrap();
        store.mark_failed(&failed, "boom").await.unwrap();
        let conflict = DataConflict::from_versions("3", "ammo", json!({}), json!({}));
        store.mark_conflict(&conflicted, &conflict).await.unwrap();

        assert!(store.get_pending().await.unwrap().is_empty());
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.conflict, 1);
        assert_eq!(stats.outstanding(), 2);

        let parked = store.get(&conflicted).await.unwrap().unwrap();
        assert_eq!(parked.conflict, Some(conflict));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_requeue_resets_budget() {
        let store = MemoryQueueStore::new();
        let id = store
            .enqueue(NewOperation::delete("optics", "9"))
            .await
            .unwrap();
        store
            .update(&id, OperationUpdate::failed_attempt(5, 1_000, "timeout"))
            .await
            .unwrap();
        store.mark_failed(&id, "timeout").await.unwrap();

        store.requeue(&id).await.unwrap();
        let op = store.get(&id).await.unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retries, 0);
        assert!(op.last_attempt.is_none());
        assert!(op.error.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_ids_are_ignored() {
        let store = MemoryQueueStore::new();
        let missing = OperationId::new();
        store.mark_completed(&missing).await.unwrap();
        store
            .update(&missing, OperationUpdate::failed_attempt(1, 1, "x"))
            .await
            .unwrap();
        store.remove(&missing).await.unwrap();
        assert_eq!(store.stats().await.unwrap().total(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_purge_and_clear() {
        let store = MemoryQueueStore::new();
        let a = store.enqueue(NewOperation::delete("ammo", "1")).await.unwrap();
        store.enqueue(NewOperation::delete("ammo", "2")).await.unwrap();
        store.mark_completed(&a).await.unwrap();

        assert_eq!(store.purge_completed().await.unwrap(), 1);
        assert_eq!(store.list(None).await.unwrap().len(), 1);

        store.clear().await.unwrap();
        assert!(store.list(None).await.unwrap().is_empty());
    }

    #[test]
    fn test_processing_flag_is_single_flight() {
        let store = MemoryQueueStore::new();
        assert!(!store.is_processing());
        assert!(store.try_begin_processing());
        assert!(!store.try_begin_processing());
        assert!(store.is_processing());
        store.set_processing(false);
        assert!(store.try_begin_processing());
    }
}
