//! Drain loop and manual conflict resolution

use std::sync::Arc;

use serde_json::{Map, Value};

use super::listeners::{StatusListeners, Subscription};
use crate::backend::{Backend, BackendError, OWNER_COLUMN};
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::{
    DataConflict, OperationId, OperationKind, OperationStatus, QueueOperation,
    ResolutionAction, SyncResult, SyncStatus,
};
use crate::queue::{OperationUpdate, QueueStore};
use crate::resolver::ConflictResolver;
use crate::util::{compact_error, unix_millis_now};

/// User decision for an operation parked in `conflict`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictChoice {
    /// Write the queued version over the server row
    KeepLocal,
    /// Drop the queued change
    KeepServer,
    /// Write the shallow merge of both versions
    Merge,
}

/// How a dispatched operation ended
enum Outcome {
    Applied,
    AppliedWithConflict,
    ServerKept,
    Deferred(DataConflict),
}

enum DispatchError {
    /// The record can never be replayed as stored
    Malformed(String),
    /// The backend rejected or could not take the write
    Backend(BackendError),
}

impl From<BackendError> for DispatchError {
    fn from(error: BackendError) -> Self {
        Self::Backend(error)
    }
}

/// Clears the processing flag on every exit path of a drain
struct ProcessingGuard<'a, Q: QueueStore> {
    queue: &'a Q,
}

impl<Q: QueueStore> Drop for ProcessingGuard<'_, Q> {
    fn drop(&mut self) {
        self.queue.set_processing(false);
    }
}

/// Replays queued operations against a backend
pub struct SyncEngine<Q, B> {
    queue: Arc<Q>,
    backend: Arc<B>,
    config: SyncConfig,
    resolver: ConflictResolver,
    listeners: StatusListeners,
}

impl<Q, B> std::fmt::Debug for SyncEngine<Q, B> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl<Q: QueueStore, B: Backend> SyncEngine<Q, B> {
    /// Build an engine over `queue` and `backend`; the resolver takes its
    /// threshold from `config`
    pub fn new(queue: Arc<Q>, backend: Arc<B>, config: SyncConfig) -> Self {
        let resolver = ConflictResolver::new(config.conflict_threshold_ms);
        Self {
            queue,
            backend,
            config,
            resolver,
            listeners: StatusListeners::default(),
        }
    }

    /// Store the engine drains
    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    /// Settings the engine was built with
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Resolver used for automatic and manual decisions
    pub const fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    /// Register a status callback.
    ///
    /// Callbacks run synchronously on the task driving the drain.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.listeners.subscribe(Arc::new(callback))
    }

    /// Drain pending operations on behalf of `owner_id`.
    ///
    /// Returns an empty result without touching the queue when another drain
    /// already holds it. Per-operation failures never abort the pass.
    pub async fn process_queue(&self, owner_id: &str) -> Result<SyncResult> {
        let owner_id = owner_id.trim();
        if owner_id.is_empty() {
            return Err(Error::InvalidInput(
                "owner id must not be empty".to_string(),
            ));
        }

        if !self.queue.try_begin_processing() {
            tracing::debug!("Sync already in progress, skipping");
            return Ok(SyncResult::default());
        }
        let _guard = ProcessingGuard {
            queue: self.queue.as_ref(),
        };

        self.listeners.publish(SyncStatus::syncing(0.0));

        let pending = match self.queue.get_pending().await {
            Ok(pending) => pending,
            Err(error) => {
                tracing::error!("Failed to read sync queue: {}", error);
                self.listeners.publish(SyncStatus::error(0.0));
                return Err(error);
            }
        };

        let total = pending.len();
        tracing::info!("Processing {} queued operation(s)", total);

        let mut result = SyncResult::default();
        for (index, op) in pending.iter().enumerate() {
            self.process_operation(op, owner_id, &mut result).await;
            self.listeners
                .publish(SyncStatus::syncing(progress(index + 1, total)));
        }

        tracing::info!(
            "Sync finished: {} succeeded, {} failed, {} conflict(s)",
            result.success,
            result.failed,
            result.conflicts
        );
        self.listeners.publish(SyncStatus::idle());
        Ok(result)
    }

    /// Settle an operation parked in `conflict` with the user's choice
    pub async fn resolve_conflict(
        &self,
        id: &OperationId,
        owner_id: &str,
        choice: ConflictChoice,
    ) -> Result<()> {
        let owner_id = owner_id.trim();
        if owner_id.is_empty() {
            return Err(Error::InvalidInput(
                "owner id must not be empty".to_string(),
            ));
        }

        let op = self
            .queue
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if op.status != OperationStatus::Conflict {
            return Err(Error::InvalidInput(format!(
                "operation {id} is {}, not conflict",
                op.status
            )));
        }
        if !op.is_owned_by(owner_id) {
            return Err(Error::InvalidInput(format!(
                "operation {id} belongs to another user"
            )));
        }

        if !self.queue.try_begin_processing() {
            return Err(Error::InvalidInput(
                "sync is in progress, try again when it finishes".to_string(),
            ));
        }
        let _guard = ProcessingGuard {
            queue: self.queue.as_ref(),
        };

        let row_id = op
            .row_id()
            .ok_or_else(|| Error::InvalidInput(format!("operation {id} has no row id")))?;

        match choice {
            ConflictChoice::KeepServer => {}
            ConflictChoice::KeepLocal => {
                let fields = update_fields(&op.data)
                    .ok_or_else(|| Error::InvalidInput(format!("operation {id} has no fields")))?;
                self.backend
                    .update(&op.table, &row_id, &fields, owner_id)
                    .await?;
            }
            ConflictChoice::Merge => {
                let server = op
                    .conflict
                    .as_ref()
                    .map_or(Value::Null, |conflict| conflict.server_data.clone());
                let merged = self.resolver.merge_data(&op.data, &server);
                let fields = update_fields(&merged)
                    .ok_or_else(|| Error::InvalidInput(format!("operation {id} has no fields")))?;
                self.backend
                    .update(&op.table, &row_id, &fields, owner_id)
                    .await?;
            }
        }

        tracing::info!("Resolved conflict on {}/{} with {:?}", op.table, row_id, choice);
        self.queue.mark_completed(id).await
    }

    async fn process_operation(&self, op: &QueueOperation, owner_id: &str, result: &mut SyncResult) {
        if !op.is_owned_by(owner_id) {
            tracing::debug!("Skipping operation {} owned by another user", op.id);
            return;
        }

        let now = unix_millis_now();
        if !self.config.retry.is_eligible(op.retries, op.last_attempt, now) {
            tracing::debug!(
                "Operation {} is backing off after {} attempt(s)",
                op.id,
                op.retries
            );
            return;
        }

        match self.dispatch(op, owner_id).await {
            Ok(Outcome::Applied) => {
                self.complete(op).await;
                result.success += 1;
            }
            Ok(Outcome::AppliedWithConflict) => {
                self.complete(op).await;
                result.success += 1;
                result.conflicts += 1;
            }
            Ok(Outcome::ServerKept) => {
                self.complete(op).await;
                result.conflicts += 1;
            }
            Ok(Outcome::Deferred(conflict)) => {
                tracing::warn!(
                    "Operation {} on {}/{} needs manual resolution",
                    op.id,
                    conflict.table,
                    conflict.id
                );
                if let Err(error) = self.queue.mark_conflict(&op.id, &conflict).await {
                    tracing::error!("Failed to park operation {}: {}", op.id, error);
                }
                result.conflicts += 1;
            }
            Err(DispatchError::Malformed(reason)) => {
                tracing::error!("Dropping malformed operation {}: {}", op.id, reason);
                if let Err(error) = self.queue.mark_failed(&op.id, &reason).await {
                    tracing::error!("Failed to mark operation {} failed: {}", op.id, error);
                }
                result.failed += 1;
            }
            Err(DispatchError::Backend(error)) => {
                if self.record_failure(op, &error, now).await {
                    result.failed += 1;
                }
            }
        }
    }

    async fn dispatch(
        &self,
        op: &QueueOperation,
        owner_id: &str,
    ) -> std::result::Result<Outcome, DispatchError> {
        let Value::Object(data) = &op.data else {
            return Err(DispatchError::Malformed(
                "payload is not a JSON object".to_string(),
            ));
        };

        if op.has_conflicting_owner() {
            return Err(DispatchError::Malformed(format!(
                "payload {OWNER_COLUMN} does not match the operation owner"
            )));
        }

        match op.kind {
            OperationKind::Create => {
                let mut row = data.clone();
                row.insert(OWNER_COLUMN.to_string(), Value::String(owner_id.to_string()));
                self.backend.insert(&op.table, &Value::Object(row)).await?;
                Ok(Outcome::Applied)
            }
            OperationKind::Update => {
                let row_id = op.row_id().ok_or_else(|| {
                    DispatchError::Malformed("update is missing data.id".to_string())
                })?;
                self.dispatch_update(op, &row_id, owner_id).await
            }
            OperationKind::Delete => {
                let row_id = op.row_id().ok_or_else(|| {
                    DispatchError::Malformed("delete is missing data.id".to_string())
                })?;
                self.backend.delete(&op.table, &row_id, owner_id).await?;
                Ok(Outcome::Applied)
            }
        }
    }

    async fn dispatch_update(
        &self,
        op: &QueueOperation,
        row_id: &str,
        owner_id: &str,
    ) -> std::result::Result<Outcome, DispatchError> {
        if self.config.detect_conflicts {
            let server = self.backend.fetch(&op.table, row_id, owner_id).await?;
            if self.resolver.detect_conflict(Some(&op.data), server.as_ref()) {
                let server = server.unwrap_or(Value::Null);
                let conflict =
                    DataConflict::from_versions(row_id, &op.table, op.data.clone(), server);
                let resolution = self
                    .resolver
                    .resolve(&conflict, self.config.conflict_strategy);
                tracing::info!(
                    "Conflict on {}/{}: {} ({})",
                    op.table,
                    row_id,
                    resolution.reason,
                    self.config.conflict_strategy
                );

                return match resolution.action {
                    ResolutionAction::UseServer => Ok(Outcome::ServerKept),
                    ResolutionAction::Skip => Ok(Outcome::Deferred(conflict)),
                    // Automatic strategies never merge; the arm writes whatever
                    // version the resolution carries.
                    ResolutionAction::UseClient | ResolutionAction::Merge => {
                        let data = resolution.data.as_ref().unwrap_or(&op.data);
                        self.write_update(op, row_id, data, owner_id).await?;
                        Ok(Outcome::AppliedWithConflict)
                    }
                };
            }
        }

        self.write_update(op, row_id, &op.data, owner_id).await?;
        Ok(Outcome::Applied)
    }

    async fn write_update(
        &self,
        op: &QueueOperation,
        row_id: &str,
        data: &Value,
        owner_id: &str,
    ) -> std::result::Result<(), DispatchError> {
        let fields = update_fields(data).ok_or_else(|| {
            DispatchError::Malformed("update payload is not a JSON object".to_string())
        })?;
        self.backend
            .update(&op.table, row_id, &fields, owner_id)
            .await?;
        Ok(())
    }

    async fn complete(&self, op: &QueueOperation) {
        tracing::debug!("Applied {} on {} ({})", op.kind, op.table, op.id);
        if let Err(error) = self.queue.mark_completed(&op.id).await {
            tracing::error!("Failed to mark operation {} completed: {}", op.id, error);
        }
    }

    /// Record a failed attempt; returns true when the operation is now failed
    async fn record_failure(&self, op: &QueueOperation, error: &BackendError, now: i64) -> bool {
        let retries = op.retries.saturating_add(1);
        let message = compact_error(&error.to_string());

        let update = OperationUpdate::failed_attempt(retries, now, message.clone());
        if let Err(store_error) = self.queue.update(&op.id, update).await {
            tracing::error!("Failed to record attempt for {}: {}", op.id, store_error);
        }

        if self.config.retry.is_exhausted(retries) {
            tracing::error!(
                "Operation {} failed after {} attempt(s): {}",
                op.id,
                retries,
                message
            );
            if let Err(store_error) = self.queue.mark_failed(&op.id, &message).await {
                tracing::error!("Failed to mark operation {} failed: {}", op.id, store_error);
            }
            return true;
        }

        tracing::warn!(
            "Operation {} failed (attempt {}/{}): {}",
            op.id,
            retries,
            self.config.retry.max_retries,
            message
        );
        false
    }
}

/// Row fields to write, without the identity or ownership columns
fn update_fields(data: &Value) -> Option<Value> {
    let Value::Object(data) = data else {
        return None;
    };
    let fields: Map<String, Value> = data
        .iter()
        .filter(|(key, _)| key.as_str() != "id" && key.as_str() != OWNER_COLUMN)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Some(Value::Object(fields))
}

#[allow(clippy::cast_precision_loss)]
fn progress(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    done as f64 / total as f64 * 100.0
}
