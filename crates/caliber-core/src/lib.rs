//! caliber-core - Offline sync core for Caliber Vault
//!
//! This crate contains the offline operation queue, the conflict resolver and
//! the sync engine that replays queued mutations against the hosted backend
//! once connectivity returns. UI surfaces consume it through the status
//! stream and the per-pass `SyncResult`.

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod resolver;
pub mod sync;
pub mod util;

pub use config::{RetryPolicy, SyncConfig};
pub use error::{Error, Result};
pub use models::{
    ConflictResolution, ConflictStrategy, DataConflict, NewOperation, OperationId,
    OperationKind, OperationStatus, QueueOperation, ResolutionAction, SyncPhase, SyncResult,
    SyncStatus,
};
pub use resolver::ConflictResolver;
pub use sync::{ConflictChoice, Subscription, SyncEngine};
