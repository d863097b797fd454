//! Data models for the sync core

mod conflict;
mod operation;
mod status;

pub use conflict::{
    record_timestamp, ConflictResolution, ConflictStrategy, DataConflict, ResolutionAction,
};
pub use operation::{NewOperation, OperationId, OperationKind, OperationStatus, QueueOperation};
pub use status::{SyncPhase, SyncResult, SyncStatus};
