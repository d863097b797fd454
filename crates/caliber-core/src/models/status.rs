//! Sync status stream and batch result models

use serde::{Deserialize, Serialize};

/// Coarse state published to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    #[default]
    Idle,
    Syncing,
    Error,
}

/// One event on the status stream
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    #[serde(rename = "status")]
    pub phase: SyncPhase,
    /// Percentage in `0.0..=100.0`
    pub progress: f64,
}

impl SyncStatus {
    pub const fn idle() -> Self {
        Self {
            phase: SyncPhase::Idle,
            progress: 100.0,
        }
    }

    pub const fn syncing(progress: f64) -> Self {
        Self {
            phase: SyncPhase::Syncing,
            progress,
        }
    }

    pub const fn error(progress: f64) -> Self {
        Self {
            phase: SyncPhase::Error,
            progress,
        }
    }
}

/// Aggregate outcome of one drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncResult {
    /// Operations applied and marked completed
    pub success: usize,
    /// Operations that became permanently failed during this pass
    pub failed: usize,
    /// Conflicts detected on update operations
    pub conflicts: usize,
}

impl SyncResult {
    pub const fn is_empty(&self) -> bool {
        self.success == 0 && self.failed == 0 && self.conflicts == 0
    }
}
