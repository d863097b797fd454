//! Conflict resolution between queued changes and server state
//!
//! The resolver is a pure decision function: it never touches the queue or
//! the backend, so every verdict can be checked in isolation.

use serde_json::Value;

use crate::config::DEFAULT_CONFLICT_THRESHOLD_MS;
use crate::models::record_timestamp;
use crate::models::{ConflictResolution, ConflictStrategy, DataConflict, ResolutionAction};

/// Decides winners between diverged row versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictResolver {
    threshold_ms: i64,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONFLICT_THRESHOLD_MS)
    }
}

impl ConflictResolver {
    /// Create a resolver that ignores timestamp gaps up to `threshold_ms`
    pub const fn new(threshold_ms: i64) -> Self {
        Self { threshold_ms }
    }

    /// Pick a winner for `conflict` under `strategy`.
    ///
    /// With `newest-wins`, equal timestamps resolve to the server version.
    pub fn resolve(&self, conflict: &DataConflict, strategy: ConflictStrategy) -> ConflictResolution {
        tracing::debug!(
            "Resolving conflict on {}/{} with strategy {}",
            conflict.table,
            conflict.id,
            strategy
        );

        match strategy {
            ConflictStrategy::ServerWins => ConflictResolution {
                action: ResolutionAction::UseServer,
                data: Some(conflict.server_data.clone()),
                reason: "Server data takes precedence".to_string(),
            },
            ConflictStrategy::ClientWins => ConflictResolution {
                action: ResolutionAction::UseClient,
                data: Some(conflict.local_data.clone()),
                reason: "Client data takes precedence".to_string(),
            },
            ConflictStrategy::NewestWins => {
                if conflict.local_timestamp > conflict.server_timestamp {
                    ConflictResolution {
                        action: ResolutionAction::UseClient,
                        data: Some(conflict.local_data.clone()),
                        reason: "Client data is newer".to_string(),
                    }
                } else if conflict.local_timestamp == conflict.server_timestamp {
                    ConflictResolution {
                        action: ResolutionAction::UseServer,
                        data: Some(conflict.server_data.clone()),
                        reason: "Timestamps are equal; server is canonical".to_string(),
                    }
                } else {
                    ConflictResolution {
                        action: ResolutionAction::UseServer,
                        data: Some(conflict.server_data.clone()),
                        reason: "Server data is newer".to_string(),
                    }
                }
            }
            ConflictStrategy::Manual => ConflictResolution {
                action: ResolutionAction::Skip,
                data: None,
                reason: "Manual resolution required".to_string(),
            },
        }
    }

    /// Shallow merge with the server version as the base.
    ///
    /// A local field replaces the server's only when the local value is
    /// non-null and the server value is null or missing. Nested objects and
    /// arrays are treated as opaque values, not merged recursively.
    pub fn merge_data(&self, local: &Value, server: &Value) -> Value {
        let (Value::Object(local), Value::Object(server)) = (local, server) else {
            return if server.is_null() {
                local.clone()
            } else {
                server.clone()
            };
        };

        let mut merged = server.clone();
        for (key, value) in local {
            if value.is_null() {
                continue;
            }
            let server_missing = server.get(key).is_none_or(Value::is_null);
            if server_missing {
                merged.insert(key.clone(), value.clone());
            }
        }
        Value::Object(merged)
    }

    /// Whether two versions diverged by more than the threshold.
    ///
    /// Missing versions or unreadable timestamps never count as a conflict.
    pub fn detect_conflict(&self, local: Option<&Value>, server: Option<&Value>) -> bool {
        let (Some(local), Some(server)) = (local, server) else {
            return false;
        };
        if local.is_null() || server.is_null() {
            return false;
        }
        let (Some(local_time), Some(server_time)) =
            (record_timestamp(local), record_timestamp(server))
        else {
            return false;
        };

        local_time.abs_diff(server_time) > self.threshold_ms.unsigned_abs()
    }
}
