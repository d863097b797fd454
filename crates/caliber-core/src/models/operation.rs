//! Queued operation model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::DataConflict;

/// A unique identifier for a queued operation, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Create a new unique operation ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of mutation buffered in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "insert" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown operation type: {other}")),
        }
    }
}

/// Lifecycle state of a queued operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Waiting to be replayed
    #[default]
    Pending,
    /// Applied (or superseded by server state); kept as a tombstone
    Completed,
    /// Retry budget exhausted or rejected as malformed
    Failed,
    /// Parked until a user picks a side of a conflict
    Conflict,
}

impl OperationStatus {
    pub const ALL: [Self; 4] = [Self::Pending, Self::Completed, Self::Failed, Self::Conflict];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Conflict => "conflict",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "conflict" => Ok(Self::Conflict),
            other => Err(format!("unknown operation status: {other}")),
        }
    }
}

/// Input for enqueuing a new mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOperation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub table: String,
    pub data: Value,
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl NewOperation {
    /// Insert `data` as a new row of `table`
    pub fn create(table: impl Into<String>, data: Value) -> Self {
        Self {
            kind: OperationKind::Create,
            table: table.into(),
            data,
            owner_id: None,
        }
    }

    /// Update the row identified by `data.id`
    pub fn update(table: impl Into<String>, data: Value) -> Self {
        Self {
            kind: OperationKind::Update,
            table: table.into(),
            data,
            owner_id: None,
        }
    }

    /// Delete the row with the given identity
    pub fn delete(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Delete,
            table: table.into(),
            data: serde_json::json!({ "id": id.into() }),
            owner_id: None,
        }
    }

    /// Attribute the mutation to the principal that issued it
    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

/// A single buffered mutation awaiting replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueOperation {
    /// Unique identifier
    pub id: OperationId,
    /// Mutation kind
    #[serde(rename = "type")]
    pub kind: OperationKind,
    /// Target table
    pub table: String,
    /// Payload; row identity lives in `data.id` for updates and deletes
    pub data: Value,
    /// Principal that issued the mutation
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Enqueue timestamp (Unix ms), the FIFO key
    pub enqueued_at: i64,
    /// Replay attempts so far
    pub retries: u32,
    /// Timestamp of the most recent attempt (Unix ms)
    #[serde(default)]
    pub last_attempt: Option<i64>,
    /// Last failure message
    #[serde(default)]
    pub error: Option<String>,
    /// Lifecycle state
    #[serde(default)]
    pub status: OperationStatus,
    /// Conflict awaiting manual resolution
    #[serde(default)]
    pub conflict: Option<DataConflict>,
}

impl QueueOperation {
    /// Materialize a queue record from enqueue input
    #[must_use]
    pub fn from_new(op: NewOperation) -> Self {
        let owner_id = op
            .owner_id
            .or_else(|| payload_owner(&op.data).map(str::to_string));
        Self {
            id: OperationId::new(),
            kind: op.kind,
            table: op.table,
            data: op.data,
            owner_id,
            enqueued_at: crate::util::unix_millis_now(),
            retries: 0,
            last_attempt: None,
            error: None,
            status: OperationStatus::Pending,
            conflict: None,
        }
    }

    /// Row identity carried in the payload, if any.
    ///
    /// Numeric ids are accepted and rendered as strings.
    pub fn row_id(&self) -> Option<String> {
        match self.data.get("id")? {
            Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    /// Principal the mutation is attributed to: `owner_id`, else `data.user_id`
    pub fn attributed_owner(&self) -> Option<&str> {
        self.owner_id
            .as_deref()
            .or_else(|| payload_owner(&self.data))
    }

    /// Whether `data.user_id` names someone other than the recorded owner
    pub fn has_conflicting_owner(&self) -> bool {
        match (self.owner_id.as_deref(), payload_owner(&self.data)) {
            (Some(owner), Some(payload)) => owner != payload,
            _ => false,
        }
    }

    /// Whether replaying on behalf of `owner_id` keeps the issuer's attribution
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.attributed_owner()
            .is_none_or(|owner| owner == owner_id)
    }
}

/// Owner column carried in a row payload
fn payload_owner(data: &Value) -> Option<&str> {
    data.get(crate::backend::OWNER_COLUMN)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_id_roundtrip() {
        let id = OperationId::new();
        let parsed: OperationId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_operation_ids_are_time_sortable() {
        let first = OperationId::new();
        let second = OperationId::new();
        assert!(first < second);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("create".parse::<OperationKind>(), Ok(OperationKind::Create));
        assert_eq!(" UPDATE ".parse::<OperationKind>(), Ok(OperationKind::Update));
        assert!("upsert".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_status_parsing() {
        for status in OperationStatus::ALL {
            assert_eq!(status.as_str().parse::<OperationStatus>(), Ok(status));
        }
        assert!("syncing".parse::<OperationStatus>().is_err());
    }

    #[test]
    fn test_from_new_starts_pending() {
        let op = QueueOperation::from_new(
            NewOperation::update("firearms", json!({"id": "row-1", "model": "M1A"}))
                .with_owner("user-1"),
        );
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retries, 0);
        assert!(op.last_attempt.is_none());
        assert_eq!(op.row_id().as_deref(), Some("row-1"));
    }

    #[test]
    fn test_row_id_handles_numbers_and_missing() {
        let numeric = QueueOperation::from_new(NewOperation::update("ammo", json!({"id": 42})));
        assert_eq!(numeric.row_id().as_deref(), Some("42"));

        let missing = QueueOperation::from_new(NewOperation::update("ammo", json!({"qty": 1})));
        assert_eq!(missing.row_id(), None);

        let blank = QueueOperation::from_new(NewOperation::update("ammo", json!({"id": " "})));
        assert_eq!(blank.row_id(), None);
    }

    #[test]
    fn test_ownership() {
        let unowned = QueueOperation::from_new(NewOperation::delete("optics", "o-1"));
        assert!(unowned.is_owned_by("anyone"));

        let owned = QueueOperation::from_new(NewOperation::delete("optics", "o-1").with_owner("a"));
        assert!(owned.is_owned_by("a"));
        assert!(!owned.is_owned_by("b"));
    }

    #[test]
    fn test_owner_taken_from_payload_at_enqueue() {
        let op = QueueOperation::from_new(NewOperation::create(
            "firearms",
            json!({"id": "f1", "user_id": "user-1"}),
        ));
        assert_eq!(op.owner_id.as_deref(), Some("user-1"));
        assert!(op.is_owned_by("user-1"));
        assert!(!op.is_owned_by("user-2"));

        let mut legacy = op.clone();
        legacy.owner_id = None;
        assert_eq!(legacy.attributed_owner(), Some("user-1"));
        assert!(!legacy.is_owned_by("user-2"));
    }

    #[test]
    fn test_conflicting_payload_owner() {
        let op = QueueOperation::from_new(
            NewOperation::create("firearms", json!({"user_id": "user-2"})).with_owner("user-1"),
        );
        assert_eq!(op.owner_id.as_deref(), Some("user-1"));
        assert!(op.has_conflicting_owner());

        let agreeing = QueueOperation::from_new(
            NewOperation::create("firearms", json!({"user_id": "user-1"})).with_owner("user-1"),
        );
        assert!(!agreeing.has_conflicting_owner());
    }

    #[test]
    fn test_serializes_kind_as_type() {
        let op = QueueOperation::from_new(NewOperation::create("firearms", json!({"make": "Colt"})));
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["type"], "create");
        assert_eq!(value["status"], "pending");
    }
}
