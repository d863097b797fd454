//! Conflict models

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Policy used to pick a winner between a queued change and server state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConflictStrategy {
    /// Server data always wins
    ServerWins,
    /// Queued client data always wins
    ClientWins,
    /// Most recently modified version wins
    #[default]
    NewestWins,
    /// Leave the decision to the user
    Manual,
}

impl ConflictStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerWins => "server-wins",
            Self::ClientWins => "client-wins",
            Self::NewestWins => "newest-wins",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConflictStrategy {
    /// Look up a strategy by name; unrecognized names fall back to `newest-wins`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "server-wins" | "server_wins" => Self::ServerWins,
            "client-wins" | "client_wins" => Self::ClientWins,
            "manual" => Self::Manual,
            _ => Self::NewestWins,
        }
    }
}

impl FromStr for ConflictStrategy {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl From<String> for ConflictStrategy {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<ConflictStrategy> for String {
    fn from(value: ConflictStrategy) -> Self {
        value.as_str().to_string()
    }
}

/// Two diverged versions of the same row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConflict {
    /// Contested row identity
    pub id: String,
    /// Table holding the row
    pub table: String,
    /// Version captured in the queue
    pub local_data: Value,
    /// Version currently on the server
    pub server_data: Value,
    /// Last-modified time of the local version (Unix ms)
    pub local_timestamp: i64,
    /// Last-modified time of the server version (Unix ms)
    pub server_timestamp: i64,
}

impl DataConflict {
    /// Build a conflict, reading each side's `updated_at`/`created_at`.
    ///
    /// A side without a readable timestamp counts as `0`, i.e. oldest.
    pub fn from_versions(
        id: impl Into<String>,
        table: impl Into<String>,
        local_data: Value,
        server_data: Value,
    ) -> Self {
        let local_timestamp = record_timestamp(&local_data).unwrap_or_default();
        let server_timestamp = record_timestamp(&server_data).unwrap_or_default();
        Self {
            id: id.into(),
            table: table.into(),
            local_data,
            server_data,
            local_timestamp,
            server_timestamp,
        }
    }
}

/// What to do with a contested row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionAction {
    UseServer,
    UseClient,
    Merge,
    Skip,
}

/// Verdict returned by the resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub action: ResolutionAction,
    /// Payload to apply; absent for `skip`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable justification for audit logs
    pub reason: String,
}

/// Last-modified time of a row: `updated_at`, falling back to `created_at`.
///
/// Accepts Unix milliseconds or RFC 3339 / `YYYY-MM-DD HH:MM:SS` strings
/// (naive values are read as UTC).
#[allow(clippy::cast_possible_truncation)]
pub fn record_timestamp(record: &Value) -> Option<i64> {
    let field = record
        .get("updated_at")
        .filter(|value| !value.is_null())
        .or_else(|| record.get("created_at"))?;

    match field {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value as i64)),
        Value::String(text) => parse_timestamp_text(text),
        _ => None,
    }
}

fn parse_timestamp_text(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strategy_parsing_falls_back_to_newest_wins() {
        assert_eq!(
            "server-wins".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::ServerWins
        );
        assert_eq!(
            "manual".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::Manual
        );
        assert_eq!(
            "coin-flip".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::NewestWins
        );
    }

    #[test]
    fn test_strategy_serde_uses_kebab_names() {
        let json = serde_json::to_string(&ConflictStrategy::ClientWins).unwrap();
        assert_eq!(json, "\"client-wins\"");

        let parsed: ConflictStrategy = serde_json::from_str("\"whatever\"").unwrap();
        assert_eq!(parsed, ConflictStrategy::NewestWins);
    }

    #[test]
    fn test_record_timestamp_prefers_updated_at() {
        let record = json!({"created_at": 1_000, "updated_at": 5_000});
        assert_eq!(record_timestamp(&record), Some(5_000));

        let record = json!({"created_at": 1_000, "updated_at": null});
        assert_eq!(record_timestamp(&record), Some(1_000));
    }

    #[test]
    fn test_record_timestamp_parses_strings() {
        let record = json!({"updated_at": "2024-03-01T12:00:00.500Z"});
        assert_eq!(record_timestamp(&record), Some(1_709_294_400_500));

        let record = json!({"updated_at": "2024-03-01T12:00:00+00:00"});
        assert_eq!(record_timestamp(&record), Some(1_709_294_400_000));

        let record = json!({"created_at": "2024-03-01 12:00:00"});
        assert_eq!(record_timestamp(&record), Some(1_709_294_400_000));

        let record = json!({"updated_at": "yesterday"});
        assert_eq!(record_timestamp(&record), None);
    }

    #[test]
    fn test_from_versions_reads_timestamps() {
        let conflict = DataConflict::from_versions(
            "row-1",
            "firearms",
            json!({"id": "row-1", "updated_at": 2_000}),
            json!({"id": "row-1"}),
        );
        assert_eq!(conflict.local_timestamp, 2_000);
        assert_eq!(conflict.server_timestamp, 0);
    }

    #[test]
    fn test_resolution_action_serde() {
        let json = serde_json::to_string(&ResolutionAction::UseServer).unwrap();
        assert_eq!(json, "\"use-server\"");
    }
}
