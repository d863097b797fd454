//! Sync engine configuration.
//!
//! Provides `SyncConfig`, the tunables of a drain pass: retry budget and
//! backoff curve, the conflict strategy applied to queued updates, and the
//! clock-skew tolerance of conflict detection. Every field has a default so a
//! partial JSON document is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::ConflictStrategy;

/// Maximum number of replay attempts before an operation is marked failed
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Backoff applied after the first failure
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;
/// Upper bound of the backoff curve
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 60_000;
/// Timestamps closer than this are not considered conflicting
pub const DEFAULT_CONFLICT_THRESHOLD_MS: i64 = 1_000;

/// Retry budget and exponential backoff curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay required after an attempt that left the operation at `retries`.
    ///
    /// `min(initial * 2^retries, max)`, saturating.
    pub fn backoff_ms(&self, retries: u32) -> u64 {
        let factor = 2_u64.checked_pow(retries).unwrap_or(u64::MAX);
        self.initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }

    /// Whether an operation may be attempted at `now` (Unix ms).
    ///
    /// Never-attempted operations are always eligible; exhausted ones never are.
    pub fn is_eligible(&self, retries: u32, last_attempt: Option<i64>, now: i64) -> bool {
        if retries >= self.max_retries {
            return false;
        }
        let Some(last_attempt) = last_attempt else {
            return true;
        };
        let backoff = i64::try_from(self.backoff_ms(retries)).unwrap_or(i64::MAX);
        now.saturating_sub(last_attempt) >= backoff
    }

    /// Whether an operation that has now failed `retries` times is out of budget
    pub const fn is_exhausted(&self, retries: u32) -> bool {
        retries >= self.max_retries
    }

    fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(Error::InvalidInput(
                "retry.max_retries must be at least 1".to_string(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(Error::InvalidInput(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for a `SyncEngine`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Retry budget and backoff
    pub retry: RetryPolicy,
    /// Strategy applied when a queued update conflicts with server state
    pub conflict_strategy: ConflictStrategy,
    /// Minimum timestamp distance treated as a conflict
    pub conflict_threshold_ms: i64,
    /// Fetch server state before replaying updates
    pub detect_conflicts: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            conflict_strategy: ConflictStrategy::default(),
            conflict_threshold_ms: DEFAULT_CONFLICT_THRESHOLD_MS,
            detect_conflicts: true,
        }
    }
}

impl SyncConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would break the retry contract
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        if self.conflict_threshold_ms < 0 {
            return Err(Error::InvalidInput(
                "conflict_threshold_ms must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the conflict strategy
    #[must_use]
    pub const fn with_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replay updates without checking server state first
    #[must_use]
    pub const fn without_conflict_detection(mut self) -> Self {
        self.detect_conflicts = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_backoff_is_monotonic_and_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_ms(0), 1_000);
        assert_eq!(policy.backoff_ms(1), 2_000);
        assert_eq!(policy.backoff_ms(4), 16_000);
        assert_eq!(policy.backoff_ms(6), 60_000);
        assert_eq!(policy.backoff_ms(200), 60_000);

        let mut previous = 0;
        for retries in 0..70 {
            let delay = policy.backoff_ms(retries);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_never_attempted_is_eligible() {
        let policy = RetryPolicy::default();
        assert!(policy.is_eligible(0, None, 0));
    }

    #[test]
    fn test_eligibility_waits_for_backoff() {
        let policy = RetryPolicy::default();
        let last = 10_000;
        assert!(!policy.is_eligible(1, Some(last), last + 1_999));
        assert!(policy.is_eligible(1, Some(last), last + 2_000));
    }

    #[test]
    fn test_exhausted_is_never_eligible() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_eligible(5, None, i64::MAX));
        assert!(!policy.is_eligible(5, Some(0), i64::MAX));
        assert!(policy.is_exhausted(5));
        assert!(!policy.is_exhausted(4));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SyncConfig::from_json(r#"{"conflict_strategy": "server-wins"}"#).unwrap();
        assert_eq!(config.conflict_strategy, ConflictStrategy::ServerWins);
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.detect_conflicts);
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(SyncConfig::from_json(r#"{"retry": {"max_retries": 0}}"#).is_err());
        assert!(SyncConfig::from_json(
            r#"{"retry": {"initial_backoff_ms": 10, "max_backoff_ms": 5}}"#
        )
        .is_err());
        assert!(SyncConfig::from_json(r#"{"conflict_threshold_ms": -1}"#).is_err());
        assert!(SyncConfig::from_json(r#"{"unknown": true}"#).is_err());
    }

    #[test]
    fn test_builders() {
        let config = SyncConfig::default()
            .with_strategy(ConflictStrategy::Manual)
            .without_conflict_detection();
        assert_eq!(config.conflict_strategy, ConflictStrategy::Manual);
        assert!(!config.detect_conflicts);
    }
}
