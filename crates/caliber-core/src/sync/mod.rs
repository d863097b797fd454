//! Replays queued mutations against the backend.
//!
//! `SyncEngine` drains the queue oldest-first, applies the configured conflict
//! strategy to updates, keeps retry bookkeeping for transient failures and
//! publishes progress to subscribers. At most one drain runs per queue store.

mod engine;
mod listeners;

pub use engine::{ConflictChoice, SyncEngine};
pub use listeners::Subscription;
