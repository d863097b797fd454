use std::io;

use caliber_core::backend::BackendError;
use caliber_core::OperationStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] caliber_core::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Operation ID cannot be empty")]
    EmptyOperationId,
    #[error("Table name cannot be empty")]
    EmptyTable,
    #[error("Owner ID cannot be empty")]
    EmptyOwner,
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Operation not found for id/prefix: {0}")]
    OperationNotFound(String),
    #[error("{0}")]
    AmbiguousOperationId(String),
    #[error("Operation {0} is {1}; only failed or conflicted operations can be retried")]
    NotRetryable(String, OperationStatus),
    #[error("Pass an operation ID or --all-failed")]
    MissingRetryTarget,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Set SUPABASE_URL, SUPABASE_ANON_KEY and SUPABASE_ACCESS_TOKEN."
    )]
    SyncNotConfigured,
}
