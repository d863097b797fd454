//! Remote data-access surface used to replay queued operations.

mod supabase;

use serde_json::Value;
use thiserror::Error;

pub use supabase::SupabaseBackend;

/// Column that carries row ownership on every synced table
pub const OWNER_COLUMN: &str = "user_id";

#[derive(Debug, Error)]
pub enum BackendError {
    /// Missing or malformed endpoint or key
    #[error("Invalid backend configuration: {0}")]
    InvalidConfiguration(String),
    /// Transport failure before a response arrived
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The backend answered with an error status
    #[error("Backend API error: {0}")]
    Api(String),
    /// The backend could not be reached or refused the write for now
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Table-scoped create/update/delete primitives of the hosted backend.
///
/// Every call that targets an existing row is filtered by row identity and
/// owner identity together.
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// Insert a new row into `table`
    async fn insert(&self, table: &str, row: &Value) -> BackendResult<()>;

    /// Update the row `id` owned by `owner_id` with `fields`
    async fn update(&self, table: &str, id: &str, fields: &Value, owner_id: &str)
        -> BackendResult<()>;

    /// Delete the row `id` owned by `owner_id`
    async fn delete(&self, table: &str, id: &str, owner_id: &str) -> BackendResult<()>;

    /// Current server version of the row, if it exists
    async fn fetch(&self, table: &str, id: &str, owner_id: &str) -> BackendResult<Option<Value>>;
}
