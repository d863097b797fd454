//! Error types for caliber-core

use thiserror::Error;

use crate::backend::BackendError;

/// Result type alias using caliber-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in caliber-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Queue operation not found
    #[error("Operation not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote data-access error
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}
