use std::path::Path;
use std::sync::Arc;

use caliber_core::sync::ConflictChoice;
use caliber_core::{SyncConfig, SyncEngine};

use crate::commands::common::{
    normalize_operation_identifier, normalize_owner, open_queue, resolve_operation,
};
use crate::commands::sync::backend_from_env;
use crate::error::CliError;

pub async fn run_resolve(
    id: &str,
    choice: ConflictChoice,
    owner: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let query = normalize_operation_identifier(id)?;
    let owner = normalize_owner(owner)?;
    let backend = backend_from_env()?;
    let store = open_queue(db_path).await?;
    let op = resolve_operation(&query, &store).await?;

    let engine = SyncEngine::new(Arc::new(store), Arc::new(backend), SyncConfig::default());
    engine.resolve_conflict(&op.id, &owner, choice).await?;
    println!("{}", op.id);
    Ok(())
}
