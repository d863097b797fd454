use std::env;
use std::path::Path;
use std::sync::Arc;

use caliber_core::backend::SupabaseBackend;
use caliber_core::util::non_blank;
use caliber_core::{SyncConfig, SyncEngine};

use crate::commands::common::{
    format_sync_result, format_sync_status, normalize_owner, open_queue,
};
use crate::error::CliError;

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";
pub const SUPABASE_ACCESS_TOKEN_ENV: &str = "SUPABASE_ACCESS_TOKEN";

pub async fn run_sync(
    owner: &str,
    config_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let owner = normalize_owner(owner)?;
    let config = load_sync_config(config_path)?;
    let backend = backend_from_env()?;
    let store = open_queue(db_path).await?;

    let engine = SyncEngine::new(Arc::new(store), Arc::new(backend), config);
    let subscription = engine.subscribe(|status| println!("{}", format_sync_status(status)));
    let result = engine.process_queue(&owner).await;
    subscription.unsubscribe();

    println!("{}", format_sync_result(&result?));
    Ok(())
}

/// Read a JSON sync configuration, or the defaults when no path is given
pub fn load_sync_config(path: Option<&Path>) -> Result<SyncConfig, CliError> {
    let Some(path) = path else {
        return Ok(SyncConfig::default());
    };
    let payload = std::fs::read_to_string(path)?;
    SyncConfig::from_json(&payload)
        .map_err(|error| CliError::Config(format!("{}: {error}", path.display())))
}

pub fn backend_from_env() -> Result<SupabaseBackend, CliError> {
    let url = env_value(SUPABASE_URL_ENV).ok_or(CliError::SyncNotConfigured)?;
    let anon_key = env_value(SUPABASE_ANON_KEY_ENV).ok_or(CliError::SyncNotConfigured)?;
    let access_token = env_value(SUPABASE_ACCESS_TOKEN_ENV).ok_or(CliError::SyncNotConfigured)?;
    Ok(SupabaseBackend::new(url, anon_key, access_token)?)
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}
