//! Caliber CLI - inspect and replay the offline operation queue
//!
//! Operators use it to check what is waiting to sync, retry or discard stuck
//! operations, and drain the queue against Supabase from the terminal.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::discard::run_discard;
use crate::commands::enqueue::run_enqueue;
use crate::commands::list::run_list;
use crate::commands::purge::run_purge;
use crate::commands::resolve::run_resolve;
use crate::commands::retry::run_retry;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "caliber=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path)?;

    match cli.command {
        Commands::Status { json } => run_status(json, &db_path).await?,
        Commands::List { status, json } => {
            run_list(status.map(Into::into), json, &db_path).await?;
        }
        Commands::Enqueue {
            kind,
            table,
            data,
            owner,
        } => {
            run_enqueue(kind.into(), &table, &data, owner.as_deref(), &db_path).await?;
        }
        Commands::Retry { id, all_failed } => {
            run_retry(id.as_deref(), all_failed, &db_path).await?;
        }
        Commands::Discard { id } => run_discard(&id, &db_path).await?,
        Commands::Purge => run_purge(&db_path).await?,
        Commands::Sync { owner, config } => {
            run_sync(&owner, config.as_deref(), &db_path).await?;
        }
        Commands::Resolve { id, choice, owner } => {
            run_resolve(&id, choice.into(), &owner, &db_path).await?;
        }
    }

    Ok(())
}
