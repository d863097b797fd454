//! Local libSQL database holding the queue

use std::path::Path;

use libsql::{Builder, Connection, Database as LibSqlDatabase};

use super::migrations;
use crate::error::Result;

/// Best-effort pragmas; `journal_mode` is rejected by in-memory databases
const PRAGMAS: &[&str] = &[
    "PRAGMA journal_mode = WAL",
    "PRAGMA synchronous = NORMAL",
    "PRAGMA busy_timeout = 5000",
];

/// Open, migrated queue database
pub struct Database {
    // keeps the handle alive for the connection's lifetime
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open the database file at `path`, creating missing parent directories
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let database = Self::connect(&path.to_string_lossy()).await?;
        tracing::debug!("Opened queue database at {}", path.display());
        Ok(database)
    }

    /// Open a private in-memory database
    pub async fn open_in_memory() -> Result<Self> {
        Self::connect(":memory:").await
    }

    async fn connect(target: &str) -> Result<Self> {
        let db = Builder::new_local(target).build().await?;
        let conn = db.connect()?;

        for pragma in PRAGMAS {
            if let Err(error) = conn.execute(pragma, ()).await {
                tracing::debug!("Skipping {}: {}", pragma, error);
            }
        }
        migrations::run(&conn).await?;

        Ok(Self { _db: db, conn })
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
