//! Versioned schema for the queue database.
//!
//! Each migration runs in its own transaction together with the row that
//! records its version, so a crash never leaves a half-applied step behind.

use libsql::{params, Connection};

use crate::error::Result;

struct Migration {
    version: i64,
    name: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "operation queue",
        statements: &[
            "CREATE TABLE sync_queue (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                table_name TEXT NOT NULL,
                data TEXT NOT NULL,
                owner_id TEXT,
                enqueued_at INTEGER NOT NULL,
                retries INTEGER NOT NULL DEFAULT 0,
                last_attempt INTEGER,
                error TEXT,
                status TEXT NOT NULL DEFAULT 'pending'
            )",
            "CREATE INDEX idx_sync_queue_status ON sync_queue(status)",
            "CREATE INDEX idx_sync_queue_enqueued ON sync_queue(enqueued_at ASC)",
        ],
    },
    Migration {
        version: 2,
        name: "conflict snapshots",
        statements: &["ALTER TABLE sync_queue ADD COLUMN conflict TEXT"],
    },
];

/// Newest schema version this build knows about
pub const CURRENT_VERSION: i64 = 2;

/// Bring the schema up to `CURRENT_VERSION`
pub async fn run(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        (),
    )
    .await?;

    let applied = schema_version(conn).await?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(conn, migration).await?;
        tracing::info!(
            "Applied queue migration {} ({})",
            migration.version,
            migration.name
        );
    }
    Ok(())
}

/// Highest applied migration, `0` for a fresh file
pub async fn schema_version(conn: &Connection) -> Result<i64> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}

async fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute("BEGIN IMMEDIATE", ()).await?;

    let outcome = async {
        for statement in migration.statements {
            conn.execute(statement, ()).await?;
        }
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            params![migration.version],
        )
        .await?;
        conn.execute("COMMIT", ()).await?;
        Ok::<(), libsql::Error>(())
    }
    .await;

    if let Err(error) = outcome {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error.into());
    }
    Ok(())
}
