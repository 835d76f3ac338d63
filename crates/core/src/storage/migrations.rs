//! Versioned schema migrations.
//!
//! Applied versions are recorded in `_migrations`; each pending migration runs
//! in its own transaction together with its version row, so a failed script
//! leaves the schema at the previous version.

use super::Error;
use tokio_rusqlite::{Connection, params};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered by version; scripts use `IF NOT EXISTS` throughout.
const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "buckets", sql: include_str!("../../migrations/001_buckets.sql") },
    Migration { version: 2, name: "entries", sql: include_str!("../../migrations/002_entries.sql") },
];

/// Bring the schema up to the latest version.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )?;

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql)
                .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", migration.version, migration.name)))?;
            tx.execute(
                "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::info!(version = migration.version, name = migration.name, "applied migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
