//! Versioned schema migrations, one module per version (spec §4.1a). Each
//! exposes `migrate(conn) -> MemexResult<()>`, applied in ascending order
//! inside the startup transaction and recorded in `schema_version`.

mod v001_initial_schema;
mod v002_fts5_index;

use rusqlite::Connection;

use memex_core::MemexResult;

use crate::to_storage_err;

type MigrationFn = fn(&Connection) -> MemexResult<()>;

const MIGRATIONS: &[(i64, MigrationFn)] = &[
    (1, v001_initial_schema::migrate),
    (2, v002_fts5_index::migrate),
];

/// Apply every migration newer than the database's current `schema_version`,
/// inside a single transaction. Idempotent: re-running against an
/// up-to-date database is a no-op.
pub fn run_migrations(conn: &Connection) -> MemexResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    let current: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    for (version, migrate) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        migrate(conn)?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    }
    Ok(())
}
