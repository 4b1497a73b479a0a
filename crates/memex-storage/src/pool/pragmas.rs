//! PRAGMA configuration applied to every SQLite connection.
//!
//! WAL mode, NORMAL sync, 256MiB mmap, 256MiB cache, 30s busy_timeout (spec
//! §4.1), foreign_keys ON, incremental auto_vacuum.

use rusqlite::Connection;

use memex_core::MemexResult;

use crate::to_storage_err;

/// Apply the writer's full pragma set.
pub fn apply_pragmas(conn: &Connection) -> MemexResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA mmap_size = 268435456;
        PRAGMA cache_size = -262144;
        PRAGMA busy_timeout = 30000;
        PRAGMA foreign_keys = ON;
        PRAGMA auto_vacuum = INCREMENTAL;
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Pragma subset safe for a read-only connection: no WAL checkpoint
/// ownership, no auto_vacuum (schema-altering), just the read-path knobs.
pub fn apply_read_pragmas(conn: &Connection) -> MemexResult<()> {
    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA mmap_size = 268435456;
        PRAGMA cache_size = -262144;
        PRAGMA busy_timeout = 30000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Verify that WAL mode is active on a connection.
pub fn verify_wal_mode(conn: &Connection) -> MemexResult<bool> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(mode.eq_ignore_ascii_case("wal"))
}
