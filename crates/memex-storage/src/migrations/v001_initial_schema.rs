//! v001: Core tables — memories, sessions, schema indexes (spec §4.1).

use rusqlite::Connection;

use memex_core::MemexResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> MemexResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            name             TEXT,
            metadata_json    TEXT NOT NULL DEFAULT '{}',
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            last_activity_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

        CREATE TABLE IF NOT EXISTS memories (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            session_id       TEXT NOT NULL,
            content          TEXT NOT NULL,
            importance       REAL NOT NULL,
            ttl_hours        INTEGER,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            expires_at       TEXT,
            metadata_json    TEXT NOT NULL DEFAULT '{}',
            tags_json        TEXT NOT NULL DEFAULT '[]',
            access_count     INTEGER NOT NULL DEFAULT 0,
            last_accessed_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_memories_user_created_importance
            ON memories(user_id, created_at DESC, importance DESC);
        CREATE INDEX IF NOT EXISTS idx_memories_user_session ON memories(user_id, session_id);
        CREATE INDEX IF NOT EXISTS idx_memories_expires_at ON memories(expires_at);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
