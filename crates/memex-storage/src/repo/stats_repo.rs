//! Aggregate statistics via single-query `COUNT`/`SUM`/`AVG` (spec §4.2).

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use memex_core::traits::{GlobalStats, UserStats};
use memex_core::{MemexError, MemexResult};

use crate::to_storage_err;

pub fn global_stats(conn: &Connection) -> MemexResult<GlobalStats> {
    let (total_memories, average_importance): (i64, f64) = conn
        .query_row(
            "SELECT COUNT(*), COALESCE(AVG(importance), 0.0) FROM memories",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let total_sessions: i64 = conn
        .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let total_users: i64 = conn
        .query_row(
            "SELECT COUNT(DISTINCT user_id) FROM sessions",
            [],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    Ok(GlobalStats {
        total_memories: total_memories as u64,
        total_sessions: total_sessions as u64,
        total_users: total_users as u64,
        average_importance,
    })
}

pub fn user_stats(conn: &Connection, user_id: &str) -> MemexResult<UserStats> {
    let (total_memories, average_importance, oldest, newest): (i64, f64, Option<String>, Option<String>) = conn
        .query_row(
            "SELECT COUNT(*), COALESCE(AVG(importance), 0.0), MIN(created_at), MAX(created_at) \
             FROM memories WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let total_sessions: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sessions WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .unwrap_or(0);

    Ok(UserStats {
        total_memories: total_memories as u64,
        total_sessions: total_sessions as u64,
        average_importance,
        oldest_memory_at: oldest.map(|s| parse_rfc3339(&s)).transpose()?,
        newest_memory_at: newest.map(|s| parse_rfc3339(&s)).transpose()?,
    })
}

fn parse_rfc3339(s: &str) -> MemexResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MemexError::Corrupt(format!("invalid timestamp {s:?}: {e}")))
}
