//! CRUD and search over sessions, plus the on-demand `SessionSummary` rollup.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use memex_core::constants::{SUMMARY_EXCERPT_CHARS, SUMMARY_TOP_K};
use memex_core::session::{MemoryExcerpt, Session, SessionSummary};
use memex_core::{MemexError, MemexResult};

use crate::to_storage_err;

pub fn insert(conn: &Connection, session: &Session) -> MemexResult<()> {
    conn.execute(
        "INSERT INTO sessions (id, user_id, name, metadata_json, created_at, updated_at, last_activity_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            session.id,
            session.user_id,
            session.name,
            serde_json::to_string(&session.metadata).map_err(|e| to_storage_err(e.to_string()))?,
            session.created_at.to_rfc3339(),
            session.updated_at.to_rfc3339(),
            session.last_activity_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn get(conn: &Connection, user_id: &str, id: &str) -> MemexResult<Option<Session>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, name, metadata_json, created_at, updated_at, last_activity_at \
             FROM sessions WHERE user_id = ?1 AND id = ?2",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    stmt.query_row(params![user_id, id], row_to_session)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .transpose()
}

pub fn touch(conn: &Connection, user_id: &str, id: &str, now: DateTime<Utc>) -> MemexResult<()> {
    conn.execute(
        "UPDATE sessions SET last_activity_at = ?1, updated_at = ?1 WHERE user_id = ?2 AND id = ?3",
        params![now.to_rfc3339(), user_id, id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Delete a session. Memories referencing it cascade via the foreign key
/// (spec §3 invariants: `delete_memories=true` ⇒ atomic cascade); the caller
/// decides whether to delete memories first when cascade is declined.
pub fn delete(conn: &Connection, user_id: &str, id: &str) -> MemexResult<bool> {
    let rows = conn
        .execute(
            "DELETE FROM sessions WHERE user_id = ?1 AND id = ?2",
            params![user_id, id],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(rows > 0)
}

pub fn list_for_user(conn: &Connection, user_id: &str) -> MemexResult<Vec<Session>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, name, metadata_json, created_at, updated_at, last_activity_at \
             FROM sessions WHERE user_id = ?1 ORDER BY last_activity_at DESC",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![user_id], row_to_session)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(out)
}

/// Sessions belonging to `user_id` that have at least one memory whose
/// content/tags match `keywords` via FTS5 (spec §4.2), the same join
/// `memory_repo::list_by_filter` uses for memory-level keyword search.
/// Empty `keywords` matches no sessions — there is no "list all" shorthand
/// through this op.
pub fn search(conn: &Connection, user_id: &str, keywords: &[String]) -> MemexResult<Vec<Session>> {
    if keywords.is_empty() {
        return Ok(Vec::new());
    }
    let tokens = keywords.join(" ");
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT s.id, s.user_id, s.name, s.metadata_json, s.created_at, \
             s.updated_at, s.last_activity_at \
             FROM sessions s \
             JOIN memories m ON m.session_id = s.id AND m.user_id = s.user_id \
             JOIN memories_fts ON memories_fts.rowid = m.rowid \
             WHERE s.user_id = ?1 AND memories_fts MATCH ?2 \
             ORDER BY s.last_activity_at DESC",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![user_id, tokens], row_to_session)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(out)
}

/// Compute `summarize_session` (spec §4.3): count, aggregate/average
/// importance, earliest/latest, top-K excerpts by importance, and a
/// keyword histogram over the session's content tokens. `None` when the
/// session has no memories.
pub fn summarize(conn: &Connection, user_id: &str, id: &str) -> MemexResult<Option<SessionSummary>> {
    let totals: Option<(i64, f64, Option<String>, Option<String>)> = conn
        .query_row(
            "SELECT COUNT(*), COALESCE(SUM(importance), 0.0), MIN(created_at), MAX(created_at) \
             FROM memories WHERE user_id = ?1 AND session_id = ?2",
            params![user_id, id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    let Some((count, aggregate_importance, earliest, latest)) = totals else {
        return Ok(None);
    };
    if count == 0 {
        return Ok(None);
    }

    let mut stmt = conn
        .prepare(
            "SELECT id, importance, content FROM memories WHERE user_id = ?1 AND session_id = ?2 \
             ORDER BY importance DESC, created_at DESC LIMIT ?3",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let excerpt_rows = stmt
        .query_map(params![user_id, id, SUMMARY_TOP_K as i64], |row| {
            let memory_id: String = row.get(0)?;
            let importance: f64 = row.get(1)?;
            let content: String = row.get(2)?;
            Ok((memory_id, importance, content))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut top_excerpts = Vec::new();
    let mut histogram = std::collections::HashMap::<String, u64>::new();
    for row in excerpt_rows {
        let (memory_id, importance, content) =
            row.map_err(|e| to_storage_err(e.to_string()))?;
        for token in content.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.len() > 2 {
                *histogram.entry(token).or_insert(0) += 1;
            }
        }
        let excerpt: String = content.chars().take(SUMMARY_EXCERPT_CHARS).collect();
        top_excerpts.push(MemoryExcerpt {
            memory_id,
            importance,
            excerpt,
        });
    }

    let mut keyword_histogram: Vec<(String, u64)> = histogram.into_iter().collect();
    keyword_histogram.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    keyword_histogram.truncate(SUMMARY_TOP_K);

    Ok(Some(SessionSummary {
        session_id: id.to_string(),
        memory_count: count as u64,
        aggregate_importance,
        average_importance: aggregate_importance / count as f64,
        earliest: earliest.map(|s| parse_rfc3339(&s)).transpose()?,
        latest: latest.map(|s| parse_rfc3339(&s)).transpose()?,
        top_excerpts,
        keyword_histogram,
    }))
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<MemexResult<Session>> {
    let metadata_json: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    let last_activity_at: String = row.get(6)?;
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let name: Option<String> = row.get(2)?;

    Ok((|| -> MemexResult<Session> {
        Ok(Session {
            id,
            user_id,
            name,
            metadata: serde_json::from_str(&metadata_json)
                .map_err(|e| to_storage_err(e.to_string()))?,
            created_at: parse_rfc3339(&created_at)?,
            updated_at: parse_rfc3339(&updated_at)?,
            last_activity_at: parse_rfc3339(&last_activity_at)?,
        })
    })())
}

fn parse_rfc3339(s: &str) -> MemexResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MemexError::Corrupt(format!("invalid timestamp {s:?}: {e}")))
}
