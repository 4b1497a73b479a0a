//! CRUD, bulk insert, filtered query, and access bookkeeping for memories.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use memex_core::filter::{NormalizedFilter, PageResponse};
use memex_core::memory::{Memory, MemoryPatch};
use memex_core::{MemexError, MemexResult};

use crate::filter_compiler;
use crate::to_storage_err;

/// Insert a single memory. Caller is responsible for quota enforcement and
/// transaction boundaries (spec §4.3: quota check + insert share a
/// transaction).
pub fn insert(conn: &Connection, memory: &Memory) -> MemexResult<()> {
    conn.execute(
        "INSERT INTO memories (
            id, user_id, session_id, content, importance, ttl_hours,
            created_at, updated_at, expires_at, metadata_json, tags_json,
            access_count, last_accessed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            memory.id,
            memory.user_id,
            memory.session_id,
            memory.content,
            memory.importance,
            memory.ttl_hours,
            memory.created_at.to_rfc3339(),
            memory.updated_at.to_rfc3339(),
            memory.expires_at.map(|t| t.to_rfc3339()),
            serde_json::to_string(&memory.metadata).map_err(|e| to_storage_err(e.to_string()))?,
            serde_json::to_string(&memory.tags).map_err(|e| to_storage_err(e.to_string()))?,
            memory.access_count,
            memory.last_accessed_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Insert every memory in `memories`, stopping at the first failure. Caller
/// decides whether the surrounding transaction rolls back (`fail_on_error`
/// semantics live in `memex-engine`, not here).
pub fn insert_many(conn: &Connection, memories: &[Memory]) -> MemexResult<usize> {
    let mut inserted = 0;
    for memory in memories {
        insert(conn, memory)?;
        inserted += 1;
    }
    Ok(inserted)
}

pub fn get(conn: &Connection, user_id: &str, id: &str) -> MemexResult<Option<Memory>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, session_id, content, importance, ttl_hours, created_at, \
             updated_at, expires_at, metadata_json, tags_json, access_count, last_accessed_at \
             FROM memories WHERE user_id = ?1 AND id = ?2",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    stmt.query_row(params![user_id, id], row_to_memory)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .transpose()
}

/// Apply `patch` to the stored memory and persist the result. Returns the
/// updated row; `NotFound` if no memory with that id belongs to `user_id`.
pub fn update(
    conn: &Connection,
    user_id: &str,
    id: &str,
    patch: MemoryPatch,
) -> MemexResult<Memory> {
    let mut memory = get(conn, user_id, id)?
        .ok_or_else(|| MemexError::NotFound(format!("memory {id} not found for user {user_id}")))?;
    memory.apply_patch(patch)?;

    conn.execute(
        "UPDATE memories SET content = ?1, importance = ?2, ttl_hours = ?3, updated_at = ?4, \
         expires_at = ?5, metadata_json = ?6, tags_json = ?7 WHERE user_id = ?8 AND id = ?9",
        params![
            memory.content,
            memory.importance,
            memory.ttl_hours,
            memory.updated_at.to_rfc3339(),
            memory.expires_at.map(|t| t.to_rfc3339()),
            serde_json::to_string(&memory.metadata).map_err(|e| to_storage_err(e.to_string()))?,
            serde_json::to_string(&memory.tags).map_err(|e| to_storage_err(e.to_string()))?,
            user_id,
            id,
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(memory)
}

pub fn delete(conn: &Connection, user_id: &str, id: &str) -> MemexResult<bool> {
    let rows = conn
        .execute(
            "DELETE FROM memories WHERE user_id = ?1 AND id = ?2",
            params![user_id, id],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(rows > 0)
}

/// Hard-delete every memory whose `expires_at` has passed. Used by decay
/// pass 1 (spec §4.4) and directly exposed as `purge_expired`.
pub fn delete_expired(conn: &Connection, now: DateTime<Utc>) -> MemexResult<u64> {
    let rows = conn
        .execute(
            "DELETE FROM memories WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now.to_rfc3339()],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(rows as u64)
}

pub fn count_for_user(conn: &Connection, user_id: &str) -> MemexResult<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM memories WHERE user_id = ?1",
        params![user_id],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as u64)
    .map_err(|e| to_storage_err(e.to_string()))
}

pub fn mark_accessed(
    conn: &Connection,
    user_id: &str,
    id: &str,
    now: DateTime<Utc>,
) -> MemexResult<()> {
    conn.execute(
        "UPDATE memories SET access_count = access_count + 1, last_accessed_at = ?1 \
         WHERE user_id = ?2 AND id = ?3",
        params![now.to_rfc3339(), user_id, id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn all_for_user(conn: &Connection, user_id: &str) -> MemexResult<Vec<Memory>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, session_id, content, importance, ttl_hours, created_at, \
             updated_at, expires_at, metadata_json, tags_json, access_count, last_accessed_at \
             FROM memories WHERE user_id = ?1 ORDER BY created_at ASC",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![user_id], row_to_memory)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(out)
}

/// Run a compiled `NormalizedFilter` query. `with_total_count` issues the
/// separate `COUNT(*)` (spec §4.2, step 5) — callers that only need the
/// `has_next` flag can skip it.
pub fn list_by_filter(
    conn: &Connection,
    filter: &NormalizedFilter,
    with_total_count: bool,
) -> MemexResult<PageResponse<Memory>> {
    let compiled = filter_compiler::compile(filter);

    let mut stmt = conn
        .prepare(&compiled.select_sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(compiled.params.iter()), row_to_memory)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut data = Vec::new();
    for row in rows {
        data.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }

    let has_next = data.len() as u32 > filter.limit;
    if has_next {
        data.truncate(filter.limit as usize);
    }

    let total_count = if with_total_count {
        let count_params = &compiled.params[..compiled.params.len() - 2];
        conn.query_row(
            &compiled.count_sql,
            rusqlite::params_from_iter(count_params.iter()),
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as u64)
        .map_err(|e| to_storage_err(e.to_string()))?
    } else {
        data.len() as u64
    };

    Ok(PageResponse::new(data, total_count, filter.offset, filter.limit, has_next))
}

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<MemexResult<Memory>> {
    let metadata_json: String = row.get(9)?;
    let tags_json: String = row.get(10)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    let expires_at: Option<String> = row.get(8)?;
    let last_accessed_at: String = row.get(12)?;

    Ok((|| -> MemexResult<Memory> {
        Ok(Memory {
            id: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
            user_id: row.get(1).map_err(|e| to_storage_err(e.to_string()))?,
            session_id: row.get(2).map_err(|e| to_storage_err(e.to_string()))?,
            content: row.get(3).map_err(|e| to_storage_err(e.to_string()))?,
            importance: row.get(4).map_err(|e| to_storage_err(e.to_string()))?,
            ttl_hours: row.get(5).map_err(|e| to_storage_err(e.to_string()))?,
            created_at: parse_rfc3339(&created_at)?,
            updated_at: parse_rfc3339(&updated_at)?,
            expires_at: expires_at.map(|s| parse_rfc3339(&s)).transpose()?,
            metadata: serde_json::from_str(&metadata_json)
                .map_err(|e| to_storage_err(e.to_string()))?,
            tags: serde_json::from_str(&tags_json).map_err(|e| to_storage_err(e.to_string()))?,
            access_count: row.get(11).map_err(|e| to_storage_err(e.to_string()))?,
            last_accessed_at: parse_rfc3339(&last_accessed_at)?,
        })
    })())
}

fn parse_rfc3339(s: &str) -> MemexResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MemexError::Corrupt(format!("invalid timestamp {s:?}: {e}")))
}
