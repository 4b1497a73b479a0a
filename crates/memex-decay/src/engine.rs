//! The four decay passes (spec §4.4), run inside a single writer
//! transaction. Grounded in the storage engine's `with_conn_sync` pattern —
//! decay needs bulk SQL beyond what `MemoryStore` exposes, so it depends on
//! the concrete `memex_storage::StorageEngine` rather than the trait.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use memex_core::MemexResult;
use memex_storage::StorageEngine;

use crate::policy::DecayPolicy;
use crate::stats::{DecayPlan, DecayStats};

/// Content length beyond which pass 4 truncates (spec §4.4).
const COMPRESSION_TARGET_CHARS: usize = 200;
/// Minimum age for compression eligibility.
const COMPRESSION_MIN_AGE_DAYS: i64 = 30;
/// Importance ceiling for compression eligibility.
const COMPRESSION_MAX_IMPORTANCE: f64 = 0.5;
/// Recency window that gives expired-within-24h rows eviction priority (pass 2).
const RECENTLY_EXPIRED_WINDOW_HOURS: i64 = 24;

pub struct DecayEngine<'a> {
    storage: &'a StorageEngine,
}

impl<'a> DecayEngine<'a> {
    pub fn new(storage: &'a StorageEngine) -> Self {
        Self { storage }
    }

    /// Run all four passes inside one writer transaction.
    pub fn run(&self, now: DateTime<Utc>, policy: &DecayPolicy) -> MemexResult<DecayStats> {
        let start = now;
        let stats = self.storage.pool().writer.with_conn_sync(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;

            let memories_expired = expire_ttl(&tx, now)?;
            let memories_evicted = evict_over_quota(&tx, now, policy)?;
            let swept = sweep_low_importance(&tx, now, policy)?;
            let memories_compressed = if policy.enable_compression {
                compress_old_low_importance(&tx, now)?
            } else {
                0
            };

            tx.commit()
                .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;

            Ok(DecayStats {
                memories_expired,
                memories_evicted: memories_evicted + swept,
                memories_compressed,
                elapsed_ms: 0,
            })
        })?;

        let elapsed_ms = (Utc::now() - start).num_milliseconds().max(0) as u64;
        tracing::info!(
            expired = stats.memories_expired,
            evicted = stats.memories_evicted,
            compressed = stats.memories_compressed,
            "decay pass complete"
        );
        Ok(DecayStats {
            elapsed_ms,
            ..stats
        })
    }

    /// Read-only equivalent of `run`: reports what would be removed.
    pub fn analyze(&self, now: DateTime<Utc>, policy: &DecayPolicy) -> MemexResult<DecayPlan> {
        self.storage.pool().writer.with_conn_sync(|conn| {
            let would_expire = count_expired(conn, now)?;
            let would_evict = count_over_quota(conn, policy)? + count_low_importance_sweep(conn, now, policy)?;
            let would_compress = if policy.enable_compression {
                count_compressible(conn, now)?
            } else {
                0
            };
            Ok(DecayPlan {
                would_expire,
                would_evict,
                would_compress,
            })
        })
    }
}

fn expire_ttl(conn: &Connection, now: DateTime<Utc>) -> MemexResult<u64> {
    let rows = conn
        .execute(
            "DELETE FROM memories WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now.to_rfc3339()],
        )
        .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
    Ok(rows as u64)
}

fn count_expired(conn: &Connection, now: DateTime<Utc>) -> MemexResult<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM memories WHERE expires_at IS NOT NULL AND expires_at <= ?1",
        params![now.to_rfc3339()],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as u64)
    .map_err(|e| memex_storage::to_storage_err(e.to_string()))
}

/// Pass 2: for each user over quota, delete the excess rows ordered
/// expired-within-24h first, then ascending importance, then ascending
/// `last_accessed_at`, then ascending `created_at` (spec §4.4).
fn evict_over_quota(conn: &Connection, now: DateTime<Utc>, policy: &DecayPolicy) -> MemexResult<u64> {
    let over_quota_users = users_over_quota(conn, policy)?;
    let recently_expired_cutoff = (now - Duration::hours(RECENTLY_EXPIRED_WINDOW_HOURS)).to_rfc3339();

    let mut evicted = 0u64;
    for (user_id, count) in over_quota_users {
        let excess = count - policy.max_memories_per_user;
        let deleted = conn
            .execute(
                "DELETE FROM memories WHERE id IN (
                    SELECT id FROM memories WHERE user_id = ?1
                    ORDER BY
                        CASE WHEN expires_at IS NOT NULL AND expires_at <= ?2 THEN 0 ELSE 1 END,
                        importance ASC,
                        last_accessed_at ASC,
                        created_at ASC
                    LIMIT ?3
                )",
                params![user_id, recently_expired_cutoff, excess as i64],
            )
            .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
        evicted += deleted as u64;
    }
    Ok(evicted)
}

fn count_over_quota(conn: &Connection, policy: &DecayPolicy) -> MemexResult<u64> {
    let over_quota_users = users_over_quota(conn, policy)?;
    Ok(over_quota_users
        .into_iter()
        .map(|(_, count)| count - policy.max_memories_per_user)
        .sum())
}

fn users_over_quota(conn: &Connection, policy: &DecayPolicy) -> MemexResult<Vec<(String, u64)>> {
    let mut stmt = conn
        .prepare("SELECT user_id, COUNT(*) FROM memories GROUP BY user_id HAVING COUNT(*) > ?1")
        .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![policy.max_memories_per_user as i64], |row| {
            let user_id: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((user_id, count as u64))
        })
        .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| memex_storage::to_storage_err(e.to_string()))?);
    }
    Ok(out)
}

/// Pass 3: memories older than `default_memory_ttl_hours` with importance
/// below the threshold and zero accesses are swept (spec §4.4).
fn sweep_low_importance(conn: &Connection, now: DateTime<Utc>, policy: &DecayPolicy) -> MemexResult<u64> {
    let cutoff = (now - Duration::hours(i64::from(policy.default_memory_ttl_hours))).to_rfc3339();
    let rows = conn
        .execute(
            "DELETE FROM memories WHERE created_at <= ?1 AND importance < ?2 AND access_count = 0",
            params![cutoff, policy.importance_threshold],
        )
        .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
    Ok(rows as u64)
}

fn count_low_importance_sweep(conn: &Connection, now: DateTime<Utc>, policy: &DecayPolicy) -> MemexResult<u64> {
    let cutoff = (now - Duration::hours(i64::from(policy.default_memory_ttl_hours))).to_rfc3339();
    conn.query_row(
        "SELECT COUNT(*) FROM memories WHERE created_at <= ?1 AND importance < ?2 AND access_count = 0",
        params![cutoff, policy.importance_threshold],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as u64)
    .map_err(|e| memex_storage::to_storage_err(e.to_string()))
}

/// Pass 4 (optional): lossy truncation of old, low-importance content. Idempotent
/// via the `_compressed` metadata marker, so a second run with no new writes
/// compresses nothing new.
fn compress_old_low_importance(conn: &Connection, now: DateTime<Utc>) -> MemexResult<u64> {
    let cutoff = (now - Duration::days(COMPRESSION_MIN_AGE_DAYS)).to_rfc3339();
    let mut stmt = conn
        .prepare(
            "SELECT id, content, metadata_json FROM memories \
             WHERE created_at <= ?1 AND importance < ?2",
        )
        .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
    let candidates = stmt
        .query_map(params![cutoff, COMPRESSION_MAX_IMPORTANCE], |row| {
            let id: String = row.get(0)?;
            let content: String = row.get(1)?;
            let metadata_json: String = row.get(2)?;
            Ok((id, content, metadata_json))
        })
        .map_err(|e| memex_storage::to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
    drop(stmt);

    let mut compressed = 0u64;
    for (id, content, metadata_json) in candidates {
        let mut metadata: serde_json::Value =
            serde_json::from_str(&metadata_json).unwrap_or_else(|_| serde_json::json!({}));
        if metadata.get("_compressed").and_then(|v| v.as_bool()) == Some(true) {
            continue;
        }
        if content.chars().count() <= COMPRESSION_TARGET_CHARS {
            continue;
        }
        let original_length = content.chars().count();
        let truncated: String = content.chars().take(COMPRESSION_TARGET_CHARS).collect();
        let new_content = format!("{truncated}…");
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("_original_length".into(), serde_json::json!(original_length));
            obj.insert("_compressed".into(), serde_json::json!(true));
        }
        conn.execute(
            "UPDATE memories SET content = ?1, metadata_json = ?2 WHERE id = ?3",
            params![
                new_content,
                serde_json::to_string(&metadata).map_err(|e| memex_storage::to_storage_err(e.to_string()))?,
                id
            ],
        )
        .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
        compressed += 1;
    }
    Ok(compressed)
}

fn count_compressible(conn: &Connection, now: DateTime<Utc>) -> MemexResult<u64> {
    let cutoff = (now - Duration::days(COMPRESSION_MIN_AGE_DAYS)).to_rfc3339();
    let mut stmt = conn
        .prepare(
            "SELECT content, metadata_json FROM memories \
             WHERE created_at <= ?1 AND importance < ?2",
        )
        .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![cutoff, COMPRESSION_MAX_IMPORTANCE], |row| {
            let content: String = row.get(0)?;
            let metadata_json: String = row.get(1)?;
            Ok((content, metadata_json))
        })
        .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;

    let mut count = 0u64;
    for row in rows {
        let (content, metadata_json) = row.map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
        let metadata: serde_json::Value =
            serde_json::from_str(&metadata_json).unwrap_or_else(|_| serde_json::json!({}));
        let already_compressed = metadata.get("_compressed").and_then(|v| v.as_bool()) == Some(true);
        if !already_compressed && content.chars().count() > COMPRESSION_TARGET_CHARS {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memex_core::memory::Memory;
    use memex_core::traits::MemoryStore;

    fn engine() -> StorageEngine {
        StorageEngine::open_in_memory().unwrap()
    }

    #[test]
    fn expires_ttl_past_memories() {
        let storage = engine();
        let m = Memory::new(
            "alice".into(),
            "s1".into(),
            "hello".into(),
            0.5,
            Some(1),
            None,
            vec![],
        )
        .unwrap();
        MemoryStore::insert(&storage, &m).unwrap();

        let decay = DecayEngine::new(&storage);
        let future = Utc::now() + Duration::hours(2);
        let stats = decay.run(future, &DecayPolicy::default()).unwrap();
        assert_eq!(stats.memories_expired, 1);
        assert!(MemoryStore::get(&storage, "alice", &m.id).unwrap().is_none());
    }

    #[test]
    fn second_run_with_no_writes_is_monotone() {
        let storage = engine();
        let m = Memory::new("alice".into(), "s1".into(), "hello".into(), 0.5, Some(1), None, vec![])
            .unwrap();
        MemoryStore::insert(&storage, &m).unwrap();

        let decay = DecayEngine::new(&storage);
        let future = Utc::now() + Duration::hours(2);
        decay.run(future, &DecayPolicy::default()).unwrap();
        let second = decay.run(future, &DecayPolicy::default()).unwrap();
        assert_eq!(second.memories_expired, 0);
    }

    #[test]
    fn evicts_lowest_importance_first_over_quota() {
        let storage = engine();
        for importance in [0.9, 0.5, 0.1] {
            let m = Memory::new("alice".into(), "s1".into(), "x".into(), importance, None, None, vec![])
                .unwrap();
            MemoryStore::insert(&storage, &m).unwrap();
        }
        let policy = DecayPolicy {
            max_memories_per_user: 2,
            ..DecayPolicy::default()
        };
        let decay = DecayEngine::new(&storage);
        let stats = decay.run(Utc::now(), &policy).unwrap();
        assert_eq!(stats.memories_evicted, 1);
        assert_eq!(MemoryStore::count_for_user(&storage, "alice").unwrap(), 2);
    }
}
