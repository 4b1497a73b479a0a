//! `Engine` — the orchestrator (spec §2, §4.3). Sits on top of the concrete
//! `memex_storage::StorageEngine` rather than its trait objects: quota
//! enforcement needs the count-then-insert to share a transaction, which
//! only the storage crate's repositories can give it, and decay scheduling
//! needs the same concrete type `memex-decay` depends on.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use memex_core::config::MemexConfig;
use memex_core::constants::MAX_BATCH_REQUEST_SIZE;
use memex_core::filter::{NormalizedFilter, PageResponse, QueryFilter};
use memex_core::memory::{Memory, MemoryPatch};
use memex_core::session::{Session, SessionSummary};
use memex_core::traits::{GlobalStats, MemoryStore, SessionStore, StatsStore, UserStats};
use memex_core::{MemexError, MemexResult};
use memex_decay::{DecayEngine, DecayPlan, DecayPolicy, DecayStats};
use memex_storage::repo::memory_repo;
use memex_storage::StorageEngine;

use crate::rate_limiter::RateLimiter;

/// One row of a `save_batch` request (spec §6's `save_batch(h, memories_json, ...)`).
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySaveRequest {
    pub user_id: String,
    pub session_id: String,
    pub content: String,
    pub importance: f64,
    #[serde(default)]
    pub ttl_hours: Option<u32>,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemError {
    pub kind: String,
    pub message: String,
}

/// One entry of `SaveBatchResponse::results` (spec §4.3: `{index, status, id|error}`).
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchItemError>,
}

fn ok_result(index: usize, id: String) -> BatchItemResult {
    BatchItemResult {
        index,
        status: BatchStatus::Ok,
        id: Some(id),
        error: None,
    }
}

fn error_result(index: usize, err: &MemexError) -> BatchItemResult {
    BatchItemResult {
        index,
        status: BatchStatus::Error,
        id: None,
        error: Some(BatchItemError {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }),
    }
}

/// Response of `save_batch` (spec §4.3).
#[derive(Debug, Clone, Serialize, Default)]
pub struct SaveBatchResponse {
    pub results: Vec<BatchItemResult>,
    pub success_count: usize,
    pub failure_count: usize,
}

/// Partial update for `update_decay_policy` (spec §6).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecayPolicyUpdate {
    pub default_memory_ttl_hours: Option<u32>,
    pub auto_decay_enabled: Option<bool>,
    pub decay_interval_hours: Option<u32>,
    pub enable_compression: Option<bool>,
    pub importance_threshold: Option<f64>,
}

pub struct Engine {
    storage: Arc<StorageEngine>,
    config: RwLock<MemexConfig>,
    rate_limiter: RateLimiter,
    decay_cancelled: Arc<AtomicBool>,
}

impl Engine {
    pub fn new(storage: Arc<StorageEngine>, config: MemexConfig) -> Self {
        Self {
            storage,
            config: RwLock::new(config),
            rate_limiter: RateLimiter::new(),
            decay_cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn open(config: MemexConfig) -> MemexResult<Self> {
        let storage = Arc::new(StorageEngine::open(std::path::Path::new(
            &config.database_path,
        ))?);
        Ok(Self::new(storage, config))
    }

    pub fn open_in_memory(config: MemexConfig) -> MemexResult<Self> {
        let storage = Arc::new(StorageEngine::open_in_memory()?);
        Ok(Self::new(storage, config))
    }

    fn config_snapshot(&self) -> MemexConfig {
        self.config.read().unwrap().clone()
    }

    fn check_rate_limit(&self, user_id: &str) -> MemexResult<()> {
        let config = self.config_snapshot();
        if !config.rate_limit.enabled {
            return Ok(());
        }
        if self
            .rate_limiter
            .check_and_record(user_id, config.rate_limit.max_requests_per_minute)
        {
            Ok(())
        } else {
            Err(MemexError::RateLimited(format!(
                "user {user_id} exceeded {} requests/minute",
                config.rate_limit.max_requests_per_minute
            )))
        }
    }

    /// Creates the session on first write, or bumps `last_activity_at` on
    /// every later write (spec §3 Lifecycle: "updated by any memory write
    /// that touches it"). Called from every path that lands a memory in a
    /// session, so `touch` never goes stale relative to the memories table.
    fn ensure_session(&self, user_id: &str, session_id: &str) -> MemexResult<()> {
        if SessionStore::get(self.storage.as_ref(), user_id, session_id)?.is_none() {
            let session = Session::new(
                Some(session_id.to_string()),
                user_id.to_string(),
                None,
                None,
            )?;
            SessionStore::insert(self.storage.as_ref(), &session)?;
        } else {
            SessionStore::touch(self.storage.as_ref(), user_id, session_id, Utc::now())?;
        }
        Ok(())
    }

    /// Count-then-insert inside one writer transaction (spec §4.3: "quota
    /// enforcement reads `count_by_user` inside the same transaction as the
    /// insert"). When `auto_evict_on_quota` is set, the lowest-importance
    /// row for the user is evicted to make room instead of failing.
    fn insert_with_quota_check(
        &self,
        memory: &Memory,
        max_memories_per_user: u64,
        auto_evict_on_quota: bool,
    ) -> MemexResult<()> {
        self.storage.pool().writer.with_conn_sync(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;

            let count = memory_repo::count_for_user(&tx, &memory.user_id)?;
            if count >= max_memories_per_user {
                if auto_evict_on_quota {
                    evict_one_lowest_importance(&tx, &memory.user_id)?;
                } else {
                    return Err(MemexError::QuotaExceeded(format!(
                        "user {} has reached the memory quota of {max_memories_per_user}",
                        memory.user_id
                    )));
                }
            }

            memory_repo::insert(&tx, memory)?;
            tx.commit()
                .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
            Ok(())
        })
    }

    /// Best-effort, fire-and-forget access bookkeeping (spec §4.3: "the
    /// update is best-effort and must never block or fail the read").
    fn spawn_access_bookkeeping(&self, rows: &[Memory]) {
        if rows.is_empty() {
            return;
        }
        let storage = Arc::clone(&self.storage);
        let targets: Vec<(String, String)> =
            rows.iter().map(|m| (m.user_id.clone(), m.id.clone())).collect();
        std::thread::spawn(move || {
            let now = Utc::now();
            for (user_id, id) in targets {
                if let Err(e) = MemoryStore::mark_accessed(storage.as_ref(), &user_id, &id, now) {
                    tracing::warn!(
                        error = %e,
                        user_id = %user_id,
                        memory_id = %id,
                        "access bookkeeping failed"
                    );
                }
            }
        });
    }

    pub fn save(
        &self,
        user_id: &str,
        session_id: &str,
        content: String,
        importance: f64,
        ttl_hours: Option<u32>,
        metadata: Option<JsonValue>,
        tags: Vec<String>,
    ) -> MemexResult<String> {
        self.check_rate_limit(user_id)?;

        let memory = Memory::new(
            user_id.to_string(),
            session_id.to_string(),
            content,
            importance,
            ttl_hours,
            metadata,
            tags,
        )?;

        self.ensure_session(user_id, session_id)?;

        let config = self.config_snapshot();
        self.insert_with_quota_check(
            &memory,
            config.quota.max_memories_per_user,
            config.quota.auto_evict_on_quota,
        )?;

        tracing::info!(user_id = %user_id, memory_id = %memory.id, "save accepted");
        Ok(memory.id)
    }

    pub fn save_batch(
        &self,
        memories: Vec<MemorySaveRequest>,
        fail_on_error: bool,
    ) -> MemexResult<SaveBatchResponse> {
        if memories.is_empty() {
            return Ok(SaveBatchResponse::default());
        }
        if memories.len() > MAX_BATCH_REQUEST_SIZE {
            return Err(MemexError::Invalid(format!(
                "batch of {} memories exceeds the {MAX_BATCH_REQUEST_SIZE} per-call ceiling",
                memories.len()
            )));
        }
        if fail_on_error {
            self.save_batch_atomic(memories)
        } else {
            self.save_batch_chunked(memories)
        }
    }

    /// `fail_on_error=true`: one transaction, first error rolls back
    /// everything. The response names the offending index and error kind
    /// rather than the caller receiving a bare `Err`, matching the uniform
    /// `{results, success_count, failure_count}` response shape both modes
    /// share.
    fn save_batch_atomic(&self, memories: Vec<MemorySaveRequest>) -> MemexResult<SaveBatchResponse> {
        let config = self.config_snapshot();

        let mut built: Vec<(usize, Memory)> = Vec::with_capacity(memories.len());
        for (index, req) in memories.into_iter().enumerate() {
            if let Err(e) = self.check_rate_limit(&req.user_id) {
                return Ok(single_failure(index, &e));
            }
            match Memory::new(
                req.user_id,
                req.session_id,
                req.content,
                req.importance,
                req.ttl_hours,
                req.metadata,
                req.tags,
            ) {
                Ok(memory) => built.push((index, memory)),
                Err(e) => return Ok(single_failure(index, &e)),
            }
        }

        for (index, memory) in &built {
            if let Err(e) = self.ensure_session(&memory.user_id, &memory.session_id) {
                return Ok(single_failure(*index, &e));
            }
        }

        let mut failed: Option<(usize, MemexError)> = None;
        self.storage.pool().writer.with_conn_sync(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
            for (index, memory) in &built {
                let count = memory_repo::count_for_user(&tx, &memory.user_id)?;
                if count >= config.quota.max_memories_per_user {
                    failed = Some((
                        *index,
                        MemexError::QuotaExceeded(format!(
                            "user {} has reached the memory quota of {}",
                            memory.user_id, config.quota.max_memories_per_user
                        )),
                    ));
                    return Ok(());
                }
                if let Err(e) = memory_repo::insert(&tx, memory) {
                    failed = Some((*index, e));
                    return Ok(());
                }
            }
            tx.commit()
                .map_err(|e| memex_storage::to_storage_err(e.to_string()))
        })?;

        if let Some((index, e)) = failed {
            return Ok(single_failure(index, &e));
        }

        let success_count = built.len();
        let results = built
            .into_iter()
            .map(|(index, memory)| ok_result(index, memory.id))
            .collect();
        Ok(SaveBatchResponse {
            results,
            success_count,
            failure_count: 0,
        })
    }

    /// `fail_on_error=false`: split into sub-transactions of up to
    /// `max_batch_size` rows; per-row validation/quota failures are
    /// collected, infrastructure errors abort the whole call (there is no
    /// well-defined partial response once the database itself is failing).
    fn save_batch_chunked(&self, memories: Vec<MemorySaveRequest>) -> MemexResult<SaveBatchResponse> {
        let config = self.config_snapshot();
        let chunk_size = (config.batch.max_batch_size.max(1)) as usize;

        let indexed: Vec<(usize, MemorySaveRequest)> = memories.into_iter().enumerate().collect();
        let mut results: Vec<BatchItemResult> = Vec::with_capacity(indexed.len());
        let mut success_count = 0usize;
        let mut failure_count = 0usize;

        for chunk in indexed.chunks(chunk_size) {
            let mut chunk_built: Vec<(usize, Memory)> = Vec::new();
            for (index, req) in chunk {
                let index = *index;
                if let Err(e) = self.check_rate_limit(&req.user_id) {
                    results.push(error_result(index, &e));
                    failure_count += 1;
                    continue;
                }
                match Memory::new(
                    req.user_id.clone(),
                    req.session_id.clone(),
                    req.content.clone(),
                    req.importance,
                    req.ttl_hours,
                    req.metadata.clone(),
                    req.tags.clone(),
                ) {
                    Ok(memory) => chunk_built.push((index, memory)),
                    Err(e) => {
                        results.push(error_result(index, &e));
                        failure_count += 1;
                    }
                }
            }

            for (_, memory) in &chunk_built {
                self.ensure_session(&memory.user_id, &memory.session_id)?;
            }

            let mut quota_failed: Vec<(usize, String)> = Vec::new();
            let mut inserted: Vec<(usize, String)> = Vec::new();
            self.storage.pool().writer.with_conn_sync(|conn| {
                let tx = conn
                    .unchecked_transaction()
                    .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
                for (index, memory) in &chunk_built {
                    let count = memory_repo::count_for_user(&tx, &memory.user_id)?;
                    if count >= config.quota.max_memories_per_user {
                        quota_failed.push((*index, memory.user_id.clone()));
                        continue;
                    }
                    memory_repo::insert(&tx, memory)?;
                    inserted.push((*index, memory.id.clone()));
                }
                tx.commit()
                    .map_err(|e| memex_storage::to_storage_err(e.to_string()))
            })?;

            for (index, user_id) in quota_failed {
                let err = MemexError::QuotaExceeded(format!(
                    "user {user_id} has reached the memory quota of {}",
                    config.quota.max_memories_per_user
                ));
                results.push(error_result(index, &err));
                failure_count += 1;
            }
            for (index, id) in inserted {
                results.push(ok_result(index, id));
                success_count += 1;
            }
        }

        results.sort_by_key(|r| r.index);
        Ok(SaveBatchResponse {
            results,
            success_count,
            failure_count,
        })
    }

    pub fn recall(&self, filter: QueryFilter) -> MemexResult<PageResponse<Memory>> {
        let normalized = filter.normalize()?;
        let page = MemoryStore::query(self.storage.as_ref(), &normalized)?;
        self.spawn_access_bookkeeping(&page.data);
        Ok(page)
    }

    pub fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> MemexResult<PageResponse<Memory>> {
        let filter = QueryFilter {
            user_id: Some(user_id.to_string()),
            keywords: vec![query.to_string()],
            limit,
            offset,
            ..Default::default()
        };
        let normalized = filter.normalize()?;
        let page = MemoryStore::search(self.storage.as_ref(), &normalized)?;
        self.spawn_access_bookkeeping(&page.data);
        Ok(page)
    }

    pub fn get_memory(&self, user_id: &str, id: &str) -> MemexResult<Memory> {
        MemoryStore::get(self.storage.as_ref(), user_id, id)?
            .ok_or_else(|| MemexError::NotFound(format!("memory {id} not found for user {user_id}")))
    }

    pub fn update_memory(&self, user_id: &str, id: &str, patch: MemoryPatch) -> MemexResult<Memory> {
        MemoryStore::update(self.storage.as_ref(), user_id, id, patch)
    }

    pub fn delete_memory(&self, user_id: &str, id: &str) -> MemexResult<bool> {
        MemoryStore::delete(self.storage.as_ref(), user_id, id)
    }

    pub fn create_session(&self, user_id: &str, name: Option<String>) -> MemexResult<Session> {
        let session = Session::new(None, user_id.to_string(), name, None)?;
        SessionStore::insert(self.storage.as_ref(), &session)?;
        Ok(session)
    }

    pub fn get_user_sessions(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> MemexResult<Vec<Session>> {
        let sessions = SessionStore::list_for_user(self.storage.as_ref(), user_id)?;
        Ok(sessions
            .into_iter()
            .skip(offset as usize)
            .take(limit.max(1) as usize)
            .collect())
    }

    pub fn summarize_session(&self, user_id: &str, id: &str) -> MemexResult<Option<SessionSummary>> {
        SessionStore::summarize(self.storage.as_ref(), user_id, id)
    }

    pub fn search_sessions(&self, user_id: &str, keywords: &[String]) -> MemexResult<Vec<Session>> {
        SessionStore::search(self.storage.as_ref(), user_id, keywords)
    }

    fn session_has_memories(&self, user_id: &str, session_id: &str) -> MemexResult<bool> {
        let filter = NormalizedFilter {
            user_id: Some(user_id.to_string()),
            session_id: Some(session_id.to_string()),
            keywords: Vec::new(),
            date_from: None,
            date_to: None,
            min_importance: None,
            metadata: BTreeMap::new(),
            limit: 1,
            offset: 0,
        };
        let page = MemoryStore::query(self.storage.as_ref(), &filter)?;
        Ok(!page.data.is_empty())
    }

    /// `cascade=true` relies on the schema's `ON DELETE CASCADE` on
    /// `memories.session_id`; `cascade=false` refuses to delete a session
    /// that still has memories rather than silently cascading (spec §4.2:
    /// "the caller decides whether to delete memories first when cascade is
    /// declined").
    pub fn delete_session(&self, user_id: &str, id: &str, cascade: bool) -> MemexResult<bool> {
        if !cascade && self.session_has_memories(user_id, id)? {
            return Err(MemexError::Invalid(format!(
                "session {id} still has memories; pass cascade=true to delete them"
            )));
        }
        SessionStore::delete(self.storage.as_ref(), user_id, id)
    }

    pub fn decay(&self) -> MemexResult<DecayStats> {
        let policy = DecayPolicy::from(&self.config_snapshot());
        DecayEngine::new(self.storage.as_ref()).run(Utc::now(), &policy)
    }

    pub fn decay_analyze(&self) -> MemexResult<DecayPlan> {
        let policy = DecayPolicy::from(&self.config_snapshot());
        DecayEngine::new(self.storage.as_ref()).analyze(Utc::now(), &policy)
    }

    pub fn update_decay_policy(&self, update: DecayPolicyUpdate) -> MemexResult<()> {
        let mut config = self.config.write().unwrap();
        if let Some(v) = update.importance_threshold {
            if !(0.0..=1.0).contains(&v) {
                return Err(MemexError::BadConfig(
                    "importance_threshold must be within [0.0, 1.0]".into(),
                ));
            }
            config.decay.importance_threshold = v;
        }
        if let Some(v) = update.default_memory_ttl_hours {
            config.decay.default_memory_ttl_hours = v;
        }
        if let Some(v) = update.auto_decay_enabled {
            config.decay.auto_decay_enabled = v;
        }
        if let Some(v) = update.decay_interval_hours {
            config.decay.decay_interval_hours = v;
        }
        if let Some(v) = update.enable_compression {
            config.decay.enable_compression = v;
        }
        Ok(())
    }

    pub fn get_stats(&self) -> MemexResult<GlobalStats> {
        StatsStore::global_stats(self.storage.as_ref())
    }

    pub fn get_user_stats(&self, user_id: &str) -> MemexResult<UserStats> {
        StatsStore::user_stats(self.storage.as_ref(), user_id)
    }

    pub fn get_session_analytics(&self, user_id: &str) -> MemexResult<Vec<SessionSummary>> {
        let sessions = SessionStore::list_for_user(self.storage.as_ref(), user_id)?;
        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            if let Some(summary) = SessionStore::summarize(self.storage.as_ref(), user_id, &session.id)? {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }

    pub fn export_user_memories(&self, user_id: &str) -> MemexResult<Vec<Memory>> {
        MemoryStore::all_for_user(self.storage.as_ref(), user_id)
    }

    /// Spawn the background decay timer (spec §4.4: runs "on a timer ...
    /// when `auto_decay_enabled`"). Cancellable at pass boundaries via
    /// `stop_decay_timer`, per spec §5.
    pub fn spawn_decay_timer(self: &Arc<Self>) -> std::thread::JoinHandle<()> {
        let engine = Arc::clone(self);
        std::thread::spawn(move || loop {
            if engine.decay_cancelled.load(Ordering::Relaxed) {
                break;
            }
            let interval_hours = engine.config.read().unwrap().decay.decay_interval_hours;
            std::thread::sleep(std::time::Duration::from_secs(u64::from(interval_hours) * 3600));
            if engine.decay_cancelled.load(Ordering::Relaxed) {
                break;
            }
            if !engine.config.read().unwrap().decay.auto_decay_enabled {
                continue;
            }
            if let Err(e) = engine.decay() {
                tracing::warn!(error = %e, "scheduled decay pass failed");
            }
        })
    }

    pub fn stop_decay_timer(&self) {
        self.decay_cancelled.store(true, Ordering::Relaxed);
    }
}

fn single_failure(index: usize, err: &MemexError) -> SaveBatchResponse {
    SaveBatchResponse {
        results: vec![error_result(index, err)],
        success_count: 0,
        failure_count: 1,
    }
}

fn evict_one_lowest_importance(conn: &Connection, user_id: &str) -> MemexResult<()> {
    conn.execute(
        "DELETE FROM memories WHERE id = (
            SELECT id FROM memories WHERE user_id = ?1
            ORDER BY importance ASC, last_accessed_at ASC, created_at ASC
            LIMIT 1
        )",
        params![user_id],
    )
    .map_err(|e| memex_storage::to_storage_err(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::open_in_memory(MemexConfig::default()).unwrap()
    }

    #[test]
    fn save_then_get_round_trips() {
        let e = engine();
        let id = e
            .save("alice", "s1", "hello".into(), 0.5, None, None, vec![])
            .unwrap();
        let m = e.get_memory("alice", &id).unwrap();
        assert_eq!(m.content, "hello");
        assert_eq!(m.access_count, 0);
    }

    #[test]
    fn save_rejects_over_quota_without_auto_evict() {
        let mut config = MemexConfig::default();
        config.quota.max_memories_per_user = 2;
        let e = Engine::open_in_memory(config).unwrap();
        for importance in [0.9, 0.5] {
            e.save("alice", "s1", "x".into(), importance, None, None, vec![])
                .unwrap();
        }
        let err = e.save("alice", "s1", "y".into(), 0.4, None, None, vec![]);
        assert!(matches!(err, Err(MemexError::QuotaExceeded(_))));
    }

    #[test]
    fn save_auto_evicts_lowest_importance_when_enabled() {
        let mut config = MemexConfig::default();
        config.quota.max_memories_per_user = 3;
        config.quota.auto_evict_on_quota = true;
        let e = Engine::open_in_memory(config).unwrap();
        for importance in [0.9, 0.5, 0.1] {
            e.save("alice", "s1", "x".into(), importance, None, None, vec![])
                .unwrap();
        }
        let new_id = e
            .save("alice", "s1", "y".into(), 0.4, None, None, vec![])
            .unwrap();
        assert_eq!(
            MemoryStore::count_for_user(e.storage.as_ref(), "alice").unwrap(),
            3
        );
        assert!(e.get_memory("alice", &new_id).is_ok());
    }

    #[test]
    fn save_batch_fail_on_error_reports_offending_index() {
        let e = engine();
        let memories = vec![
            MemorySaveRequest {
                user_id: "alice".into(),
                session_id: "s1".into(),
                content: "a".into(),
                importance: 0.5,
                ttl_hours: None,
                metadata: None,
                tags: vec![],
            },
            MemorySaveRequest {
                user_id: "alice".into(),
                session_id: "s1".into(),
                content: "b".into(),
                importance: 1.5,
                ttl_hours: None,
                metadata: None,
                tags: vec![],
            },
        ];
        let response = e.save_batch(memories, true).unwrap();
        assert_eq!(response.success_count, 0);
        assert_eq!(response.failure_count, 1);
        assert_eq!(response.results[0].index, 1);
        assert_eq!(response.results[0].error.as_ref().unwrap().kind, "Invalid");
    }

    #[test]
    fn save_batch_partial_failure_collects_both_outcomes() {
        let e = engine();
        let valid = |content: &str| MemorySaveRequest {
            user_id: "alice".into(),
            session_id: "s1".into(),
            content: content.into(),
            importance: 0.5,
            ttl_hours: None,
            metadata: None,
            tags: vec![],
        };
        let mut invalid = valid("bad");
        invalid.importance = 1.5;
        let response = e
            .save_batch(vec![valid("a"), invalid, valid("b")], false)
            .unwrap();
        assert_eq!(response.success_count, 2);
        assert_eq!(response.failure_count, 1);
        assert_eq!(response.results[1].status, BatchStatus::Error);
        assert_eq!(
            response.results[1].error.as_ref().unwrap().kind,
            "Invalid"
        );
    }

    #[test]
    fn delete_session_cascade_removes_memories() {
        let e = engine();
        let session = e.create_session("alice", Some("s".into())).unwrap();
        e.save(
            "alice",
            &session.id,
            "hello".into(),
            0.5,
            None,
            None,
            vec![],
        )
        .unwrap();
        assert!(e.delete_session("alice", &session.id, true).unwrap());
        let filter = QueryFilter {
            session_id: Some(session.id.clone()),
            ..Default::default()
        };
        let page = e.recall(filter).unwrap();
        assert!(page.data.is_empty());
    }

    #[test]
    fn delete_session_without_cascade_refuses_when_memories_remain() {
        let e = engine();
        let session = e.create_session("alice", Some("s".into())).unwrap();
        e.save(
            "alice",
            &session.id,
            "hello".into(),
            0.5,
            None,
            None,
            vec![],
        )
        .unwrap();
        let err = e.delete_session("alice", &session.id, false);
        assert!(matches!(err, Err(MemexError::Invalid(_))));
    }

    #[test]
    fn rate_limit_blocks_excess_requests_for_same_user() {
        let mut config = MemexConfig::default();
        config.rate_limit.max_requests_per_minute = 2;
        let e = Engine::open_in_memory(config).unwrap();
        e.save("alice", "s1", "a".into(), 0.5, None, None, vec![])
            .unwrap();
        e.save("alice", "s1", "b".into(), 0.5, None, None, vec![])
            .unwrap();
        let err = e.save("alice", "s1", "c".into(), 0.5, None, None, vec![]);
        assert!(matches!(err, Err(MemexError::RateLimited(_))));
    }

    #[test]
    fn decay_runs_through_engine() {
        let e = engine();
        e.save(
            "alice",
            "s1",
            "x".into(),
            0.5,
            Some(1),
            None,
            vec![],
        )
        .unwrap();
        let stats = e.decay().unwrap();
        assert_eq!(stats.memories_expired, 0);
    }
}
