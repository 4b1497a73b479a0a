//! # memex-api
//!
//! The Public API layer (spec §2, §6): a narrow, handle-based surface of
//! about 25 operations returning plain data values serializable as JSON.
//! This is what the (out-of-scope) REST façade and FFI bridge both call —
//! neither lives in this workspace, so this crate stops at the handle
//! registry and typed operations, not at any wire format of its own.
//!
//! **Handle model (spec §9).** The original passed a raw integer handle
//! across a language boundary backed by a process-wide singleton. Here an
//! `init` call allocates a small integer in an in-process registry that
//! owns the engine instance; every operation takes that handle and
//! revalidates it. There is no global mutable engine state and no
//! pointer-shaped handle.

pub mod envelope;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use memex_core::config::MemexConfig;
use memex_core::constants::VERSION;
use memex_core::filter::{PageResponse, QueryFilter};
use memex_core::memory::{Memory, MemoryPatch};
use memex_core::session::{Session, SessionSummary};
use memex_core::traits::{GlobalStats, UserStats};
use memex_core::{MemexError, MemexResult};
use memex_decay::{DecayPlan, DecayStats};
use memex_engine::{DecayPolicyUpdate, Engine, MemorySaveRequest, SaveBatchResponse};
use serde_json::Value as JsonValue;

/// Per-handle compatibility slot for callers that cannot carry typed errors
/// through their boundary (spec §7, §9). The native methods below never
/// need this themselves — they return `Result<T, MemexError>` directly.
#[derive(Debug, Clone)]
struct LastError {
    code: i32,
    kind: &'static str,
    message: String,
}

struct HandleEntry {
    engine: Arc<Engine>,
    /// Flipped by `Corrupt` per spec §7: "the engine must refuse further
    /// operations on that handle and surface the condition via `is_valid=false`."
    valid: AtomicBool,
    last_error: Mutex<Option<LastError>>,
}

/// The handle registry. One process may hold several independent `Memex`
/// instances (e.g. one per test); each owns its own handle space.
#[derive(Default)]
pub struct Memex {
    handles: dashmap::DashMap<u64, HandleEntry>,
    next_handle: AtomicU64,
}

impl Memex {
    pub fn new() -> Self {
        Self::default()
    }

    /// `init(config_json) -> handle` (spec §6). Parses and validates the
    /// config, opens storage at `database_path`, and allocates a handle.
    pub fn init(&self, config_json: &str) -> MemexResult<u64> {
        let config = MemexConfig::from_json(config_json)?;
        let engine = Arc::new(if config.database_path == ":memory:" {
            Engine::open_in_memory(config)?
        } else {
            Engine::open(config)?
        });
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        self.handles.insert(
            handle,
            HandleEntry {
                engine,
                valid: AtomicBool::new(true),
                last_error: Mutex::new(None),
            },
        );
        tracing::info!(handle, "memex handle initialized");
        Ok(handle)
    }

    /// `destroy(handle)`. Idempotent: destroying an unknown or
    /// already-destroyed handle is a no-op.
    pub fn destroy(&self, handle: u64) {
        if let Some((_, entry)) = self.handles.remove(&handle) {
            entry.engine.stop_decay_timer();
        }
    }

    pub fn is_valid(&self, handle: u64) -> bool {
        self.handles
            .get(&handle)
            .map(|e| e.valid.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn with_engine<T>(
        &self,
        handle: u64,
        f: impl FnOnce(&Engine) -> MemexResult<T>,
    ) -> MemexResult<T> {
        let entry = self
            .handles
            .get(&handle)
            .ok_or_else(|| MemexError::NotFound(format!("unknown handle {handle}")))?;
        if !entry.valid.load(Ordering::Relaxed) {
            return Err(MemexError::Corrupt(format!(
                "handle {handle} was marked invalid by a prior corruption"
            )));
        }
        let result = f(&entry.engine);
        if let Err(ref e) = result {
            if matches!(e, MemexError::Corrupt(_)) {
                entry.valid.store(false, Ordering::Relaxed);
            }
            *entry.last_error.lock().unwrap() = Some(LastError {
                code: e.code(),
                kind: e.kind(),
                message: e.to_string(),
            });
        }
        result
    }

    pub fn save(
        &self,
        handle: u64,
        user_id: &str,
        session_id: &str,
        content: &str,
        importance: f64,
        ttl_hours: Option<u32>,
        metadata_json: Option<&str>,
    ) -> MemexResult<String> {
        let metadata = metadata_json
            .map(|raw| {
                serde_json::from_str(raw)
                    .map_err(|e| MemexError::Invalid(format!("invalid metadata JSON: {e}")))
            })
            .transpose()?;
        self.with_engine(handle, |engine| {
            engine.save(
                user_id,
                session_id,
                content.to_string(),
                importance,
                ttl_hours,
                metadata,
                Vec::new(),
            )
        })
    }

    /// `save_batch(h, memories_json, fail_on_error)` (spec §6). Decodes the
    /// JSON array immediately at the boundary, per the "JSON at the
    /// boundary" design note — the engine never sees raw `JsonValue`.
    pub fn save_batch(
        &self,
        handle: u64,
        memories_json: &str,
        fail_on_error: bool,
    ) -> MemexResult<SaveBatchResponse> {
        let requests: Vec<MemorySaveRequest> = serde_json::from_str(memories_json)
            .map_err(|e| MemexError::Invalid(format!("invalid memories_json: {e}")))?;
        self.with_engine(handle, |engine| engine.save_batch(requests.clone(), fail_on_error))
    }

    pub fn recall(&self, handle: u64, filter_json: &str) -> MemexResult<PageResponse<Memory>> {
        let filter: QueryFilter = serde_json::from_str(filter_json)
            .map_err(|e| MemexError::Invalid(format!("invalid filter_json: {e}")))?;
        self.with_engine(handle, |engine| engine.recall(filter.clone()))
    }

    pub fn search(
        &self,
        handle: u64,
        user_id: &str,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> MemexResult<PageResponse<Memory>> {
        self.with_engine(handle, |engine| {
            engine.search(user_id, query, Some(limit), Some(offset))
        })
    }

    pub fn get_memory(&self, handle: u64, user_id: &str, id: &str) -> MemexResult<Memory> {
        self.with_engine(handle, |engine| engine.get_memory(user_id, id))
    }

    pub fn update_memory(
        &self,
        handle: u64,
        user_id: &str,
        id: &str,
        patch_json: &str,
    ) -> MemexResult<Memory> {
        let patch: MemoryPatch = serde_json::from_str(patch_json)
            .map_err(|e| MemexError::Invalid(format!("invalid patch_json: {e}")))?;
        self.with_engine(handle, |engine| {
            engine.update_memory(user_id, id, clone_patch(&patch))
        })
    }

    pub fn delete_memory(&self, handle: u64, user_id: &str, id: &str) -> MemexResult<bool> {
        self.with_engine(handle, |engine| engine.delete_memory(user_id, id))
    }

    pub fn create_session(
        &self,
        handle: u64,
        user_id: &str,
        name: Option<&str>,
    ) -> MemexResult<Session> {
        self.with_engine(handle, |engine| {
            engine.create_session(user_id, name.map(str::to_string))
        })
    }

    pub fn get_user_sessions(
        &self,
        handle: u64,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> MemexResult<Vec<Session>> {
        self.with_engine(handle, |engine| {
            engine.get_user_sessions(user_id, limit, offset)
        })
    }

    pub fn summarize_session(
        &self,
        handle: u64,
        user_id: &str,
        id: &str,
    ) -> MemexResult<Option<SessionSummary>> {
        self.with_engine(handle, |engine| engine.summarize_session(user_id, id))
    }

    pub fn search_sessions(
        &self,
        handle: u64,
        user_id: &str,
        keywords_json: &str,
    ) -> MemexResult<Vec<Session>> {
        let keywords: Vec<String> = serde_json::from_str(keywords_json)
            .map_err(|e| MemexError::Invalid(format!("invalid keywords_json: {e}")))?;
        self.with_engine(handle, |engine| engine.search_sessions(user_id, &keywords))
    }

    pub fn delete_session(
        &self,
        handle: u64,
        user_id: &str,
        id: &str,
        cascade: bool,
    ) -> MemexResult<bool> {
        self.with_engine(handle, |engine| engine.delete_session(user_id, id, cascade))
    }

    pub fn decay(&self, handle: u64) -> MemexResult<DecayStats> {
        self.with_engine(handle, |engine| engine.decay())
    }

    pub fn decay_analyze(&self, handle: u64) -> MemexResult<DecayPlan> {
        self.with_engine(handle, |engine| engine.decay_analyze())
    }

    pub fn update_decay_policy(&self, handle: u64, policy_json: &str) -> MemexResult<bool> {
        let update: DecayPolicyUpdate = serde_json::from_str(policy_json)
            .map_err(|e| MemexError::Invalid(format!("invalid policy_json: {e}")))?;
        self.with_engine(handle, |engine| {
            engine.update_decay_policy(clone_update(&update))?;
            Ok(true)
        })
    }

    pub fn get_stats(&self, handle: u64) -> MemexResult<GlobalStats> {
        self.with_engine(handle, |engine| engine.get_stats())
    }

    pub fn get_user_stats(&self, handle: u64, user_id: &str) -> MemexResult<UserStats> {
        self.with_engine(handle, |engine| engine.get_user_stats(user_id))
    }

    pub fn get_session_analytics(
        &self,
        handle: u64,
        user_id: &str,
    ) -> MemexResult<Vec<SessionSummary>> {
        self.with_engine(handle, |engine| engine.get_session_analytics(user_id))
    }

    pub fn export_user_memories(&self, handle: u64, user_id: &str) -> MemexResult<Vec<Memory>> {
        self.with_engine(handle, |engine| engine.export_user_memories(user_id))
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }

    /// `get_last_error(handle)` — the numeric code of the most recent
    /// failure on this handle, or `None` if it has never failed. FFI
    /// compatibility hatch only (spec §7, §9); prefer the typed `Result`
    /// every method above already returns.
    pub fn get_last_error(&self, handle: u64) -> Option<i32> {
        self.handles
            .get(&handle)
            .and_then(|e| e.last_error.lock().unwrap().as_ref().map(|le| le.code))
    }

    /// `error_message(code)` — stable human-readable text for a code
    /// previously returned by `get_last_error`.
    pub fn error_message(&self, code: i32) -> &'static str {
        match code {
            1 => "invalid input",
            2 => "not found",
            3 => "quota exceeded",
            4 => "rate limited",
            5 => "busy",
            6 => "timeout",
            7 => "corrupt storage",
            8 => "io error",
            9 => "bad config",
            _ => "unknown error",
        }
    }
}

fn clone_patch(patch: &MemoryPatch) -> MemoryPatch {
    MemoryPatch {
        content: patch.content.clone(),
        importance: patch.importance,
        metadata: patch.metadata.clone(),
        tags: patch.tags.clone(),
        ttl_hours: patch.ttl_hours,
    }
}

fn clone_update(update: &DecayPolicyUpdate) -> DecayPolicyUpdate {
    DecayPolicyUpdate {
        default_memory_ttl_hours: update.default_memory_ttl_hours,
        auto_decay_enabled: update.auto_decay_enabled,
        decay_interval_hours: update.decay_interval_hours,
        enable_compression: update.enable_compression,
        importance_threshold: update.importance_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_in_memory() -> (Memex, u64) {
        let api = Memex::new();
        let handle = api.init(r#"{"database_path": ":memory:"}"#).unwrap();
        (api, handle)
    }

    #[test]
    fn init_allocates_distinct_handles() {
        let api = Memex::new();
        let h1 = api.init(r#"{"database_path": ":memory:"}"#).unwrap();
        let h2 = api.init(r#"{"database_path": ":memory:"}"#).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn init_rejects_bad_config() {
        let api = Memex::new();
        let err = api.init(r#"{"decay": {"importance_threshold": 2.0}}"#);
        assert!(matches!(err, Err(MemexError::BadConfig(_))));
    }

    #[test]
    fn unknown_handle_returns_not_found() {
        let api = Memex::new();
        let err = api.get_memory(999, "alice", "nope");
        assert!(matches!(err, Err(MemexError::NotFound(_))));
    }

    #[test]
    fn save_and_recall_round_trip() {
        let (api, h) = init_in_memory();
        let id = api
            .save(h, "alice", "s1", "Meeting notes about API design", 0.8, Some(720), None)
            .unwrap();
        let page = api
            .recall(h, r#"{"user_id":"alice","keywords":["API"],"limit":10}"#)
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, id);
    }

    #[test]
    fn destroy_then_operate_returns_not_found() {
        let (api, h) = init_in_memory();
        api.destroy(h);
        let err = api.get_memory(h, "alice", "x");
        assert!(matches!(err, Err(MemexError::NotFound(_))));
    }

    #[test]
    fn version_matches_crate_manifest() {
        let api = Memex::new();
        assert!(!api.version().is_empty());
    }
}
