//! Storage-facing traits. `memex-storage` implements these against SQLite;
//! `memex-engine` depends on them as trait objects so it never sees a
//! `Connection` directly. Grouped the way the teacher's `IMemoryStorage`
//! groups CRUD/query/search/aggregation — separate traits here instead of
//! one mega-trait, since sessions and stats are independently substitutable
//! in tests.

use chrono::{DateTime, Utc};

use crate::errors::MemexResult;
use crate::filter::{NormalizedFilter, PageResponse};
use crate::memory::{Memory, MemoryPatch};
use crate::session::{Session, SessionSummary};

/// CRUD + query + search over memories.
pub trait MemoryStore: Send + Sync {
    fn insert(&self, memory: &Memory) -> MemexResult<()>;
    fn insert_batch(&self, memories: &[Memory]) -> MemexResult<usize>;
    fn get(&self, user_id: &str, id: &str) -> MemexResult<Option<Memory>>;
    fn update(&self, user_id: &str, id: &str, patch: MemoryPatch) -> MemexResult<Memory>;
    fn delete(&self, user_id: &str, id: &str) -> MemexResult<bool>;
    fn delete_expired(&self, now: DateTime<Utc>) -> MemexResult<u64>;

    /// Recall: structured filter only, no free-text ranking.
    fn query(&self, filter: &NormalizedFilter) -> MemexResult<PageResponse<Memory>>;
    /// Search: `filter.keywords` is required and drives FTS5 BM25 ranking.
    fn search(&self, filter: &NormalizedFilter) -> MemexResult<PageResponse<Memory>>;

    fn count_for_user(&self, user_id: &str) -> MemexResult<u64>;
    fn mark_accessed(&self, user_id: &str, id: &str, now: DateTime<Utc>) -> MemexResult<()>;

    /// All memories for a user, oldest first — used by `export_user_memories`.
    fn all_for_user(&self, user_id: &str) -> MemexResult<Vec<Memory>>;
}

/// CRUD + listing over sessions.
pub trait SessionStore: Send + Sync {
    fn insert(&self, session: &Session) -> MemexResult<()>;
    fn get(&self, user_id: &str, id: &str) -> MemexResult<Option<Session>>;
    fn touch(&self, user_id: &str, id: &str, now: DateTime<Utc>) -> MemexResult<()>;
    fn delete(&self, user_id: &str, id: &str) -> MemexResult<bool>;
    fn list_for_user(&self, user_id: &str) -> MemexResult<Vec<Session>>;
    /// Sessions with at least one memory whose content/tags match `keywords`
    /// via FTS5 (spec §4.2: `search(user_id, keywords) -> sessions whose
    /// memories' FTS matches`).
    fn search(&self, user_id: &str, keywords: &[String]) -> MemexResult<Vec<Session>>;
    fn summarize(&self, user_id: &str, id: &str) -> MemexResult<Option<SessionSummary>>;
}

/// Aggregate read-only statistics (spec §4.4).
pub trait StatsStore: Send + Sync {
    fn global_stats(&self) -> MemexResult<GlobalStats>;
    fn user_stats(&self, user_id: &str) -> MemexResult<UserStats>;
}

/// Snapshot returned by `get_stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStats {
    pub total_memories: u64,
    pub total_sessions: u64,
    pub total_users: u64,
    pub average_importance: f64,
}

/// Snapshot returned by `get_user_stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStats {
    pub total_memories: u64,
    pub total_sessions: u64,
    pub average_importance: f64,
    pub oldest_memory_at: Option<DateTime<Utc>>,
    pub newest_memory_at: Option<DateTime<Utc>>,
}
