//! `StorageEngine` — owns the `ConnectionPool`, runs migrations at startup,
//! and implements the `memex-core` storage traits. Mirrors the teacher's
//! `StorageEngine`: same `open`/`open_in_memory`/`open_temp` constructors,
//! same `use_read_pool` split between file-backed and in-memory modes.

use std::path::Path;

use chrono::{DateTime, Utc};

use memex_core::filter::{NormalizedFilter, PageResponse};
use memex_core::memory::{Memory, MemoryPatch};
use memex_core::session::{Session, SessionSummary};
use memex_core::traits::{GlobalStats, MemoryStore, SessionStore, StatsStore, UserStats};
use memex_core::MemexResult;

use crate::migrations;
use crate::pool::ConnectionPool;
use crate::repo::{memory_repo, session_repo, stats_repo};

/// The storage engine. Owns the connection pool and provides the full
/// `MemoryStore` + `SessionStore` + `StatsStore` interface.
pub struct StorageEngine {
    pool: ConnectionPool,
    /// When true, reads go through the read pool (file-backed mode). When
    /// false, reads go through the writer, because in-memory read pool
    /// connections are isolated databases that can't see the writer's state.
    use_read_pool: bool,
}

impl StorageEngine {
    /// Open a storage engine backed by a file on disk.
    pub fn open(path: &Path) -> MemexResult<Self> {
        let pool = ConnectionPool::open(path, crate::pool::ReadPool::default_size())?;
        let engine = Self {
            pool,
            use_read_pool: true,
        };
        engine.initialize()?;
        Ok(engine)
    }

    /// Open an in-memory storage engine (tests, `open_in_memory()` API op).
    pub fn open_in_memory() -> MemexResult<Self> {
        let pool = ConnectionPool::open_in_memory()?;
        let engine = Self {
            pool,
            use_read_pool: false,
        };
        engine.initialize()?;
        Ok(engine)
    }

    /// Open with a temp file on disk (integration tests that need genuine
    /// read/write connection separation).
    pub fn open_temp(path: &Path) -> MemexResult<Self> {
        Self::open(path)
    }

    fn initialize(&self) -> MemexResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| migrations::run_migrations(conn))?;
        tracing::info!("storage engine initialized");
        Ok(())
    }

    /// Reference to the connection pool, for the decay subsystem and tests
    /// that need direct transaction control over both passes.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    fn with_reader<F, T>(&self, f: F) -> MemexResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> MemexResult<T>,
    {
        if self.use_read_pool {
            self.pool.readers.with_conn(f)
        } else {
            self.pool.writer.with_conn_sync(f)
        }
    }
}

impl MemoryStore for StorageEngine {
    fn insert(&self, memory: &Memory) -> MemexResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| memory_repo::insert(conn, memory))?;
        tracing::info!(user_id = %memory.user_id, memory_id = %memory.id, "memory saved");
        Ok(())
    }

    fn insert_batch(&self, memories: &[Memory]) -> MemexResult<usize> {
        self.pool
            .writer
            .with_conn_sync(|conn| memory_repo::insert_many(conn, memories))
    }

    fn get(&self, user_id: &str, id: &str) -> MemexResult<Option<Memory>> {
        self.with_reader(|conn| memory_repo::get(conn, user_id, id))
    }

    fn update(&self, user_id: &str, id: &str, patch: MemoryPatch) -> MemexResult<Memory> {
        let updated = self
            .pool
            .writer
            .with_conn_sync(|conn| memory_repo::update(conn, user_id, id, patch))?;
        tracing::info!(user_id = %user_id, memory_id = %id, "memory updated");
        Ok(updated)
    }

    fn delete(&self, user_id: &str, id: &str) -> MemexResult<bool> {
        let deleted = self
            .pool
            .writer
            .with_conn_sync(|conn| memory_repo::delete(conn, user_id, id))?;
        if deleted {
            tracing::info!(user_id = %user_id, memory_id = %id, "memory deleted");
        }
        Ok(deleted)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> MemexResult<u64> {
        self.pool
            .writer
            .with_conn_sync(|conn| memory_repo::delete_expired(conn, now))
    }

    fn query(&self, filter: &NormalizedFilter) -> MemexResult<PageResponse<Memory>> {
        self.with_reader(|conn| memory_repo::list_by_filter(conn, filter, true))
    }

    fn search(&self, filter: &NormalizedFilter) -> MemexResult<PageResponse<Memory>> {
        self.with_reader(|conn| memory_repo::list_by_filter(conn, filter, true))
    }

    fn count_for_user(&self, user_id: &str) -> MemexResult<u64> {
        self.with_reader(|conn| memory_repo::count_for_user(conn, user_id))
    }

    fn mark_accessed(&self, user_id: &str, id: &str, now: DateTime<Utc>) -> MemexResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| memory_repo::mark_accessed(conn, user_id, id, now))
    }

    fn all_for_user(&self, user_id: &str) -> MemexResult<Vec<Memory>> {
        self.with_reader(|conn| memory_repo::all_for_user(conn, user_id))
    }
}

impl SessionStore for StorageEngine {
    fn insert(&self, session: &Session) -> MemexResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| session_repo::insert(conn, session))
    }

    fn get(&self, user_id: &str, id: &str) -> MemexResult<Option<Session>> {
        self.with_reader(|conn| session_repo::get(conn, user_id, id))
    }

    fn touch(&self, user_id: &str, id: &str, now: DateTime<Utc>) -> MemexResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| session_repo::touch(conn, user_id, id, now))
    }

    fn delete(&self, user_id: &str, id: &str) -> MemexResult<bool> {
        let deleted = self
            .pool
            .writer
            .with_conn_sync(|conn| session_repo::delete(conn, user_id, id))?;
        if deleted {
            tracing::info!(user_id = %user_id, session_id = %id, "session deleted");
        }
        Ok(deleted)
    }

    fn list_for_user(&self, user_id: &str) -> MemexResult<Vec<Session>> {
        self.with_reader(|conn| session_repo::list_for_user(conn, user_id))
    }

    fn search(&self, user_id: &str, keywords: &[String]) -> MemexResult<Vec<Session>> {
        self.with_reader(|conn| session_repo::search(conn, user_id, keywords))
    }

    fn summarize(&self, user_id: &str, id: &str) -> MemexResult<Option<SessionSummary>> {
        self.with_reader(|conn| session_repo::summarize(conn, user_id, id))
    }
}

impl StatsStore for StorageEngine {
    fn global_stats(&self) -> MemexResult<GlobalStats> {
        self.with_reader(stats_repo::global_stats)
    }

    fn user_stats(&self, user_id: &str) -> MemexResult<UserStats> {
        self.with_reader(|conn| stats_repo::user_stats(conn, user_id))
    }
}
