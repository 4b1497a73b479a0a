//! Pool of 8–16 read connections (concurrent, never blocked by the writer via WAL).

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use memex_core::constants::DEFAULT_OPERATION_DEADLINE_SECS;
use memex_core::{MemexError, MemexResult};

use super::pragmas::apply_read_pragmas;
use crate::to_storage_err;

/// Default number of read connections (spec §4.1).
const DEFAULT_POOL_SIZE: usize = 8;

/// Maximum number of read connections.
const MAX_POOL_SIZE: usize = 16;

/// Polling interval while waiting for a reader to free up (spec §5 `Busy`).
const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A pool of read-only SQLite connections.
pub struct ReadPool {
    connections: Vec<std::sync::Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    /// Open a pool of read connections to the given database path.
    pub fn open(path: &Path, pool_size: usize) -> MemexResult<Self> {
        let size = pool_size.clamp(1, MAX_POOL_SIZE);
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
            apply_read_pragmas(&conn)?;
            connections.push(std::sync::Mutex::new(conn));
        }
        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    /// Create an in-memory pool (for testing). Each connection is its own
    /// isolated database; callers needing writer visibility should route
    /// reads through the writer instead (see `StorageEngine::use_read_pool`).
    pub fn open_in_memory(pool_size: usize) -> MemexResult<Self> {
        let size = pool_size.clamp(1, MAX_POOL_SIZE);
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_in_memory().map_err(|e| to_storage_err(e.to_string()))?;
            apply_read_pragmas(&conn)?;
            connections.push(std::sync::Mutex::new(conn));
        }
        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    /// Execute a closure with a read connection from the pool (round-robin).
    /// Polls `try_lock` up to the operation deadline instead of blocking
    /// forever, surfacing sustained contention as `MemexError::Busy` (spec §5).
    pub fn with_conn<F, T>(&self, f: F) -> MemexResult<T>
    where
        F: FnOnce(&Connection) -> MemexResult<T>,
    {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        let slot = &self.connections[idx];
        let deadline = Instant::now() + Duration::from_secs(DEFAULT_OPERATION_DEADLINE_SECS);
        loop {
            match slot.try_lock() {
                Ok(guard) => return f(&guard),
                Err(std::sync::TryLockError::Poisoned(e)) => {
                    return Err(to_storage_err(format!("read pool lock poisoned: {e}")));
                }
                Err(std::sync::TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(MemexError::Busy(
                            "no read connection available before the operation deadline".into(),
                        ));
                    }
                    std::thread::sleep(ACQUIRE_POLL_INTERVAL);
                }
            }
        }
    }

    /// Number of connections in the pool.
    pub fn size(&self) -> usize {
        self.connections.len()
    }

    /// Default pool size (spec §4.1).
    pub fn default_size() -> usize {
        DEFAULT_POOL_SIZE
    }
}
