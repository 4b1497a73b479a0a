//! Single write connection behind `tokio::sync::Mutex`. Serialized writes —
//! no contention, no interleaving (spec §5 ordering).

use std::path::Path;
use std::time::{Duration, Instant};

use rusqlite::Connection;
use tokio::sync::Mutex;

use memex_core::constants::DEFAULT_OPERATION_DEADLINE_SECS;
use memex_core::{MemexError, MemexResult};

use super::pragmas::apply_pragmas;
use crate::to_storage_err;

/// Polling interval while waiting for the writer to free up (spec §5 `Busy`).
const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A single write connection protected by an async mutex.
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    /// Open a new write connection to the given database path.
    pub fn open(path: &Path) -> MemexResult<Self> {
        let conn = Connection::open(path).map_err(|e| to_storage_err(e.to_string()))?;
        apply_pragmas(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> MemexResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| to_storage_err(e.to_string()))?;
        apply_pragmas(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the write lock and execute a closure with the connection,
    /// bounded by the operation deadline (spec §5: `Timeout` when the
    /// acquire-plus-query future doesn't land before the deadline).
    pub async fn with_conn<F, T>(&self, f: F) -> MemexResult<T>
    where
        F: FnOnce(&Connection) -> MemexResult<T>,
    {
        let fut = async {
            let guard = self.conn.lock().await;
            f(&guard)
        };
        match tokio::time::timeout(
            Duration::from_secs(DEFAULT_OPERATION_DEADLINE_SECS),
            fut,
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(MemexError::Timeout(
                "write connection acquire+query exceeded the operation deadline".into(),
            )),
        }
    }

    /// Synchronous access for non-async contexts (startup, migrations, the
    /// blocking public API, and tests). Polls `try_lock` instead of blocking
    /// forever so sustained writer contention surfaces as `Busy` rather than
    /// hanging the caller (spec §5).
    pub fn with_conn_sync<F, T>(&self, f: F) -> MemexResult<T>
    where
        F: FnOnce(&Connection) -> MemexResult<T>,
    {
        let deadline = Instant::now() + Duration::from_secs(DEFAULT_OPERATION_DEADLINE_SECS);
        loop {
            match self.conn.try_lock() {
                Ok(guard) => return f(&guard),
                Err(_) => {
                    if Instant::now() >= deadline {
                        return Err(MemexError::Busy(
                            "no write connection available before the operation deadline".into(),
                        ));
                    }
                    std::thread::sleep(ACQUIRE_POLL_INTERVAL);
                }
            }
        }
    }
}
