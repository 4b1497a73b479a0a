//! The crate-wide error taxonomy.
//!
//! Memex has a single coherent failure surface rather than one `thiserror`
//! enum per subsystem: every layer (storage, decay, engine, API) returns
//! [`MemexError`], and [`MemexError::kind`] gives the stable string used in
//! the JSON error envelope and by `error_message(code)` at the FFI boundary.

/// Result alias used throughout the workspace.
pub type MemexResult<T> = Result<T, MemexError>;

/// The full error taxonomy (spec §7).
#[derive(Debug, thiserror::Error)]
pub enum MemexError {
    /// Input violates a documented constraint (bad range, empty content, ...).
    #[error("invalid input: {0}")]
    Invalid(String),

    /// The entity referenced by the operation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The user's memory quota would be (or was) exceeded.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The caller's request rate exceeded `max_requests_per_minute`.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// No pool connection became available before the deadline.
    #[error("busy: {0}")]
    Busy(String),

    /// The operation's deadline elapsed before it completed.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Storage-level inconsistency detected; the handle should be considered dead.
    #[error("corrupt storage: {0}")]
    Corrupt(String),

    /// Underlying filesystem/database I/O failure.
    #[error("io error: {0}")]
    Io(String),

    /// Configuration was rejected at `init`.
    #[error("bad config: {0}")]
    BadConfig(String),
}

impl MemexError {
    /// Stable taxonomy name, matches the JSON error envelope's `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            MemexError::Invalid(_) => "Invalid",
            MemexError::NotFound(_) => "NotFound",
            MemexError::QuotaExceeded(_) => "QuotaExceeded",
            MemexError::RateLimited(_) => "RateLimited",
            MemexError::Busy(_) => "Busy",
            MemexError::Timeout(_) => "Timeout",
            MemexError::Corrupt(_) => "Corrupt",
            MemexError::Io(_) => "IO",
            MemexError::BadConfig(_) => "BadConfig",
        }
    }

    /// Numeric code stable across a process's lifetime, used by the FFI
    /// `get_last_error`/`error_message` compatibility hatch.
    pub fn code(&self) -> i32 {
        match self {
            MemexError::Invalid(_) => 1,
            MemexError::NotFound(_) => 2,
            MemexError::QuotaExceeded(_) => 3,
            MemexError::RateLimited(_) => 4,
            MemexError::Busy(_) => 5,
            MemexError::Timeout(_) => 6,
            MemexError::Corrupt(_) => 7,
            MemexError::Io(_) => 8,
            MemexError::BadConfig(_) => 9,
        }
    }
}
