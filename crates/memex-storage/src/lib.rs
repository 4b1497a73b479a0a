//! # memex-storage
//!
//! SQLite persistence layer: pool management, schema migrations, the
//! per-entity repositories, and the query filter compiler. Implements the
//! `memex-core` storage traits; nothing above this crate touches SQL.

pub mod engine;
pub mod filter_compiler;
pub mod migrations;
pub mod pool;
pub mod repo;

pub use engine::StorageEngine;

use memex_core::MemexError;

/// Convert a `rusqlite` error into the crate-wide taxonomy. SQLite does not
/// distinguish "disk full" from "corrupt schema" at the type level, so this
/// defaults to `Io`; the few call sites that can tell a constraint violation
/// apart map it to `Invalid`/`NotFound` themselves before falling through here.
pub fn to_storage_err(message: impl Into<String>) -> MemexError {
    MemexError::Io(message.into())
}
