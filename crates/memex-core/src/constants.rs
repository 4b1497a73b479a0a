//! Crate-wide limits that are not themselves runtime configuration.
//!
//! Values tunable per-deployment (quotas, rate limits, TTL defaults) live in
//! [`crate::config`] instead — these are hard ceilings the engine enforces
//! regardless of configuration.

/// Memex version, taken from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum content length for a single memory, in bytes.
pub const MAX_CONTENT_BYTES: usize = 64 * 1024;

/// Maximum number of metadata entries on a single memory or session.
pub const MAX_METADATA_ENTRIES: usize = 64;

/// Hard ceiling on `QueryFilter::limit`, regardless of the caller's request.
pub const MAX_QUERY_LIMIT: usize = 1000;

/// Default `QueryFilter::limit` when the caller does not specify one.
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Hard ceiling on the number of memories accepted by a single `save_batch` call.
pub const MAX_BATCH_REQUEST_SIZE: usize = 10_000;

/// Default deadline (seconds) for acquiring a pool connection before an
/// operation gives up with `MemexError::Busy`/`Timeout` (spec §5).
pub const DEFAULT_OPERATION_DEADLINE_SECS: u64 = 30;

/// Excerpt length (chars) used by `summarize_session`'s top-K memories.
pub const SUMMARY_EXCERPT_CHARS: usize = 120;

/// Number of top memories returned by `summarize_session`.
pub const SUMMARY_TOP_K: usize = 10;
