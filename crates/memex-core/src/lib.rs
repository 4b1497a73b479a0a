//! # memex-core
//!
//! Foundation crate for the Memex memory engine.
//! Defines the data model, config, errors, and the storage-facing traits.
//! Every other crate in the workspace depends on this one; it has no SQL
//! and no I/O.

pub mod config;
pub mod constants;
pub mod errors;
pub mod filter;
pub mod memory;
pub mod session;
pub mod traits;

pub use config::MemexConfig;
pub use errors::{MemexError, MemexResult};
pub use filter::{NormalizedFilter, PageResponse, QueryFilter};
pub use memory::{Memory, MemoryPatch};
pub use session::{Session, SessionSummary};
pub use traits::{GlobalStats, MemoryStore, SessionStore, StatsStore, UserStats};
