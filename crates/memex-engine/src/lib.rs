//! # memex-engine
//!
//! The orchestrator (spec §2, §4.3): validates inputs, composes repository
//! calls into higher-level operations (batch save, recall-with-filter,
//! session summary, decay pass), enforces per-user quotas and per-minute
//! request limits, and schedules the background decay task. Nothing above
//! this crate (`memex-api`) ever touches SQL or the storage traits
//! directly.

pub mod engine;
pub mod rate_limiter;

pub use engine::{
    BatchItemError, BatchItemResult, BatchStatus, DecayPolicyUpdate, Engine, MemorySaveRequest,
    SaveBatchResponse,
};
pub use rate_limiter::RateLimiter;
