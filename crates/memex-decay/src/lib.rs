//! # memex-decay
//!
//! The decay subsystem (spec §4.4): four passes — TTL expiry,
//! importance-based eviction, low-importance sweep, and optional lossy
//! compression — run on demand or on a timer. All four passes run inside a
//! single writer transaction and report `DecayStats`; `analyze_decay` runs
//! the same selection logic read-only.

pub mod engine;
pub mod policy;
pub mod stats;

pub use engine::DecayEngine;
pub use policy::DecayPolicy;
pub use stats::{DecayPlan, DecayStats};
