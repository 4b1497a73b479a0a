//! Per-entity repositories (spec §4.2). All SQL lives here; `engine.rs`
//! only sees the typed operations below, matching the teacher's
//! `queries::memory_crud`/`memory_query`/`memory_search` split collapsed
//! per-entity instead of per-operation-kind.

pub mod memory_repo;
pub mod session_repo;
pub mod stats_repo;
