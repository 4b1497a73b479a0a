//! Return shapes for `decay` and `analyze_decay` (spec §4.4).

use serde::{Deserialize, Serialize};

/// Returned by a mutating decay run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DecayStats {
    pub memories_expired: u64,
    pub memories_evicted: u64,
    pub memories_compressed: u64,
    pub elapsed_ms: u64,
}

/// Returned by `analyze_decay`: what the same selection logic *would* do,
/// without mutating anything. `would_evict` folds together pass 2
/// (importance-based eviction) and pass 3 (low-importance sweep), mirroring
/// how `DecayStats::memories_evicted` combines the two.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DecayPlan {
    pub would_expire: u64,
    pub would_evict: u64,
    pub would_compress: u64,
}
