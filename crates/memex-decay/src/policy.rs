//! The subset of `MemexConfig` that the decay passes need, decoupled from
//! the full config tree so `DecayEngine` can be driven directly by tests
//! and by `update_decay_policy` without round-tripping through JSON.

use memex_core::config::MemexConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayPolicy {
    pub default_memory_ttl_hours: u32,
    pub importance_threshold: f64,
    pub max_memories_per_user: u64,
    pub enable_compression: bool,
}

impl From<&MemexConfig> for DecayPolicy {
    fn from(config: &MemexConfig) -> Self {
        Self {
            default_memory_ttl_hours: config.decay.default_memory_ttl_hours,
            importance_threshold: config.decay.importance_threshold,
            max_memories_per_user: config.quota.max_memories_per_user,
            enable_compression: config.decay.enable_compression,
        }
    }
}

impl Default for DecayPolicy {
    fn default() -> Self {
        Self::from(&MemexConfig::default())
    }
}
