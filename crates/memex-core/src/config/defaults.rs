//! Default values for [`super::MemexConfig`] (spec §6's configuration table).

pub const DEFAULT_DATABASE_PATH: &str = "./memex.db";
pub const DEFAULT_MEMORY_TTL_HOURS: u32 = 720;
pub const DEFAULT_DECAY_INTERVAL_HOURS: u32 = 24;
pub const DEFAULT_IMPORTANCE_THRESHOLD: f64 = 0.3;
pub const DEFAULT_MAX_MEMORIES_PER_USER: u64 = 10_000;
pub const DEFAULT_MAX_REQUESTS_PER_MINUTE: u32 = 1000;
pub const DEFAULT_MAX_BATCH_SIZE: u32 = 100;
