//! Runtime configuration (spec §6). One struct per concern, each with a
//! `Default` impl giving the values from spec.md, following the teacher's
//! `DecayConfig`/`ConsolidationConfig` pattern: small structs,
//! `#[serde(default)]`, no builder boilerplate.

mod defaults;

use serde::{Deserialize, Serialize};

use crate::errors::MemexError;

pub use defaults::*;

/// Top-level configuration, parsed from the `init(config_json)` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemexConfig {
    pub database_path: String,
    pub decay: DecayConfig,
    pub quota: QuotaConfig,
    pub rate_limit: RateLimitConfig,
    pub batch: BatchConfig,
}

impl Default for MemexConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            decay: DecayConfig::default(),
            quota: QuotaConfig::default(),
            rate_limit: RateLimitConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl MemexConfig {
    /// Parse and validate an `init(config_json)` payload. Unknown fields
    /// are ignored; missing fields fall back to defaults (every struct in
    /// this module is `#[serde(default)]`).
    pub fn from_json(raw: &str) -> Result<Self, MemexError> {
        let config: MemexConfig = serde_json::from_str(raw)
            .map_err(|e| MemexError::BadConfig(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), MemexError> {
        if self.database_path.trim().is_empty() {
            return Err(MemexError::BadConfig("database_path must not be empty".into()));
        }
        if self.quota.max_memories_per_user == 0 {
            return Err(MemexError::BadConfig(
                "max_memories_per_user must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.decay.importance_threshold) {
            return Err(MemexError::BadConfig(
                "importance_threshold must be within [0.0, 1.0]".into(),
            ));
        }
        if self.rate_limit.enabled && self.rate_limit.max_requests_per_minute == 0 {
            return Err(MemexError::BadConfig(
                "max_requests_per_minute must be at least 1 when request limits are enabled"
                    .into(),
            ));
        }
        if self.batch.max_batch_size == 0 {
            return Err(MemexError::BadConfig("max_batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Decay subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    pub default_memory_ttl_hours: u32,
    pub auto_decay_enabled: bool,
    pub decay_interval_hours: u32,
    pub enable_compression: bool,
    pub importance_threshold: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            default_memory_ttl_hours: DEFAULT_MEMORY_TTL_HOURS,
            auto_decay_enabled: true,
            decay_interval_hours: DEFAULT_DECAY_INTERVAL_HOURS,
            enable_compression: true,
            importance_threshold: DEFAULT_IMPORTANCE_THRESHOLD,
        }
    }
}

/// Per-user memory quota configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub max_memories_per_user: u64,
    /// When true, a save that would breach quota evicts the
    /// lowest-importance expired-or-near-expiry memories first instead of
    /// failing outright (spec §3, invariants). Off by default.
    pub auto_evict_on_quota: bool,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_memories_per_user: DEFAULT_MAX_MEMORIES_PER_USER,
            auto_evict_on_quota: false,
        }
    }
}

/// Per-user request rate gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests_per_minute: DEFAULT_MAX_REQUESTS_PER_MINUTE,
        }
    }
}

/// Batch ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_batch_size: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = MemexConfig::default();
        assert_eq!(c.database_path, "./memex.db");
        assert_eq!(c.decay.default_memory_ttl_hours, 720);
        assert!(c.decay.auto_decay_enabled);
        assert_eq!(c.decay.decay_interval_hours, 24);
        assert!(c.decay.enable_compression);
        assert_eq!(c.quota.max_memories_per_user, 10_000);
        assert_eq!(c.decay.importance_threshold, 0.3);
        assert!(c.rate_limit.enabled);
        assert_eq!(c.rate_limit.max_requests_per_minute, 1000);
        assert_eq!(c.batch.max_batch_size, 100);
    }

    #[test]
    fn from_json_fills_missing_fields_with_defaults() {
        let c = MemexConfig::from_json(r#"{"database_path": "/tmp/x.db"}"#).unwrap();
        assert_eq!(c.database_path, "/tmp/x.db");
        assert_eq!(c.quota.max_memories_per_user, 10_000);
    }

    #[test]
    fn from_json_rejects_bad_threshold() {
        let err = MemexConfig::from_json(r#"{"decay": {"importance_threshold": 2.0}}"#);
        assert!(matches!(err, Err(MemexError::BadConfig(_))));
    }

    #[test]
    fn from_json_ignores_unknown_fields() {
        let c = MemexConfig::from_json(r#"{"totally_unknown_field": 42}"#).unwrap();
        assert_eq!(c.database_path, "./memex.db");
    }
}
