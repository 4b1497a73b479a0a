use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::constants::MAX_METADATA_ENTRIES;
use crate::errors::MemexError;

/// A grouping of memories belonging to one user (spec §3). Derived counters
/// (`memory_count`, `aggregate_importance`) are computed on demand by the
/// repository layer, not stored here — see `SessionSummary` in
/// `memex-storage`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub name: Option<String>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session, optionally with a caller-chosen id (used for
    /// implicit session creation on first `save` against an unknown id).
    pub fn new(
        id: Option<String>,
        user_id: String,
        name: Option<String>,
        metadata: Option<JsonValue>,
    ) -> Result<Self, MemexError> {
        if user_id.trim().is_empty() {
            return Err(MemexError::Invalid("user_id must not be empty".into()));
        }
        let metadata = metadata.unwrap_or_else(|| JsonValue::Object(Default::default()));
        if let JsonValue::Object(map) = &metadata {
            if map.len() > MAX_METADATA_ENTRIES {
                return Err(MemexError::Invalid(format!(
                    "metadata exceeds {MAX_METADATA_ENTRIES} entries"
                )));
            }
        } else {
            return Err(MemexError::Invalid("metadata must be a JSON object".into()));
        }

        let now = Utc::now();
        Ok(Self {
            id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            user_id,
            name,
            metadata,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        })
    }

    /// Bump `last_activity_at` (and `updated_at`) — called by any memory
    /// write that touches this session.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
        self.updated_at = now;
    }
}

/// Aggregates computed on demand by `StatsRepo`/`SessionRepo`, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub memory_count: u64,
    pub aggregate_importance: f64,
    pub average_importance: f64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub top_excerpts: Vec<MemoryExcerpt>,
    pub keyword_histogram: Vec<(String, u64)>,
}

/// One entry of `SessionSummary::top_excerpts`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryExcerpt {
    pub memory_id: String,
    pub importance: f64,
    pub excerpt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assigns_id_when_absent() {
        let s = Session::new(None, "alice".into(), None, None).unwrap();
        assert!(!s.id.is_empty());
        assert_eq!(s.created_at, s.updated_at);
    }

    #[test]
    fn new_rejects_empty_user() {
        assert!(Session::new(None, "".into(), None, None).is_err());
    }

    #[test]
    fn touch_bumps_activity_and_updated() {
        let mut s = Session::new(None, "alice".into(), None, None).unwrap();
        let created = s.last_activity_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        let now = Utc::now();
        s.touch(now);
        assert!(s.last_activity_at > created);
        assert_eq!(s.updated_at, now);
    }
}
