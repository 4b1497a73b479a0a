pub mod patch;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::constants::{MAX_CONTENT_BYTES, MAX_METADATA_ENTRIES};
use crate::errors::MemexError;

pub use patch::MemoryPatch;

/// A single stored memory — the atomic unit of the engine (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    /// Opaque globally-unique identifier, stable across the entity's lifetime.
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub content: String,
    /// Real in `[0.0, 1.0]`.
    pub importance: f64,
    /// Absent means "never expires by TTL". `0`/negative are normalized to `None`.
    pub ttl_hours: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Derived from `created_at + ttl_hours`; `None` when `ttl_hours` is `None`.
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: JsonValue,
    pub tags: Vec<String>,
    pub access_count: u64,
    pub last_accessed_at: DateTime<Utc>,
}

impl Memory {
    /// Build a new memory from caller-supplied fields, validating and
    /// normalizing as it goes. `id`/timestamps are assigned here, not by
    /// the caller — this is the single place new memories come into being.
    pub fn new(
        user_id: String,
        session_id: String,
        content: String,
        importance: f64,
        ttl_hours: Option<u32>,
        metadata: Option<JsonValue>,
        tags: Vec<String>,
    ) -> Result<Self, MemexError> {
        validate_content(&content)?;
        validate_importance(importance)?;
        let metadata = metadata.unwrap_or_else(|| JsonValue::Object(Default::default()));
        validate_metadata(&metadata)?;
        if user_id.trim().is_empty() {
            return Err(MemexError::Invalid("user_id must not be empty".into()));
        }
        if session_id.trim().is_empty() {
            return Err(MemexError::Invalid("session_id must not be empty".into()));
        }

        let ttl_hours = normalize_ttl(ttl_hours);
        let now = Utc::now();
        let expires_at = derive_expires_at(now, ttl_hours);

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            session_id,
            content,
            importance,
            ttl_hours,
            created_at: now,
            updated_at: now,
            expires_at,
            metadata,
            tags: normalize_tags(tags),
            access_count: 0,
            last_accessed_at: now,
        })
    }

    /// Apply a partial update, recomputing `expires_at` and bumping
    /// `updated_at` only when something actually changed.
    pub fn apply_patch(&mut self, patch: MemoryPatch) -> Result<(), MemexError> {
        let mut touched = false;

        if let Some(content) = patch.content {
            validate_content(&content)?;
            self.content = content;
            touched = true;
        }
        if let Some(importance) = patch.importance {
            validate_importance(importance)?;
            self.importance = importance;
            touched = true;
        }
        if let Some(metadata) = patch.metadata {
            validate_metadata(&metadata)?;
            self.metadata = metadata;
            touched = true;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(tags);
            touched = true;
        }
        if let Some(ttl_hours) = patch.ttl_hours {
            self.ttl_hours = normalize_ttl(Some(ttl_hours));
            touched = true;
        }

        if touched {
            self.updated_at = Utc::now();
            self.expires_at = derive_expires_at(self.created_at, self.ttl_hours);
        }
        Ok(())
    }

    /// True once `expires_at` has passed relative to `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }

    /// Bookkeeping applied on every successful recall that returns this row.
    pub fn mark_accessed(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }
}

fn validate_content(content: &str) -> Result<(), MemexError> {
    if content.is_empty() {
        return Err(MemexError::Invalid("content must not be empty".into()));
    }
    if content.len() > MAX_CONTENT_BYTES {
        return Err(MemexError::Invalid(format!(
            "content exceeds {MAX_CONTENT_BYTES} bytes"
        )));
    }
    Ok(())
}

fn validate_importance(importance: f64) -> Result<(), MemexError> {
    if !(0.0..=1.0).contains(&importance) {
        return Err(MemexError::Invalid(format!(
            "importance must be within [0.0, 1.0], got {importance}"
        )));
    }
    Ok(())
}

fn validate_metadata(metadata: &JsonValue) -> Result<(), MemexError> {
    match metadata {
        JsonValue::Object(map) => {
            if map.len() > MAX_METADATA_ENTRIES {
                return Err(MemexError::Invalid(format!(
                    "metadata exceeds {MAX_METADATA_ENTRIES} entries"
                )));
            }
            Ok(())
        }
        _ => Err(MemexError::Invalid("metadata must be a JSON object".into())),
    }
}

/// `0` and negative TTLs mean "no TTL" (spec §9, open question a).
fn normalize_ttl(ttl_hours: Option<u32>) -> Option<u32> {
    ttl_hours.filter(|&h| h > 0)
}

fn derive_expires_at(created_at: DateTime<Utc>, ttl_hours: Option<u32>) -> Option<DateTime<Utc>> {
    ttl_hours.map(|h| created_at + Duration::hours(i64::from(h)))
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Memory {
        Memory::new(
            "alice".into(),
            "s1".into(),
            "hello world".into(),
            0.5,
            Some(24),
            None,
            vec!["Work".into(), "work".into()],
        )
        .unwrap()
    }

    #[test]
    fn new_normalizes_tags_and_derives_expiry() {
        let m = base();
        assert_eq!(m.tags, vec!["work"]);
        assert!(m.expires_at.is_some());
        assert_eq!(m.created_at, m.updated_at);
    }

    #[test]
    fn rejects_empty_content() {
        let err = Memory::new("a".into(), "s".into(), "".into(), 0.5, None, None, vec![]);
        assert!(matches!(err, Err(MemexError::Invalid(_))));
    }

    #[test]
    fn rejects_out_of_range_importance() {
        let err = Memory::new("a".into(), "s".into(), "x".into(), 1.5, None, None, vec![]);
        assert!(matches!(err, Err(MemexError::Invalid(_))));
    }

    #[test]
    fn zero_and_negative_ttl_mean_no_ttl() {
        let m = Memory::new("a".into(), "s".into(), "x".into(), 0.1, Some(0), None, vec![]).unwrap();
        assert_eq!(m.ttl_hours, None);
        assert_eq!(m.expires_at, None);
    }

    #[test]
    fn patch_recomputes_expiry_and_bumps_updated_at() {
        let mut m = base();
        let created = m.created_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        m.apply_patch(MemoryPatch {
            ttl_hours: Some(48),
            ..Default::default()
        })
        .unwrap();
        assert!(m.updated_at > created);
        assert_eq!(m.expires_at, Some(created + Duration::hours(48)));
    }
}
