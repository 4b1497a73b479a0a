use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};
use crate::errors::MemexError;

/// Transient recall filter (spec §3). Never persisted; compiled into SQL by
/// `memex-storage`'s query filter compiler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryFilter {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    /// Ordered free-text terms, matched against the FTS index. Empty ⇒ no
    /// text predicate. Passed through to FTS5 MATCH syntax as-is, so the
    /// caller may use FTS5 boolean operators (`AND`/`OR`/`NOT`) directly.
    #[serde(default)]
    pub keywords: Vec<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub min_importance: Option<f64>,
    /// Equality predicates against top-level metadata keys.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl QueryFilter {
    /// Resolve `limit`/`offset` defaults and reject values spec §4.3 calls
    /// invalid (`limit > 1000`, negative offset, malformed date window).
    pub fn normalize(mut self) -> Result<NormalizedFilter, MemexError> {
        let limit = self.limit.unwrap_or(DEFAULT_QUERY_LIMIT as u32);
        if limit as usize > MAX_QUERY_LIMIT {
            return Err(MemexError::Invalid(format!(
                "limit {limit} exceeds maximum of {MAX_QUERY_LIMIT}"
            )));
        }
        if limit == 0 {
            return Err(MemexError::Invalid("limit must be at least 1".into()));
        }
        let offset = self.offset.unwrap_or(0);

        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(MemexError::Invalid(
                    "date_from must not be after date_to".into(),
                ));
            }
        }
        if let Some(min) = self.min_importance {
            if !(0.0..=1.0).contains(&min) {
                return Err(MemexError::Invalid(
                    "min_importance must be within [0.0, 1.0]".into(),
                ));
            }
        }

        self.keywords.retain(|k| !k.trim().is_empty());

        Ok(NormalizedFilter {
            user_id: self.user_id,
            session_id: self.session_id,
            keywords: self.keywords,
            date_from: self.date_from,
            date_to: self.date_to,
            min_importance: self.min_importance,
            metadata: self.metadata,
            limit,
            offset,
        })
    }
}

/// A `QueryFilter` whose defaults have been applied and whose shape has
/// been validated — the only form the storage layer accepts.
#[derive(Debug, Clone)]
pub struct NormalizedFilter {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub keywords: Vec<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub min_importance: Option<f64>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub limit: u32,
    pub offset: u32,
}

/// A page of results plus pagination metadata (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PageResponse<T> {
    /// Build a page from `data` (already limited to `per_page` rows),
    /// `total_count` (count before pagination), and the request's
    /// `offset`/`limit`. `has_next` is derived by the caller from the
    /// `limit+1` trick (spec §4.2) rather than recomputed from
    /// `total_count`, so it stays correct even when `total_count` was not
    /// requested.
    pub fn new(data: Vec<T>, total_count: u64, offset: u32, limit: u32, has_next: bool) -> Self {
        let per_page = limit.max(1);
        let page = offset / per_page + 1;
        let total_pages = if total_count == 0 {
            0
        } else {
            ((total_count - 1) / u64::from(per_page) + 1) as u32
        };
        Self {
            data,
            total_count,
            page,
            per_page,
            total_pages,
            has_next,
            has_prev: offset > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_applies_defaults() {
        let f = QueryFilter::default().normalize().unwrap();
        assert_eq!(f.limit, DEFAULT_QUERY_LIMIT as u32);
        assert_eq!(f.offset, 0);
    }

    #[test]
    fn normalize_rejects_oversized_limit() {
        let f = QueryFilter {
            limit: Some(1001),
            ..Default::default()
        };
        assert!(matches!(f.normalize(), Err(MemexError::Invalid(_))));
    }

    #[test]
    fn normalize_rejects_inverted_date_window() {
        let now = Utc::now();
        let f = QueryFilter {
            date_from: Some(now),
            date_to: Some(now - chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(matches!(f.normalize(), Err(MemexError::Invalid(_))));
    }

    #[test]
    fn page_response_computes_pagination() {
        let page: PageResponse<i32> = PageResponse::new(vec![1, 2], 42, 0, 2, true);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 21);
        assert!(page.has_next);
        assert!(!page.has_prev);
    }
}
