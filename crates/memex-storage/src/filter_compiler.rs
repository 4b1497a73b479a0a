//! Translates a `NormalizedFilter` into a parameterized SQL fragment (spec
//! §4.5). No filter field is ever interpolated textually — every value
//! binds through `rusqlite::types::Value`. The FTS clause and the per-key
//! metadata predicates are the only structurally dynamic parts.

use memex_core::filter::NormalizedFilter;
use rusqlite::types::Value as SqlValue;

const MEMORY_COLUMNS: &str = "id, user_id, session_id, content, importance, ttl_hours, \
     created_at, updated_at, expires_at, metadata_json, tags_json, access_count, last_accessed_at";

/// A fully-built query: `select` fetches up to `limit + 1` rows (the extra
/// row lets the caller derive `has_next` without a second `COUNT`); `count`
/// mirrors the same predicates without `ORDER BY`/`LIMIT`, for `total_count`.
pub struct CompiledQuery {
    pub select_sql: String,
    pub count_sql: String,
    pub params: Vec<SqlValue>,
}

/// Compile `filter` into SQL. `require_keywords` is set by `search` (spec
/// §4.3's `search` convenience, which always has a query term) and by
/// `recall` (which may or may not). When keywords are present, the query
/// joins `memories_fts` and ranks by BM25.
pub fn compile(filter: &NormalizedFilter) -> CompiledQuery {
    let mut predicates = Vec::new();
    let mut params = Vec::new();

    let from_clause = if filter.keywords.is_empty() {
        "memories m".to_string()
    } else {
        let tokens = filter.keywords.join(" ");
        params.push(SqlValue::Text(tokens));
        predicates.push(format!("memories_fts MATCH ?{}", params.len()));
        "memories m JOIN memories_fts ON memories_fts.rowid = m.rowid".to_string()
    };

    if let Some(user_id) = &filter.user_id {
        params.push(SqlValue::Text(user_id.clone()));
        predicates.push(format!("m.user_id = ?{}", params.len()));
    }
    if let Some(session_id) = &filter.session_id {
        params.push(SqlValue::Text(session_id.clone()));
        predicates.push(format!("m.session_id = ?{}", params.len()));
    }
    if let Some(from) = filter.date_from {
        params.push(SqlValue::Text(from.to_rfc3339()));
        predicates.push(format!("m.created_at >= ?{}", params.len()));
    }
    if let Some(to) = filter.date_to {
        params.push(SqlValue::Text(to.to_rfc3339()));
        predicates.push(format!("m.created_at < ?{}", params.len()));
    }
    if let Some(min) = filter.min_importance {
        params.push(SqlValue::Real(min));
        predicates.push(format!("m.importance >= ?{}", params.len()));
    }
    for (key, value) in &filter.metadata {
        let json_path = format!("$.{key}");
        params.push(SqlValue::Text(json_path));
        let bound = json_scalar_to_sql(value);
        params.push(bound);
        let path_idx = params.len() - 1;
        predicates.push(format!(
            "json_extract(m.metadata_json, ?{}) = ?{}",
            path_idx, path_idx + 1
        ));
    }

    let where_clause = if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    };

    let order_clause = if filter.keywords.is_empty() {
        " ORDER BY m.created_at DESC, m.importance DESC, m.id"
    } else {
        " ORDER BY bm25(memories_fts), m.importance DESC, m.created_at DESC, m.id"
    };

    let select_from = from_clause;

    let limit = i64::from(filter.limit) + 1;
    let offset = i64::from(filter.offset);
    let mut select_params = params.clone();
    select_params.push(SqlValue::Integer(limit));
    select_params.push(SqlValue::Integer(offset));
    let limit_idx = select_params.len() - 1;

    let select_sql = format!(
        "SELECT {MEMORY_COLUMNS} FROM {select_from}{where_clause}{order_clause} LIMIT ?{} OFFSET ?{}",
        limit_idx,
        limit_idx + 1
    );
    let count_sql = format!("SELECT COUNT(*) FROM {select_from}{where_clause}");

    CompiledQuery {
        select_sql,
        count_sql,
        params: select_params,
    }
}

fn json_scalar_to_sql(value: &serde_json::Value) -> SqlValue {
    match value {
        serde_json::Value::String(s) => SqlValue::Text(s.clone()),
        serde_json::Value::Number(n) if n.is_i64() => SqlValue::Integer(n.as_i64().unwrap()),
        serde_json::Value::Number(n) => SqlValue::Real(n.as_f64().unwrap_or_default()),
        serde_json::Value::Bool(b) => SqlValue::Integer(if *b { 1 } else { 0 }),
        serde_json::Value::Null => SqlValue::Null,
        other => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn base_filter() -> NormalizedFilter {
        NormalizedFilter {
            user_id: Some("alice".into()),
            session_id: None,
            keywords: vec![],
            date_from: None,
            date_to: None,
            min_importance: None,
            metadata: BTreeMap::new(),
            limit: 50,
            offset: 0,
        }
    }

    #[test]
    fn plain_filter_has_no_fts_join() {
        let q = compile(&base_filter());
        assert!(!q.select_sql.contains("memories_fts"));
        assert!(q.select_sql.contains("m.user_id = ?1"));
    }

    #[test]
    fn keyword_filter_joins_fts_and_ranks_by_bm25() {
        let mut f = base_filter();
        f.keywords = vec!["API".into()];
        let q = compile(&f);
        assert!(q.select_sql.contains("memories_fts MATCH"));
        assert!(q.select_sql.contains("bm25(memories_fts)"));
    }

    #[test]
    fn limit_plus_one_is_requested() {
        let mut f = base_filter();
        f.limit = 10;
        let q = compile(&f);
        assert!(matches!(q.params.last(), Some(SqlValue::Integer(0))));
        let limit_param = &q.params[q.params.len() - 2];
        assert!(matches!(limit_param, SqlValue::Integer(11)));
    }
}
