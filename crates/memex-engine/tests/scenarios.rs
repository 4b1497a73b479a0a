//! End-to-end scenarios exercised through `Engine`, not the repositories
//! directly — these are the literal walk-throughs a caller would perform.

use memex_core::config::MemexConfig;
use memex_core::filter::QueryFilter;
use memex_core::MemexError;
use memex_engine::{Engine, MemorySaveRequest};

fn engine() -> Engine {
    Engine::open_in_memory(MemexConfig::default()).unwrap()
}

/// A. Save + recall by keyword.
#[test]
fn save_and_recall_by_keyword() {
    let e = engine();
    let id = e
        .save(
            "alice",
            "s1",
            "Meeting notes about API design".into(),
            0.8,
            Some(720),
            None,
            vec![],
        )
        .unwrap();

    let filter = QueryFilter {
        user_id: Some("alice".into()),
        keywords: vec!["API".into()],
        limit: Some(10),
        ..Default::default()
    };
    let page = e.recall(filter).unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, id);
}

fn save_request(content: &str, importance: f64) -> MemorySaveRequest {
    MemorySaveRequest {
        user_id: "alice".into(),
        session_id: "s1".into(),
        content: content.into(),
        importance,
        ttl_hours: None,
        metadata: None,
        tags: vec![],
    }
}

/// B. Batch partial failure.
#[test]
fn save_batch_reports_partial_failure_at_the_right_index() {
    let e = engine();
    let response = e
        .save_batch(
            vec![save_request("a", 0.5), save_request("b", 1.5), save_request("c", 0.5)],
            false,
        )
        .unwrap();
    assert_eq!(response.success_count, 2);
    assert_eq!(response.failure_count, 1);
    let failing = response.results.iter().find(|r| r.index == 1).unwrap();
    assert_eq!(failing.error.as_ref().unwrap().kind, "Invalid");
}

/// E. Session cascade delete.
#[test]
fn cascade_delete_removes_session_and_its_memories() {
    let e = engine();
    let session = e.create_session("alice", Some("s".into())).unwrap();
    for i in 0..5 {
        e.save("alice", &session.id, format!("memory {i}"), 0.5, None, None, vec![])
            .unwrap();
    }

    assert!(e.delete_session("alice", &session.id, true).unwrap());

    let sessions = e.get_user_sessions("alice", 100, 0).unwrap();
    assert!(!sessions.iter().any(|s| s.id == session.id));

    let scoped = QueryFilter {
        session_id: Some(session.id.clone()),
        ..Default::default()
    };
    assert!(e.recall(scoped).unwrap().data.is_empty());
}

/// F. Rate limit.
#[test]
fn eleventh_save_within_a_minute_is_rate_limited() {
    let mut config = MemexConfig::default();
    config.rate_limit.max_requests_per_minute = 10;
    let e = Engine::open_in_memory(config).unwrap();

    for i in 0..10 {
        e.save("alice", "s1", format!("m{i}"), 0.5, None, None, vec![])
            .unwrap();
    }
    let err = e.save("alice", "s1", "eleventh".into(), 0.5, None, None, vec![]);
    assert!(matches!(err, Err(MemexError::RateLimited(_))));
}

/// D. Importance eviction with auto-eviction disabled, then enabled.
#[test]
fn quota_rejects_then_auto_evicts_lowest_importance() {
    let mut config = MemexConfig::default();
    config.quota.max_memories_per_user = 3;
    let e = Engine::open_in_memory(config.clone()).unwrap();
    for importance in [0.9, 0.5, 0.1] {
        e.save("alice", "s1", "x".into(), importance, None, None, vec![])
            .unwrap();
    }
    assert!(matches!(
        e.save("alice", "s1", "y".into(), 0.4, None, None, vec![]),
        Err(MemexError::QuotaExceeded(_))
    ));

    config.quota.auto_evict_on_quota = true;
    let e = Engine::open_in_memory(config).unwrap();
    for importance in [0.9, 0.5, 0.1] {
        e.save("alice", "s1", "x".into(), importance, None, None, vec![])
            .unwrap();
    }
    let new_id = e
        .save("alice", "s1", "y".into(), 0.4, None, None, vec![])
        .unwrap();
    assert!(e.get_memory("alice", &new_id).is_ok());
    let lowest_gone = e
        .recall(QueryFilter {
            user_id: Some("alice".into()),
            min_importance: Some(0.1),
            limit: Some(10),
            ..Default::default()
        })
        .unwrap();
    assert!(lowest_gone.data.iter().all(|m| m.importance != 0.1));
}
