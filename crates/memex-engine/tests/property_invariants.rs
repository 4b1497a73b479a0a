//! Property tests for spec invariants 1, 3, 4, and 7.

use proptest::prelude::*;

use memex_core::config::MemexConfig;
use memex_core::filter::QueryFilter;
use memex_engine::Engine;

proptest! {
    /// 1. `0 <= importance <= 1`, `created_at <= updated_at`, and `expires_at`
    /// is derived correctly whenever a TTL was given.
    #[test]
    fn saved_memory_respects_its_own_invariants(
        importance in 0.0f64..=1.0,
        ttl_hours in 1u32..10_000,
        content in "[a-zA-Z0-9 ]{1,200}",
    ) {
        let e = Engine::open_in_memory(MemexConfig::default()).unwrap();
        let id = e
            .save("alice", "s1", content, importance, Some(ttl_hours), None, vec![])
            .unwrap();
        let m = e.get_memory("alice", &id).unwrap();

        prop_assert!((0.0..=1.0).contains(&m.importance));
        prop_assert!(m.created_at <= m.updated_at);
        prop_assert_eq!(
            m.expires_at,
            Some(m.created_at + chrono::Duration::hours(i64::from(ttl_hours)))
        );
    }

    /// 3. Round-trip: `save(x) -> get(id) == x` modulo server-assigned fields.
    #[test]
    fn save_then_get_round_trips_modulo_server_fields(
        content in "[a-zA-Z0-9 ]{1,200}",
        importance in 0.0f64..=1.0,
    ) {
        let e = Engine::open_in_memory(MemexConfig::default()).unwrap();
        let id = e
            .save("alice", "s1", content.clone(), importance, None, None, vec![])
            .unwrap();
        let m = e.get_memory("alice", &id).unwrap();

        prop_assert_eq!(&m.content, &content);
        prop_assert_eq!(m.importance, importance);
        prop_assert_eq!(m.user_id, "alice");
        prop_assert_eq!(m.session_id, "s1");
        prop_assert_eq!(m.access_count, 0);
    }

    /// 4. `recall` idempotence: two back-to-back identical recalls return
    /// identical `data` and `total_count` (access bookkeeping excluded —
    /// it never touches `data`/`total_count`, only `access_count`/
    /// `last_accessed_at` on rows already returned).
    #[test]
    fn recall_is_idempotent_across_identical_calls(
        contents in prop::collection::vec("[a-zA-Z0-9 ]{1,40}", 1..8),
    ) {
        let e = Engine::open_in_memory(MemexConfig::default()).unwrap();
        for c in &contents {
            e.save("alice", "s1", c.clone(), 0.5, None, None, vec![]).unwrap();
        }

        let filter = || QueryFilter {
            user_id: Some("alice".into()),
            limit: Some(50),
            ..Default::default()
        };
        let first = e.recall(filter()).unwrap();
        let second = e.recall(filter()).unwrap();

        let first_ids: Vec<_> = first.data.iter().map(|m| &m.id).collect();
        let second_ids: Vec<_> = second.data.iter().map(|m| &m.id).collect();
        prop_assert_eq!(first_ids, second_ids);
        prop_assert_eq!(first.total_count, second.total_count);
    }

    /// 7. Ordering determinism: two recalls with identical filters return
    /// rows in the same order.
    #[test]
    fn recall_ordering_is_stable_across_calls(
        contents in prop::collection::vec("[a-zA-Z0-9 ]{1,40}", 2..10),
    ) {
        let e = Engine::open_in_memory(MemexConfig::default()).unwrap();
        for c in &contents {
            e.save("alice", "s1", c.clone(), 0.5, None, None, vec![]).unwrap();
        }

        let filter = || QueryFilter {
            user_id: Some("alice".into()),
            limit: Some(50),
            ..Default::default()
        };
        let a: Vec<_> = e.recall(filter()).unwrap().data.into_iter().map(|m| m.id).collect();
        let b: Vec<_> = e.recall(filter()).unwrap().data.into_iter().map(|m| m.id).collect();
        prop_assert_eq!(a, b);
    }
}
