//! CRUD + keyword search over the `MemoryStore` implementation.

use memex_core::filter::QueryFilter;
use memex_core::memory::{Memory, MemoryPatch};
use memex_core::traits::MemoryStore;
use memex_storage::StorageEngine;

fn memory(content: &str, importance: f64) -> Memory {
    Memory::new(
        "alice".into(),
        "s1".into(),
        content.into(),
        importance,
        None,
        None,
        vec![],
    )
    .unwrap()
}

#[test]
fn insert_then_get_round_trips() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let m = memory("hello world", 0.7);
    MemoryStore::insert(&engine, &m).unwrap();

    let fetched = MemoryStore::get(&engine, "alice", &m.id).unwrap().unwrap();
    assert_eq!(fetched.content, "hello world");
    assert_eq!(fetched.importance, 0.7);
    assert_eq!(fetched.access_count, 0);
}

#[test]
fn get_unknown_id_returns_none() {
    let engine = StorageEngine::open_in_memory().unwrap();
    assert!(MemoryStore::get(&engine, "alice", "nope").unwrap().is_none());
}

#[test]
fn update_applies_patch_and_bumps_updated_at() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let m = memory("hello world", 0.7);
    MemoryStore::insert(&engine, &m).unwrap();

    let updated = MemoryStore::update(
        &engine,
        "alice",
        &m.id,
        MemoryPatch {
            content: Some("goodbye world".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.content, "goodbye world");
    assert!(updated.updated_at >= m.updated_at);
}

#[test]
fn delete_removes_the_row() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let m = memory("hello world", 0.7);
    MemoryStore::insert(&engine, &m).unwrap();

    assert!(MemoryStore::delete(&engine, "alice", &m.id).unwrap());
    assert!(MemoryStore::get(&engine, "alice", &m.id).unwrap().is_none());
    assert!(!MemoryStore::delete(&engine, "alice", &m.id).unwrap());
}

#[test]
fn count_for_user_reflects_inserts() {
    let engine = StorageEngine::open_in_memory().unwrap();
    assert_eq!(MemoryStore::count_for_user(&engine, "alice").unwrap(), 0);
    MemoryStore::insert(&engine, &memory("a", 0.5)).unwrap();
    MemoryStore::insert(&engine, &memory("b", 0.5)).unwrap();
    assert_eq!(MemoryStore::count_for_user(&engine, "alice").unwrap(), 2);
}

#[test]
fn keyword_search_finds_matching_memory_only() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let m = memory("Meeting notes about API design", 0.8);
    MemoryStore::insert(&engine, &m).unwrap();
    MemoryStore::insert(&engine, &memory("Grocery list for the weekend", 0.3)).unwrap();

    let filter = QueryFilter {
        user_id: Some("alice".into()),
        keywords: vec!["API".into()],
        limit: Some(10),
        ..Default::default()
    }
    .normalize()
    .unwrap();

    let page = MemoryStore::search(&engine, &filter).unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, m.id);
}

#[test]
fn query_filter_scopes_by_session() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let mut in_session = memory("a", 0.5);
    in_session.session_id = "target".into();
    MemoryStore::insert(&engine, &in_session).unwrap();
    MemoryStore::insert(&engine, &memory("b", 0.5)).unwrap();

    let filter = QueryFilter {
        session_id: Some("target".into()),
        limit: Some(10),
        ..Default::default()
    }
    .normalize()
    .unwrap();
    let page = MemoryStore::query(&engine, &filter).unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, in_session.id);
}
