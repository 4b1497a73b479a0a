//! Exercises the handle registry and the JSON boundary from outside the
//! crate, the way a REST/FFI façade would call in.

use memex_api::envelope::to_envelope;
use memex_api::Memex;

#[test]
fn init_save_recall_through_json_boundary() {
    let api = Memex::new();
    let handle = api.init(r#"{"database_path": ":memory:"}"#).unwrap();

    let id = api
        .save(handle, "alice", "s1", "Meeting notes about API design", 0.8, Some(720), None)
        .unwrap();

    let page = api
        .recall(handle, r#"{"user_id":"alice","keywords":["API"],"limit":10}"#)
        .unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, id);
}

#[test]
fn save_batch_decodes_json_array_and_reports_partial_failure() {
    let api = Memex::new();
    let handle = api.init(r#"{"database_path": ":memory:"}"#).unwrap();

    let memories_json = r#"[
        {"user_id":"alice","session_id":"s1","content":"a","importance":0.5},
        {"user_id":"alice","session_id":"s1","content":"b","importance":1.5},
        {"user_id":"alice","session_id":"s1","content":"c","importance":0.5}
    ]"#;
    let response = api.save_batch(handle, memories_json, false).unwrap();
    assert_eq!(response.success_count, 2);
    assert_eq!(response.failure_count, 1);
}

#[test]
fn malformed_json_is_rejected_before_touching_the_engine() {
    let api = Memex::new();
    let handle = api.init(r#"{"database_path": ":memory:"}"#).unwrap();
    let err = api.recall(handle, "not json");
    assert!(err.is_err());
}

#[test]
fn destroyed_handle_cannot_be_reused() {
    let api = Memex::new();
    let handle = api.init(r#"{"database_path": ":memory:"}"#).unwrap();
    api.destroy(handle);
    assert!(!api.is_valid(handle));
    assert!(api.get_memory(handle, "alice", "x").is_err());
}

#[test]
fn envelope_wraps_api_errors_for_json_only_callers() {
    let api = Memex::new();
    let handle = api.init(r#"{"database_path": ":memory:"}"#).unwrap();
    let value = to_envelope(api.get_memory(handle, "alice", "missing"));
    assert_eq!(value["error"]["kind"], "NotFound");
}
