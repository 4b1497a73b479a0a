//! The JSON error envelope (spec §6): `{"error": {"kind": "...", "message": "..."}}`.
//! Used by callers (the out-of-scope REST/FFI façades) that want a single
//! JSON value back regardless of success or failure; the native methods on
//! [`crate::Memex`] return plain `Result<T, MemexError>` and never need this
//! themselves.

use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use memex_core::MemexError;

/// Render a typed result as the spec's envelope shape: the serialized value
/// on success, `{"error": {...}}` on failure.
pub fn to_envelope<T: Serialize>(result: Result<T, MemexError>) -> JsonValue {
    match result {
        Ok(value) => serde_json::to_value(value).unwrap_or(JsonValue::Null),
        Err(err) => error_envelope(&err),
    }
}

pub fn error_envelope(err: &MemexError) -> JsonValue {
    json!({
        "error": {
            "kind": err.kind(),
            "message": err.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_value_serializes_directly() {
        let value = to_envelope(Ok::<_, MemexError>(42));
        assert_eq!(value, json!(42));
    }

    #[test]
    fn err_value_wraps_in_error_object() {
        let value = to_envelope(Err::<i32, _>(MemexError::NotFound("x".into())));
        assert_eq!(value["error"]["kind"], json!("NotFound"));
    }
}
