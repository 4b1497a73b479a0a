use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Partial update for `update_memory` (spec §4.3). A field left `None` is
/// untouched. To clear the TTL entirely, send `ttl_hours: 0` — consistent
/// with the engine's existing rule that `0` means "no TTL".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPatch {
    pub content: Option<String>,
    pub importance: Option<f64>,
    pub metadata: Option<JsonValue>,
    pub tags: Option<Vec<String>>,
    pub ttl_hours: Option<u32>,
}
