//! Helpers for the loosely-typed values carried by understandings, the
//! context key/value store and template conditions.

use serde_json::Value as JsonValue;

/// Returns whether a value counts as "present".
///
/// `null`, `false`, zero, empty strings and empty collections are falsy.
#[must_use]
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
    }
}

/// Normalizes an intent identifier: trimmed, lowercase, spaces as underscores.
///
/// Handlers and templates refer to intents in prose form ("what i can do");
/// the NLU emits identifiers (`what_i_can_do`). Both compare equal after this.
#[must_use]
pub fn normalize_intent(intent: &str) -> String {
    intent.trim().to_lowercase().replace(' ', "_")
}
