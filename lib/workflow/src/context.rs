//! The per-run variable context.
//!
//! Seeded from the trigger payload, read by templates and conditions, and
//! extended by handlers (`ai_sentiment`, `ai_response`). Keys keep their
//! insertion order so stored snapshots read the way the run produced them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Insertion-ordered key/value bag owned by exactly one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableContext(Map<String, JsonValue>);

impl VariableContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context from a JSON object.
    #[must_use]
    pub fn from_map(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }

    /// Creates a context from a trigger payload.
    ///
    /// Returns `None` when the payload is not a JSON object.
    #[must_use]
    pub fn from_payload(payload: JsonValue) -> Option<Self> {
        match payload {
            JsonValue::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Returns the raw value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// Renders a value as text.
    ///
    /// Strings are returned as-is, `null` is treated as absent, anything else
    /// is rendered as compact JSON.
    #[must_use]
    pub fn get_text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Like [`get_text`](Self::get_text), but blank strings count as absent.
    #[must_use]
    pub fn non_blank(&self, key: &str) -> Option<String> {
        self.get_text(key).filter(|s| !s.trim().is_empty())
    }

    /// Sets a key. Existing keys keep their position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the context has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Snapshot as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.0.clone())
    }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for VariableContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Self::new();
        for (key, value) in iter {
            context.insert(key, value);
        }
        context
    }
}
