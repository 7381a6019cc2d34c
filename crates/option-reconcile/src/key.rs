/*
 * key.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Identity keys extracted from option fragments.
 */

use serde::Serialize;
use serde_json::Value;

/// The identity-relevant keys of one fragment or instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct KeyInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub subtype: Option<String>,
}

impl KeyInfo {
    /// Extract keys from a fragment, reading the subtype from `subtype_key`.
    ///
    /// Non-object fragments have no keys.
    pub fn from_fragment(fragment: &Value, subtype_key: &str) -> Self {
        let Some(map) = fragment.as_object() else {
            return Self::default();
        };
        Self {
            id: map.get("id").and_then(key_text),
            name: map.get("name").and_then(key_text),
            subtype: map.get(subtype_key).and_then(key_text),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }
}

/// Convert a key value to text.
///
/// Strings are used as-is and numbers use their decimal form. `null`,
/// the empty string and every other shape count as absent.
pub fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
