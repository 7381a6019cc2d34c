//! Core type definitions for option merging.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default nesting limit for merges and materialization.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Merge operation for an incoming fragment.
///
/// Controls how an incoming fragment is combined with a stored option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOp {
    /// Recursive merge (the default).
    ///
    /// For objects: key-wise merge with the stored object
    /// For arrays: the incoming array replaces the stored one
    /// For scalars: the incoming value replaces the stored one
    #[default]
    Merge,

    /// Replace every top-level key of the incoming fragment wholesale.
    ///
    /// Nested objects are not merged: the stored subtree under a key the
    /// fragment mentions is discarded. Keys the fragment does not mention
    /// are kept.
    Replace,
}

/// Options controlling a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Merge operation applied at the root of the fragment.
    pub op: MergeOp,

    /// Maximum nesting depth (default: 256).
    ///
    /// Merging fails with `MergeError::NestingTooDeep` when the incoming
    /// fragment nests deeper than this.
    pub max_depth: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            op: MergeOp::Merge,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl MergeOptions {
    /// Options for a replacing merge with the default depth limit.
    pub fn replace() -> Self {
        Self {
            op: MergeOp::Replace,
            ..Self::default()
        }
    }

    /// Set the merge operation.
    pub fn with_op(mut self, op: MergeOp) -> Self {
        self.op = op;
        self
    }

    /// Set the depth limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Errors that can occur during merge operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// Option nesting exceeds maximum depth.
    #[error("Option nesting too deep (max depth: {max_depth}) at path: {}", path.join("."))]
    NestingTooDeep {
        /// Maximum allowed depth
        max_depth: usize,
        /// Path where the limit was exceeded
        path: Vec<String>,
    },
}

/// Normalize a kind entry to a list of fragments.
///
/// Arrays are returned as-is, `null` becomes an empty list and any other
/// value becomes a one-element list.
pub fn normalize_to_array(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Name of a value's JSON type, for diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_op_default() {
        assert_eq!(MergeOp::default(), MergeOp::Merge);
        assert_eq!(MergeOptions::default().max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_options_builders() {
        let options = MergeOptions::replace().with_max_depth(8);
        assert_eq!(options.op, MergeOp::Replace);
        assert_eq!(options.max_depth, 8);
        assert_eq!(MergeOptions::default().with_op(MergeOp::Replace), MergeOptions::replace());
    }

    #[test]
    fn test_normalize_to_array() {
        let list = json!([{"a": 1}, {"b": 2}]);
        assert_eq!(normalize_to_array(&list).len(), 2);
        assert!(normalize_to_array(&Value::Null).is_empty());

        let single = json!({"a": 1});
        let normalized = normalize_to_array(&single);
        assert_eq!(normalized, vec![&single]);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: MergeOptions = serde_json::from_value(json!({"op": "replace"})).unwrap();
        assert_eq!(options.op, MergeOp::Replace);
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_nesting_error_display() {
        let error = MergeError::NestingTooDeep {
            max_depth: 2,
            path: vec!["series".into(), "label".into()],
        };
        insta::assert_snapshot!(error.to_string(), @"Option nesting too deep (max depth: 2) at path: series.label");
    }
}
