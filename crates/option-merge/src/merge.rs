//! The merge engine.
//!
//! Merging is copy-on-merge: both inputs are borrowed and never mutated,
//! and the result is a freshly built value. Any holder of a previously
//! stored option keeps a valid, unchanged value after a merge.
//!
//! # Semantics
//!
//! | stored  | incoming | result (`MergeOp::Merge`)          |
//! |---------|----------|------------------------------------|
//! | object  | object   | key-wise merge, recursively        |
//! | any     | array    | incoming array (no element merge)  |
//! | any     | scalar   | incoming scalar (`null` included)  |
//!
//! Keys present only in the stored object are kept. There is no erase
//! signal: omitting a key never deletes it.

use crate::types::{MergeError, MergeOp, MergeOptions};
use serde_json::{Map, Value};

/// Merge `incoming` onto `stored`, producing a new value.
///
/// # Errors
///
/// Returns `MergeError::NestingTooDeep` if the incoming fragment nests
/// deeper than `options.max_depth`.
///
/// # Example
///
/// ```rust
/// use option_merge::{merge, MergeOptions};
/// use serde_json::json;
///
/// let stored = json!({"a": {"x": 1, "y": 2}, "list": [1, 2, 3]});
/// let incoming = json!({"a": {"x": 9}, "list": [9]});
/// let merged = merge(&stored, &incoming, &MergeOptions::default()).unwrap();
/// assert_eq!(merged, json!({"a": {"x": 9, "y": 2}, "list": [9]}));
/// ```
pub fn merge(stored: &Value, incoming: &Value, options: &MergeOptions) -> Result<Value, MergeError> {
    let mut path = Vec::new();
    match options.op {
        MergeOp::Merge => merge_value(stored, incoming, 0, options, &mut path),
        MergeOp::Replace => replace_top_level(stored, incoming, options, &mut path),
    }
}

/// Fold several fragments with `merge`, first = lowest priority.
///
/// Returns `Value::Null` when `layers` is empty.
pub fn merge_all(layers: &[&Value], options: &MergeOptions) -> Result<Value, MergeError> {
    let mut iter = layers.iter();
    let Some(first) = iter.next() else {
        return Ok(Value::Null);
    };

    let mut path = Vec::new();
    check_depth(first, 0, options, &mut path)?;
    let mut result = (*first).clone();
    for layer in iter {
        result = merge(&result, layer, options)?;
    }
    Ok(result)
}

fn merge_value(
    stored: &Value,
    incoming: &Value,
    depth: usize,
    options: &MergeOptions,
    path: &mut Vec<String>,
) -> Result<Value, MergeError> {
    if depth > options.max_depth {
        return Err(too_deep(options, path));
    }

    match (stored, incoming) {
        (Value::Object(stored_map), Value::Object(incoming_map)) => {
            let mut result = Map::new();

            // Stored keys first, in their original order
            for (key, stored_child) in stored_map {
                let child = match incoming_map.get(key) {
                    Some(incoming_child) => {
                        path.push(key.clone());
                        let merged =
                            merge_value(stored_child, incoming_child, depth + 1, options, path)?;
                        path.pop();
                        merged
                    }
                    None => stored_child.clone(),
                };
                result.insert(key.clone(), child);
            }

            // Then keys only the incoming fragment declares
            for (key, incoming_child) in incoming_map {
                if stored_map.contains_key(key) {
                    continue;
                }
                path.push(key.clone());
                check_depth(incoming_child, depth + 1, options, path)?;
                path.pop();
                result.insert(key.clone(), incoming_child.clone());
            }

            Ok(Value::Object(result))
        }
        (_, other) => {
            check_depth(other, depth, options, path)?;
            Ok(other.clone())
        }
    }
}

fn replace_top_level(
    stored: &Value,
    incoming: &Value,
    options: &MergeOptions,
    path: &mut Vec<String>,
) -> Result<Value, MergeError> {
    match (stored, incoming) {
        (Value::Object(stored_map), Value::Object(incoming_map)) => {
            let mut result = stored_map.clone();
            for (key, incoming_child) in incoming_map {
                path.push(key.clone());
                check_depth(incoming_child, 1, options, path)?;
                path.pop();
                result.insert(key.clone(), incoming_child.clone());
            }
            Ok(Value::Object(result))
        }
        (_, other) => {
            check_depth(other, 0, options, path)?;
            Ok(other.clone())
        }
    }
}

/// Verify that `value`, found at `depth`, stays within the depth limit.
fn check_depth(
    value: &Value,
    depth: usize,
    options: &MergeOptions,
    path: &mut Vec<String>,
) -> Result<(), MergeError> {
    if depth > options.max_depth {
        return Err(too_deep(options, path));
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                path.push(key.clone());
                check_depth(child, depth + 1, options, path)?;
                path.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                path.push(index.to_string());
                check_depth(child, depth + 1, options, path)?;
                path.pop();
            }
        }
        _ => {}
    }
    Ok(())
}

fn too_deep(options: &MergeOptions, path: &[String]) -> MergeError {
    MergeError::NestingTooDeep {
        max_depth: options.max_depth,
        path: path.to_vec(),
    }
}
