//! Cursor-based navigation over layered options.
//!
//! This module provides lazy, zero-copy lookup across several option
//! layers with the same semantics as [`merge`](crate::merge):
//!
//! - `OptionLayers<'a>` holds borrowed references to the layers
//! - `LayerCursor<'a>` provides path-based navigation without copying
//! - Resolution happens lazily when `as_*()` methods are called
//! - A non-object value in a higher layer shadows everything below it,
//!   objects combine key-wise
//!
//! # Example
//!
//! ```rust
//! use option_merge::OptionLayers;
//! use serde_json::json;
//!
//! let base = json!({"timeline": {"currentIndex": 0, "loop": false}});
//! let frame = json!({"timeline": {"currentIndex": 2}});
//! let layers = OptionLayers::new(vec![&base, &frame]);
//!
//! let index = layers.cursor().at("timeline").at("currentIndex").as_leaf().unwrap();
//! assert_eq!(index.value, &json!(2));
//! assert_eq!(index.layer_index, 1);
//! ```

use indexmap::IndexMap;
use serde_json::Value;

/// A lazily-evaluated stack of option layers.
///
/// The lifetime parameter `'a` indicates that `OptionLayers` borrows from
/// existing values. Construction never copies.
#[derive(Debug, Clone)]
pub struct OptionLayers<'a> {
    /// Ordered list of layers (first = lowest priority, last = highest)
    layers: Vec<&'a Value>,
}

/// A cursor for navigating layered options.
///
/// The cursor stores a reference to the layers and a path. Resolution
/// happens when one of the `as_*()` methods is called.
#[derive(Debug, Clone)]
pub struct LayerCursor<'a> {
    layers: &'a OptionLayers<'a>,
    path: Vec<String>,
}

/// A resolved non-object value with the layer it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredLeaf<'a> {
    /// The resolved value (scalar or array)
    pub value: &'a Value,
    /// Which layer this value came from (index into layers)
    pub layer_index: usize,
}

/// A resolved object, combined key-wise from every contributing layer.
#[derive(Debug, Clone)]
pub struct LayeredMap<'a> {
    layers: &'a OptionLayers<'a>,
    path: Vec<String>,
    keys: Vec<String>,
}

/// A resolved value of any shape.
#[derive(Debug, Clone)]
pub enum LayeredValue<'a> {
    Leaf(LayeredLeaf<'a>),
    Map(LayeredMap<'a>),
}

impl<'a> OptionLayers<'a> {
    /// Create layered options, first = lowest priority.
    pub fn new(layers: Vec<&'a Value>) -> Self {
        OptionLayers { layers }
    }

    /// Get a cursor at the root.
    pub fn cursor(&'a self) -> LayerCursor<'a> {
        LayerCursor {
            layers: self,
            path: Vec::new(),
        }
    }
}

impl<'a> LayerCursor<'a> {
    /// Navigate to a child key.
    ///
    /// The cursor is valid even if the path doesn't exist; resolution
    /// returns `None` in that case.
    pub fn at(&self, key: &str) -> LayerCursor<'a> {
        let mut path = self.path.clone();
        path.push(key.to_string());
        LayerCursor {
            layers: self.layers,
            path,
        }
    }

    /// Child keys at this path, in first-seen order.
    ///
    /// Only layers after the last non-object value at this path contribute.
    fn keys(&self) -> Vec<String> {
        let mut seen: IndexMap<&str, ()> = IndexMap::new();
        for (_, value) in self.contributions() {
            match value {
                Value::Object(map) => {
                    for key in map.keys() {
                        seen.entry(key.as_str()).or_insert(());
                    }
                }
                _ => seen.clear(),
            }
        }
        seen.into_keys().map(str::to_string).collect()
    }

    /// Resolve as any value shape.
    pub fn as_value(&self) -> Option<LayeredValue<'a>> {
        let contributions = self.contributions();
        let (layer_index, top) = *contributions.last()?;
        if top.is_object() {
            self.as_map().map(LayeredValue::Map)
        } else {
            Some(LayeredValue::Leaf(LayeredLeaf {
                value: top,
                layer_index,
            }))
        }
    }

    /// Resolve as a non-object value (last wins).
    pub fn as_leaf(&self) -> Option<LayeredLeaf<'a>> {
        match self.as_value()? {
            LayeredValue::Leaf(leaf) => Some(leaf),
            LayeredValue::Map(_) => None,
        }
    }

    /// Resolve as an object view.
    fn as_map(&self) -> Option<LayeredMap<'a>> {
        let contributions = self.contributions();
        let (_, top) = contributions.last()?;
        if !top.is_object() {
            return None;
        }
        Some(LayeredMap {
            layers: self.layers,
            path: self.path.clone(),
            keys: self.keys(),
        })
    }

    /// Values at this path in each layer that is not shadowed.
    ///
    /// A layer holding a non-object at a strict prefix of the path shadows
    /// all lower layers: merging it would have replaced their subtrees.
    fn contributions(&self) -> Vec<(usize, &'a Value)> {
        let mut found = Vec::new();
        for (layer_index, layer) in self.layers.layers.iter().enumerate() {
            match navigate(layer, &self.path) {
                Navigation::Found(value) => found.push((layer_index, value)),
                Navigation::Shadowed => found.clear(),
                Navigation::Missing => {}
            }
        }
        found
    }
}

enum Navigation<'a> {
    Found(&'a Value),
    Missing,
    Shadowed,
}

/// Navigate to a path within a single layer.
fn navigate<'a>(root: &'a Value, path: &[String]) -> Navigation<'a> {
    let mut current = root;
    for key in path {
        match current {
            Value::Object(map) => match map.get(key) {
                Some(child) => current = child,
                None => return Navigation::Missing,
            },
            _ => return Navigation::Shadowed,
        }
    }
    Navigation::Found(current)
}

impl<'a> LayeredMap<'a> {
    /// Get a cursor for a specific key.
    pub fn get(&self, key: &str) -> Option<LayerCursor<'a>> {
        if self.contains_key(key) {
            let mut path = self.path.clone();
            path.push(key.to_string());
            Some(LayerCursor {
                layers: self.layers,
                path,
            })
        } else {
            None
        }
    }

    /// Check if the map contains a key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}
