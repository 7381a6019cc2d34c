//! Option merging for the reconciliation engine.
//!
//! This crate provides the merge engine used to combine user-supplied
//! option fragments with previously stored options, plus a zero-copy
//! layered view for reading through several fragments at once.
//!
//! # Key Features
//!
//! - **Copy-on-merge**: inputs are borrowed, results are new values
//! - **Explicit merge semantics**: objects merge key-wise, arrays and scalars replace
//! - **Replace escape hatch**: [`MergeOp::Replace`] replaces whole subtrees
//! - **Depth limiting**: merges fail cleanly on pathological nesting
//!
//! # Example
//!
//! ```rust
//! use option_merge::{merge, MergeOptions};
//! use serde_json::json;
//!
//! let stored = json!({"label": {"show": true, "color": "red"}});
//! let incoming = json!({"label": {"show": false}});
//!
//! let merged = merge(&stored, &incoming, &MergeOptions::default()).unwrap();
//! assert_eq!(merged, json!({"label": {"show": false, "color": "red"}}));
//! ```

mod layers;
mod merge;
mod types;

pub use types::{
    DEFAULT_MAX_DEPTH,
    MergeError,
    MergeOp,
    MergeOptions,
    normalize_to_array,
    type_name,
};

pub use merge::{merge, merge_all};

pub use layers::{
    LayerCursor,
    LayeredLeaf,
    LayeredMap,
    LayeredValue,
    OptionLayers,
};
