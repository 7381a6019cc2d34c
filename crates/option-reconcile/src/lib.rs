//! Option reconciliation for declarative chart components.
//!
//! A chart is described by option documents: a mapping from component
//! kinds (`series`, `xAxis`, `legend`, ...) to lists of fragments, plus
//! optional timeline frames and media-query fragments. Each call to
//! [`Reconciler::apply_option`] composes the document for the current
//! timeline position and viewport, matches the fragments of every kind
//! against the instances created by earlier calls, and merges, creates or
//! destroys instances so that identity survives across updates.
//!
//! The work is split into small pure stages:
//!
//! 1. [`parse_document`] splits a raw document into base, frames and media
//! 2. [`compose_timeline_frame`] and [`compose_media_fragment`] overlay the
//!    selected frame and media fragment onto the base
//! 3. [`compute_match`] pairs fragments with existing instances
//! 4. The [`Reconciler`] applies the resulting plans to its instance arena
//!
//! # Example
//!
//! ```rust
//! use option_reconcile::{KindSpec, Reconciler, Registry, UpdateFlags, Viewport};
//! use serde_json::json;
//!
//! let registry = Registry::new().with_kind(KindSpec::new("series"));
//! let mut reconciler = Reconciler::new(registry, Viewport::new(800.0, 600.0));
//!
//! reconciler
//!     .apply_option(&json!({"series": [{"id": "a", "type": "line", "data": [1]}]}), &UpdateFlags::merge())
//!     .unwrap();
//! let (handle, _) = reconciler.find_by_id("series", "a").unwrap();
//!
//! reconciler
//!     .apply_option(&json!({"series": [{"id": "a", "data": [2]}]}), &UpdateFlags::merge())
//!     .unwrap();
//! let instance = reconciler.instance(handle).unwrap();
//! assert_eq!(instance.option, json!({"id": "a", "type": "line", "data": [2]}));
//! ```

pub mod compose;
pub mod config;
pub mod document;
pub mod error;
pub mod instance;
pub mod key;
pub mod lookup;
pub mod matcher;
pub mod media;
pub mod query;
pub mod reconciler;
pub mod registry;
pub mod report;
pub mod timeline;

pub use compose::{ComposedDocument, ComposedFragment, Composer};
pub use config::{MergeContext, ReconcilerConfig, UpdateFlags};
pub use document::{ParsedDocument, parse_document};
pub use error::{ComponentError, ReconcileError, Result};
pub use instance::{ComponentInstance, InstanceArena, InstanceHandle, ViewKey};
pub use key::KeyInfo;
pub use lookup::{ComponentQuery, Selector};
pub use matcher::{MatchMode, MatchPlan, MatchStats, MatchedBy, SlotAlignment, compute_match};
pub use media::{MediaEntry, MediaSelection, compose_media_fragment, select_media};
pub use query::{Bound, Condition, Dimension, MediaQuery, Viewport};
pub use reconciler::Reconciler;
pub use registry::{ComponentFactory, KindSpec, Registry};
pub use report::{ApplyReport, CreatedInstance, DestroyedInstance, KeptInstance};
pub use timeline::{TimelineSettings, TimelineState, compose_timeline_frame, select_frame};
