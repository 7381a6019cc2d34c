/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Engine configuration and per-call update flags.
 */

use crate::matcher::MatchMode;
use crate::registry::Registry;
use indexmap::IndexSet;
use option_merge::{MergeOp, MergeOptions};
use serde::{Deserialize, Serialize};

/// Engine-wide settings, fixed for the lifetime of a `Reconciler`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Fragment field holding the component subtype (default: `type`).
    pub subtype_key: String,

    /// Base merge options; the operation is overridden per kind.
    pub merge: MergeOptions,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            subtype_key: "type".to_string(),
            merge: MergeOptions::default(),
        }
    }
}

/// Flags supplied with each `apply_option` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateFlags {
    /// Discard every existing instance and stored composition state.
    #[serde(alias = "not_merge")]
    pub not_merge: bool,

    /// Kinds whose instances are matched by id only; unmatched ones are removed.
    #[serde(alias = "replace_merge")]
    pub replace_merge: Vec<String>,
}

impl UpdateFlags {
    /// Identity-preserving merge (the default).
    pub fn merge() -> Self {
        Self::default()
    }

    /// Rebuild everything from the submitted document.
    pub fn not_merge() -> Self {
        Self {
            not_merge: true,
            ..Self::default()
        }
    }

    /// Add kinds to the replace-merge set.
    pub fn with_replace_merge<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace_merge.extend(kinds.into_iter().map(Into::into));
        self
    }
}

/// Resolved merge behavior for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeContext {
    pub not_merge: bool,
    pub replace_merge: IndexSet<String>,
}

impl MergeContext {
    /// Resolve flags against the registry.
    ///
    /// Kinds named in `replace_merge` that are not registered are ignored.
    pub fn from_flags(flags: &UpdateFlags, registry: &Registry) -> Self {
        let mut replace_merge = IndexSet::new();
        for kind in &flags.replace_merge {
            if registry.contains(kind) {
                replace_merge.insert(kind.clone());
            } else {
                tracing::warn!(kind = %kind, "Ignoring unregistered kind in replaceMerge");
            }
        }
        Self {
            not_merge: flags.not_merge,
            replace_merge,
        }
    }

    /// Whether `kind` is merged in replace mode.
    pub fn is_replace(&self, kind: &str) -> bool {
        self.replace_merge.contains(kind)
    }

    /// Identity matching mode for `kind`.
    pub fn match_mode(&self, kind: &str) -> MatchMode {
        if self.not_merge {
            MatchMode::Rebuild
        } else if self.is_replace(kind) {
            MatchMode::ReplaceMerge
        } else {
            MatchMode::Normal
        }
    }

    /// Merge options for fragments of `kind`.
    pub fn merge_options(&self, kind: &str, base: &MergeOptions) -> MergeOptions {
        let op = if self.is_replace(kind) {
            MergeOp::Replace
        } else {
            MergeOp::Merge
        };
        base.clone().with_op(op)
    }
}
