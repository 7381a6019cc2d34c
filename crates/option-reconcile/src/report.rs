/*
 * report.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Per-call reconciliation reports.
 */

use crate::instance::{InstanceHandle, ViewKey};
use crate::matcher::MatchStats;
use crate::media::MediaSelection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedInstance {
    pub kind: String,
    pub handle: InstanceHandle,
    pub view_key: ViewKey,
    pub subtype: String,
    pub requires_new_view: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestroyedInstance {
    pub kind: String,
    pub handle: InstanceHandle,
    pub view_key: ViewKey,
}

/// An instance that existed before the call and survives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeptInstance {
    pub kind: String,
    pub handle: InstanceHandle,
    pub view_key: ViewKey,
    /// Whether the stored option changed during the call.
    pub changed: bool,
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub created: Vec<CreatedInstance>,
    pub destroyed: Vec<DestroyedInstance>,
    pub kept: Vec<KeptInstance>,
    pub stats: MatchStats,
    pub media_selection: MediaSelection,
    /// Index of the applied timeline frame, if any.
    pub timeline_index: Option<usize>,
}

impl ApplyReport {
    /// True when no instance was created, destroyed or changed.
    pub fn is_unchanged(&self) -> bool {
        self.created.is_empty() && self.destroyed.is_empty() && self.kept.iter().all(|k| !k.changed)
    }

    /// Handles created for `kind`, in slot order.
    pub fn created_in(&self, kind: &str) -> Vec<InstanceHandle> {
        self.created
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.handle)
            .collect()
    }

    /// Handles destroyed for `kind`.
    pub fn destroyed_in(&self, kind: &str) -> Vec<InstanceHandle> {
        self.destroyed
            .iter()
            .filter(|d| d.kind == kind)
            .map(|d| d.handle)
            .collect()
    }
}
