/*
 * types.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Types for identity match plans.
 */

use serde::{Deserialize, Serialize};

/// How existing instances of a kind are matched against new fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Match by id, then name, then position. Unbound instances are retained.
    #[default]
    Normal,
    /// Match by id only. Unbound instances are removed and their slots
    /// are filled by new instances.
    ReplaceMerge,
    /// Discard every existing instance and create one per fragment.
    Rebuild,
}

/// The rule that bound a fragment to an existing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    Id,
    Name,
    Position,
}

/// Decision for one slot of the kind's resulting instance list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotAlignment {
    /// Keep the existing instance and merge the fragment into it.
    Update {
        existing: usize,
        incoming: usize,
        matched_by: MatchedBy,
    },

    /// The fragment matched an instance of a different subtype.
    /// Action: destroy the existing instance, create a new one in its slot.
    Retype {
        existing: usize,
        incoming: usize,
        matched_by: MatchedBy,
    },

    /// No existing instance matched the fragment.
    Create {
        incoming: usize,
        /// The instance must not inherit a view from an earlier instance.
        brand_new: bool,
    },

    /// No fragment matched the existing instance; keep it unchanged.
    Retain { existing: usize },

    /// An empty slot left by a removed instance. Keeps later instances at
    /// their positions.
    Hole,
}

impl SlotAlignment {
    /// Index of the incoming fragment placed in this slot, if any.
    pub fn incoming(&self) -> Option<usize> {
        match self {
            SlotAlignment::Update { incoming, .. }
            | SlotAlignment::Retype { incoming, .. }
            | SlotAlignment::Create { incoming, .. } => Some(*incoming),
            SlotAlignment::Retain { .. } | SlotAlignment::Hole => None,
        }
    }

    /// Index of the existing instance this slot starts from, if any.
    pub fn existing(&self) -> Option<usize> {
        match self {
            SlotAlignment::Update { existing, .. }
            | SlotAlignment::Retype { existing, .. }
            | SlotAlignment::Retain { existing } => Some(*existing),
            SlotAlignment::Create { .. } | SlotAlignment::Hole => None,
        }
    }
}

/// Counters describing a match plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    pub updated: usize,
    pub retyped: usize,
    pub created: usize,
    pub retained: usize,
    pub removed: usize,
    pub by_id: usize,
    pub by_name: usize,
    pub by_position: usize,
}

impl MatchStats {
    /// Merge another stats into this one.
    pub fn merge(&mut self, other: &MatchStats) {
        self.updated += other.updated;
        self.retyped += other.retyped;
        self.created += other.created;
        self.retained += other.retained;
        self.removed += other.removed;
        self.by_id += other.by_id;
        self.by_name += other.by_name;
        self.by_position += other.by_position;
    }
}

/// Complete identity plan for one component kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPlan {
    /// Decisions in final slot order. Existing instances that stay keep
    /// their slot index; trailing holes are dropped.
    pub alignments: Vec<SlotAlignment>,

    /// Existing instances that are dropped without a replacement in their slot.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub removed: Vec<usize>,

    pub stats: MatchStats,
}

impl MatchPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty() && self.removed.is_empty()
    }

    /// The alignment that places incoming fragment `incoming`, if any.
    pub fn slot_of_incoming(&self, incoming: usize) -> Option<&SlotAlignment> {
        self.alignments.iter().find(|a| a.incoming() == Some(incoming))
    }
}
