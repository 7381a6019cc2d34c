/*
 * compute.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Compute phase of identity matching.
 *
 * This module pairs the new fragments of one kind with the instances that
 * already exist for it. The result is a MatchPlan; nothing is mutated.
 */

use super::types::{MatchMode, MatchPlan, MatchStats, MatchedBy, SlotAlignment};
use crate::key::KeyInfo;
use rustc_hash::FxHashMap;

/// Compute the identity plan for one kind.
///
/// `existing` lists the keys of the current slots in order, with `None`
/// for a hole left by an earlier removal, and `incoming` the keys of the
/// new fragments in list order. The function is pure and total: every
/// incoming fragment lands in exactly one slot and every existing instance
/// is either placed at its own index or removed.
pub fn compute_match(
    existing: &[Option<KeyInfo>],
    incoming: &[KeyInfo],
    mode: MatchMode,
) -> MatchPlan {
    if existing.is_empty() && incoming.is_empty() {
        return MatchPlan::new();
    }
    if mode == MatchMode::Rebuild {
        return rebuild(existing, incoming.len());
    }

    let mut bindings = Bindings::new(existing.len(), incoming.len());

    // Step 1: explicit ids
    let mut by_id: FxHashMap<&str, usize> = FxHashMap::default();
    for (idx, keys) in existing.iter().enumerate() {
        if let Some(id) = keys.as_ref().and_then(|keys| keys.id.as_deref()) {
            by_id.entry(id).or_insert(idx);
        }
    }
    for (inc_idx, keys) in incoming.iter().enumerate() {
        let Some(id) = keys.id.as_deref() else {
            continue;
        };
        if let Some(&ex_idx) = by_id.get(id)
            && bindings.existing_free(ex_idx)
        {
            bindings.bind(ex_idx, inc_idx, MatchedBy::Id);
        }
    }

    if mode == MatchMode::Normal {
        // Step 2: names, unless both sides carry ids
        for (inc_idx, keys) in incoming.iter().enumerate() {
            if !bindings.incoming_free(inc_idx) {
                continue;
            }
            let Some(name) = keys.name.as_deref() else {
                continue;
            };
            let found = existing.iter().enumerate().position(|(ex_idx, ex)| {
                ex.as_ref().is_some_and(|ex| {
                    bindings.existing_free(ex_idx)
                        && ex.name.as_deref() == Some(name)
                        && (ex.id.is_none() || keys.id.is_none())
                })
            });
            if let Some(ex_idx) = found {
                bindings.bind(ex_idx, inc_idx, MatchedBy::Name);
            }
        }

        // Step 3: position, for fragments without an id. The cursor stops
        // at holes too; a fragment bound to a hole is created there.
        let mut cursor = 0;
        for (inc_idx, keys) in incoming.iter().enumerate() {
            if !bindings.incoming_free(inc_idx) || keys.id.is_some() {
                continue;
            }
            while cursor < existing.len() && !bindings.existing_free(cursor) {
                cursor += 1;
            }
            if cursor < existing.len() {
                bindings.bind(cursor, inc_idx, MatchedBy::Position);
                cursor += 1;
            }
        }
    }

    build_plan(existing, incoming, mode, &bindings)
}

fn rebuild(existing: &[Option<KeyInfo>], incoming: usize) -> MatchPlan {
    let removed: Vec<usize> = live_indices(existing).collect();
    MatchPlan {
        alignments: (0..incoming)
            .map(|incoming| SlotAlignment::Create {
                incoming,
                brand_new: false,
            })
            .collect(),
        stats: MatchStats {
            created: incoming,
            removed: removed.len(),
            ..MatchStats::default()
        },
        removed,
    }
}

fn live_indices(existing: &[Option<KeyInfo>]) -> impl Iterator<Item = usize> + '_ {
    existing
        .iter()
        .enumerate()
        .filter(|(_, keys)| keys.is_some())
        .map(|(idx, _)| idx)
}

/// Pairing state shared by the matching steps.
struct Bindings {
    /// For each existing slot: the bound fragment and the rule used.
    existing: Vec<Option<(usize, MatchedBy)>>,
    incoming_bound: Vec<bool>,
}

impl Bindings {
    fn new(existing: usize, incoming: usize) -> Self {
        Self {
            existing: vec![None; existing],
            incoming_bound: vec![false; incoming],
        }
    }

    fn existing_free(&self, ex_idx: usize) -> bool {
        self.existing[ex_idx].is_none()
    }

    fn incoming_free(&self, inc_idx: usize) -> bool {
        !self.incoming_bound[inc_idx]
    }

    fn bind(&mut self, ex_idx: usize, inc_idx: usize, matched_by: MatchedBy) {
        self.existing[ex_idx] = Some((inc_idx, matched_by));
        self.incoming_bound[inc_idx] = true;
    }
}

fn build_plan(
    existing: &[Option<KeyInfo>],
    incoming: &[KeyInfo],
    mode: MatchMode,
    bindings: &Bindings,
) -> MatchPlan {
    let mut stats = MatchStats::default();
    let brand_new = mode == MatchMode::ReplaceMerge;

    // One entry per existing slot; None marks a hole
    let mut slots: Vec<Option<SlotAlignment>> = Vec::with_capacity(existing.len());
    let mut removed = Vec::new();

    for (ex_idx, (keys, binding)) in existing.iter().zip(&bindings.existing).enumerate() {
        match (keys, binding) {
            (None, Some((inc_idx, _))) => {
                stats.created += 1;
                slots.push(Some(SlotAlignment::Create {
                    incoming: *inc_idx,
                    brand_new,
                }));
            }
            (None, None) => slots.push(None),
            (Some(keys), Some((inc_idx, matched_by))) => {
                match matched_by {
                    MatchedBy::Id => stats.by_id += 1,
                    MatchedBy::Name => stats.by_name += 1,
                    MatchedBy::Position => stats.by_position += 1,
                }
                if subtype_changed(keys, &incoming[*inc_idx]) {
                    stats.retyped += 1;
                    slots.push(Some(SlotAlignment::Retype {
                        existing: ex_idx,
                        incoming: *inc_idx,
                        matched_by: *matched_by,
                    }));
                } else {
                    stats.updated += 1;
                    slots.push(Some(SlotAlignment::Update {
                        existing: ex_idx,
                        incoming: *inc_idx,
                        matched_by: *matched_by,
                    }));
                }
            }
            (Some(_), None) if mode == MatchMode::ReplaceMerge => {
                stats.removed += 1;
                removed.push(ex_idx);
                slots.push(None);
            }
            (Some(_), None) => {
                stats.retained += 1;
                slots.push(Some(SlotAlignment::Retain { existing: ex_idx }));
            }
        }
    }

    // Unbound fragments fill holes in order, then append
    let mut holes = slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_none())
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>()
        .into_iter();
    for inc_idx in 0..incoming.len() {
        if !bindings.incoming_free(inc_idx) {
            continue;
        }
        stats.created += 1;
        let create = SlotAlignment::Create {
            incoming: inc_idx,
            brand_new,
        };
        match holes.next() {
            Some(hole) => slots[hole] = Some(create),
            None => slots.push(Some(create)),
        }
    }

    while slots.last().is_some_and(Option::is_none) {
        slots.pop();
    }

    MatchPlan {
        alignments: slots
            .into_iter()
            .map(|slot| slot.unwrap_or(SlotAlignment::Hole))
            .collect(),
        removed,
        stats,
    }
}

/// A fragment without a subtype is compatible with any instance.
fn subtype_changed(existing: &KeyInfo, incoming: &KeyInfo) -> bool {
    match (&existing.subtype, &incoming.subtype) {
        (Some(old), Some(new)) => old != new,
        _ => false,
    }
}
