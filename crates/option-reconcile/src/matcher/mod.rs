/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Identity matching.
 *
 * Matching decides, for one component kind, which new fragment continues
 * which existing instance. It is split like the rest of reconciliation:
 * compute_match produces a MatchPlan, and the reconciler applies it to the
 * instance arena.
 */

mod compute;
mod types;

pub use compute::compute_match;
pub use types::{MatchMode, MatchPlan, MatchStats, MatchedBy, SlotAlignment};
