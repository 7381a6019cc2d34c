/*
 * lookup.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Component lookups by index, id, name and subtype.
 */

use crate::instance::{ComponentInstance, InstanceArena, InstanceHandle};
use serde::{Deserialize, Serialize};

/// Which instances of a kind a query selects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Selector {
    /// Every live instance.
    #[default]
    All,
    /// Slots by index, in the order given. Holes and out-of-range indices
    /// select nothing.
    Index(Vec<usize>),
    Id(Vec<String>),
    Name(Vec<String>),
}

/// A lookup over the instances of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentQuery {
    pub kind: String,
    #[serde(default)]
    pub selector: Selector,
    /// Keep only instances of this subtype.
    #[serde(default)]
    pub subtype: Option<String>,
}

impl ComponentQuery {
    pub fn all(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            selector: Selector::All,
            subtype: None,
        }
    }

    pub fn by_index(kind: impl Into<String>, indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            selector: Selector::Index(indices.into_iter().collect()),
            ..Self::all(kind)
        }
    }

    pub fn by_id<S: Into<String>>(kind: impl Into<String>, ids: impl IntoIterator<Item = S>) -> Self {
        Self {
            selector: Selector::Id(ids.into_iter().map(Into::into).collect()),
            ..Self::all(kind)
        }
    }

    pub fn by_name<S: Into<String>>(kind: impl Into<String>, names: impl IntoIterator<Item = S>) -> Self {
        Self {
            selector: Selector::Name(names.into_iter().map(Into::into).collect()),
            ..Self::all(kind)
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    /// Run the query over the slots of `self.kind`.
    ///
    /// Index selections come back in the order of the index list; every
    /// other selection in slot order.
    pub fn select<'a>(
        &self,
        slots: &[Option<InstanceHandle>],
        arena: &'a InstanceArena,
    ) -> Vec<(InstanceHandle, &'a ComponentInstance)> {
        let resolve = |handle: &InstanceHandle| arena.get(*handle).map(|instance| (*handle, instance));
        let selected: Vec<_> = match &self.selector {
            Selector::Index(indices) => indices
                .iter()
                .filter_map(|idx| slots.get(*idx).copied().flatten())
                .filter_map(|handle| resolve(&handle))
                .collect(),
            Selector::Id(ids) => live(slots, arena)
                .filter(|(_, instance)| instance.id.as_ref().is_some_and(|id| ids.contains(id)))
                .collect(),
            Selector::Name(names) => live(slots, arena)
                .filter(|(_, instance)| instance.name.as_ref().is_some_and(|name| names.contains(name)))
                .collect(),
            Selector::All => live(slots, arena).collect(),
        };

        match &self.subtype {
            Some(subtype) => selected
                .into_iter()
                .filter(|(_, instance)| &instance.subtype == subtype)
                .collect(),
            None => selected,
        }
    }
}

/// The instance in slot `index`. Without an index the first slot is used,
/// falling back to the first live instance when that slot is a hole.
pub fn component_at<'a>(
    slots: &[Option<InstanceHandle>],
    arena: &'a InstanceArena,
    index: Option<usize>,
) -> Option<(InstanceHandle, &'a ComponentInstance)> {
    let at = |idx: usize| {
        let handle = slots.get(idx).copied().flatten()?;
        arena.get(handle).map(|instance| (handle, instance))
    };
    match index {
        Some(idx) => at(idx),
        None => at(0).or_else(|| live(slots, arena).next()),
    }
}

fn live<'s, 'a>(
    slots: &'s [Option<InstanceHandle>],
    arena: &'a InstanceArena,
) -> impl Iterator<Item = (InstanceHandle, &'a ComponentInstance)> {
    slots
        .iter()
        .flatten()
        .filter_map(move |handle| arena.get(*handle).map(|instance| (*handle, instance)))
}
