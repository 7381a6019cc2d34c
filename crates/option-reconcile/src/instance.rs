/*
 * instance.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Component instances and the arena that owns them.
 */

use crate::key::KeyInfo;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Opaque, stale-detecting reference to an instance in the arena.
///
/// A slot's revision changes every time its instance is destroyed, so a
/// handle to a destroyed instance never resolves again, even after the
/// slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InstanceHandle {
    slot: usize,
    revision: u32,
}

impl InstanceHandle {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.revision)
    }
}

/// Key a view binder uses to reuse render objects across instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKey {
    /// The instance carries a user id.
    Id(String),
    /// No user id: the name (if any) plus an ordinal among same-named
    /// id-less instances, or the slot position for unnamed ones.
    Derived { name: Option<String>, ordinal: usize },
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewKey::Id(id) => write!(f, "id:{id}"),
            ViewKey::Derived {
                name: Some(name),
                ordinal,
            } => write!(f, "name:{name}#{ordinal}"),
            ViewKey::Derived { name: None, ordinal } => write!(f, "#{ordinal}"),
        }
    }
}

/// The durable unit of identity: one component of one kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentInstance {
    pub kind: String,
    /// Empty when neither the fragments nor the factory name a subtype.
    pub subtype: String,
    pub id: Option<String>,
    pub name: Option<String>,
    /// Index within the kind's list when the instance was created.
    pub positional_index: usize,
    /// Accumulated base fragments plus the current composition overlay.
    pub option: Value,
    /// Accumulated base fragments only.
    pub base_option: Value,
    /// Incremented whenever `option` or `base_option` changes.
    pub generation: u64,
    pub view_key: ViewKey,
    /// Created by a replace-merge pass; must not inherit an older view.
    pub requires_new_view: bool,
    /// Only timeline frames or media fragments have contributed to this
    /// instance. It is destroyed once no overlay matches it.
    pub overlay_only: bool,
}

impl ComponentInstance {
    /// Identity keys used for matching.
    pub fn keys(&self) -> KeyInfo {
        KeyInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            subtype: (!self.subtype.is_empty()).then(|| self.subtype.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Entry {
    revision: u32,
    instance: Option<ComponentInstance>,
}

/// Slot storage for instances, addressed by `InstanceHandle`.
#[derive(Debug, Clone, Default)]
pub struct InstanceArena {
    entries: Vec<Entry>,
    free: Vec<usize>,
    live: usize,
}

impl InstanceArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an instance, reusing a free slot when there is one.
    pub fn insert(&mut self, instance: ComponentInstance) -> InstanceHandle {
        self.live += 1;
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.entries[slot];
            entry.instance = Some(instance);
            return InstanceHandle {
                slot,
                revision: entry.revision,
            };
        }
        self.entries.push(Entry {
            revision: 0,
            instance: Some(instance),
        });
        InstanceHandle {
            slot: self.entries.len() - 1,
            revision: 0,
        }
    }

    pub fn get(&self, handle: InstanceHandle) -> Option<&ComponentInstance> {
        let entry = self.entries.get(handle.slot)?;
        if entry.revision != handle.revision {
            return None;
        }
        entry.instance.as_ref()
    }

    pub fn get_mut(&mut self, handle: InstanceHandle) -> Option<&mut ComponentInstance> {
        let entry = self.entries.get_mut(handle.slot)?;
        if entry.revision != handle.revision {
            return None;
        }
        entry.instance.as_mut()
    }

    /// Destroy an instance. Every handle to it becomes stale.
    pub fn remove(&mut self, handle: InstanceHandle) -> Option<ComponentInstance> {
        let entry = self.entries.get_mut(handle.slot)?;
        if entry.revision != handle.revision {
            return None;
        }
        let instance = entry.instance.take()?;
        entry.revision = entry.revision.wrapping_add(1);
        self.free.push(handle.slot);
        self.live -= 1;
        Some(instance)
    }

    pub fn contains(&self, handle: InstanceHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceHandle, &ComponentInstance)> {
        self.entries.iter().enumerate().filter_map(|(slot, entry)| {
            entry.instance.as_ref().map(|instance| {
                (
                    InstanceHandle {
                        slot,
                        revision: entry.revision,
                    },
                    instance,
                )
            })
        })
    }
}
