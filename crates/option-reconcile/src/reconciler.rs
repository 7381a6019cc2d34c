/*
 * reconciler.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The reconciliation pipeline: composition, identity matching, merging,
 * creation and destruction of component instances.
 */

use crate::compose::{ComposedDocument, ComposedFragment, Composer};
use crate::config::{MergeContext, ReconcilerConfig, UpdateFlags};
use crate::document::parse_document;
use crate::error::{ReconcileError, Result};
use crate::instance::{ComponentInstance, InstanceArena, InstanceHandle, ViewKey};
use crate::key::KeyInfo;
use crate::lookup::{ComponentQuery, component_at};
use crate::matcher::{SlotAlignment, compute_match};
use crate::media::{MediaEntry, select_media};
use crate::query::Viewport;
use crate::registry::{ComponentFactory, Registry};
use crate::report::{ApplyReport, CreatedInstance, DestroyedInstance, KeptInstance};
use crate::timeline::{TimelineState, select_frame};
use indexmap::{IndexMap, IndexSet};
use option_merge::{MergeOptions, merge, merge_all};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};

/// Everything a successful pass commits.
#[derive(Debug, Clone)]
struct State {
    arena: InstanceArena,
    /// Instance slots per kind. `None` is a hole left by a removal so
    /// later instances keep their index; trailing holes are dropped.
    kinds: IndexMap<String, Vec<Option<InstanceHandle>>>,
    globals_base: Value,
    globals: Value,
    timeline: TimelineState,
    media: Vec<MediaEntry>,
    /// Base option of the last submitted document.
    base: Option<Value>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            arena: InstanceArena::new(),
            kinds: IndexMap::new(),
            globals_base: Value::Object(Map::new()),
            globals: Value::Object(Map::new()),
            timeline: TimelineState::default(),
            media: Vec::new(),
            base: None,
        }
    }
}

impl State {
    /// Forget globals, timeline, media and the last document.
    fn reset_composition(&mut self) {
        let arena = std::mem::take(&mut self.arena);
        let kinds = std::mem::take(&mut self.kinds);
        *self = State {
            arena,
            kinds,
            ..State::default()
        };
    }
}

/// Owns the component instances of one chart and keeps them in step with
/// the option documents submitted to it.
///
/// Every operation either commits completely or, on error, leaves the
/// previous state untouched.
#[derive(Debug)]
pub struct Reconciler {
    registry: Registry,
    config: ReconcilerConfig,
    viewport: Viewport,
    state: State,
}

impl Reconciler {
    pub fn new(registry: Registry, viewport: Viewport) -> Self {
        Self {
            registry,
            config: ReconcilerConfig::default(),
            viewport,
            state: State::default(),
        }
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Reconcile the instance set against a new option document.
    ///
    /// # Errors
    ///
    /// Fails without changing any state when the document is not an
    /// object, declares a duplicate id within a kind, names a subtype its
    /// factory does not provide, nests too deeply, or when a factory
    /// rejects a stored option.
    pub fn apply_option(&mut self, document: &Value, flags: &UpdateFlags) -> Result<ApplyReport> {
        let parsed = parse_document(document)?;
        let context = MergeContext::from_flags(flags, &self.registry);
        tracing::debug!(
            not_merge = context.not_merge,
            replace_merge = ?context.replace_merge,
            frames = parsed.frames.len(),
            media = parsed.media.len(),
            "Applying option document"
        );

        let mut staged = self.state.clone();
        if context.not_merge {
            // Instances stay in the arena so the rebuild destroys them
            staged.reset_composition();
        }
        if !parsed.frames.is_empty() {
            staged.timeline.frames = parsed.frames;
        }
        if !parsed.media.is_empty() {
            staged.media = parsed.media;
        }
        staged.timeline.apply_settings(parsed.timeline);

        let report = self.run(&mut staged, &parsed.base, &context, &self.viewport)?;
        staged.base = Some(parsed.base);
        self.state = staged;
        Ok(report)
    }

    /// Store a new viewport and reconcile the last document against it.
    ///
    /// # Errors
    ///
    /// `ReconcileError::NoDocument` before the first `apply_option`, or
    /// any error a reconciliation pass can raise.
    pub fn resize(&mut self, viewport: Viewport) -> Result<ApplyReport> {
        let base = self.state.base.clone().ok_or(ReconcileError::NoDocument)?;
        tracing::debug!(width = viewport.width, height = viewport.height, "Resizing");

        let mut staged = self.state.clone();
        let report = self.run(&mut staged, &base, &MergeContext::default(), &viewport)?;
        self.viewport = viewport;
        self.state = staged;
        Ok(report)
    }

    /// Move the timeline and reconcile the last document.
    ///
    /// # Errors
    ///
    /// Same as [`Reconciler::resize`].
    pub fn set_timeline_index(&mut self, index: i64) -> Result<ApplyReport> {
        let base = self.state.base.clone().ok_or(ReconcileError::NoDocument)?;
        tracing::debug!(index, "Setting timeline index");

        let mut staged = self.state.clone();
        staged.timeline.current_index = index;
        let report = self.run(&mut staged, &base, &MergeContext::default(), &self.viewport)?;
        self.state = staged;
        Ok(report)
    }

    pub fn instance(&self, handle: InstanceHandle) -> Option<&ComponentInstance> {
        self.state.arena.get(handle)
    }

    /// Slots of `kind` in order, with `None` for holes.
    pub fn slots(&self, kind: &str) -> &[Option<InstanceHandle>] {
        self.state.kinds.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Live handles of `kind`, in slot order.
    pub fn handles(&self, kind: &str) -> Vec<InstanceHandle> {
        self.slots(kind).iter().flatten().copied().collect()
    }

    pub fn instances(&self, kind: &str) -> impl Iterator<Item = &ComponentInstance> {
        self.slots(kind)
            .iter()
            .flatten()
            .filter_map(|handle| self.state.arena.get(*handle))
    }

    pub fn find_by_id(&self, kind: &str, id: &str) -> Option<(InstanceHandle, &ComponentInstance)> {
        self.query_components(&ComponentQuery::by_id(kind, [id]))
            .into_iter()
            .next()
    }

    /// The instance in slot `index` of `kind`. Without an index, the first
    /// slot, or the first live instance when that slot is a hole.
    pub fn component(&self, kind: &str, index: Option<usize>) -> Option<(InstanceHandle, &ComponentInstance)> {
        component_at(self.slots(kind), &self.state.arena, index)
    }

    pub fn query_components(&self, query: &ComponentQuery) -> Vec<(InstanceHandle, &ComponentInstance)> {
        query.select(self.slots(&query.kind), &self.state.arena)
    }

    /// Instances of `kind` carrying `name`, in slot order.
    pub fn find_by_name(&self, kind: &str, name: &str) -> Vec<(InstanceHandle, &ComponentInstance)> {
        self.query_components(&ComponentQuery::by_name(kind, [name]))
    }

    /// Instances of `kind` with the given subtype, in slot order.
    pub fn find_by_subtype(&self, kind: &str, subtype: &str) -> Vec<(InstanceHandle, &ComponentInstance)> {
        self.query_components(&ComponentQuery::all(kind).with_subtype(subtype))
    }

    /// Kinds that currently have instances.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.state.kinds.keys().map(String::as_str)
    }

    pub fn instance_count(&self) -> usize {
        self.state.arena.len()
    }

    /// Non-component options, with the current overlays applied.
    pub fn globals(&self) -> &Value {
        &self.state.globals
    }

    pub fn timeline(&self) -> &TimelineState {
        &self.state.timeline
    }

    pub fn media(&self) -> &[MediaEntry] {
        &self.state.media
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Dump the effective option: globals plus each kind's stored options.
    /// Holes are written as `null`.
    pub fn get_option(&self) -> Value {
        let mut root = match &self.state.globals {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        for (kind, slots) in &self.state.kinds {
            let options = slots
                .iter()
                .map(|slot| {
                    slot.and_then(|handle| self.state.arena.get(handle))
                        .map_or(Value::Null, |instance| instance.option.clone())
                })
                .collect();
            root.insert(kind.clone(), Value::Array(options));
        }
        Value::Object(root)
    }

    fn run(
        &self,
        staged: &mut State,
        base: &Value,
        context: &MergeContext,
        viewport: &Viewport,
    ) -> Result<ApplyReport> {
        // Composing
        let composer = Composer::new(&self.registry, &self.config);
        let mut composed = composer.compose_base(base);
        let timeline_index = staged.timeline.effective_index();
        if let Some(frame) = select_frame(&staged.timeline) {
            composer.overlay(&mut composed, frame)?;
        }
        let media_selection = select_media(&staged.media, viewport);
        if let Some(index) = media_selection.index() {
            composer.overlay(&mut composed, &staged.media[index].fragment)?;
        }
        tracing::debug!(
            timeline_index = ?timeline_index,
            media_selection = ?media_selection,
            kinds = composed.components.len(),
            "Composed option document"
        );

        check_duplicate_ids(&composed, &self.config.subtype_key)?;

        let globals_base = Value::Object(composed.globals_base.clone());
        staged.globals_base = merge(&staged.globals_base, &globals_base, &self.config.merge)?;
        staged.globals = merge_all(
            &[&staged.globals_base, &composed.globals_overlay],
            &self.config.merge,
        )?;

        let mut report = ApplyReport {
            media_selection,
            timeline_index,
            ..ApplyReport::default()
        };

        // Kinds in declaration order, then replace-merge kinds the document
        // omits, then kinds that only exist from earlier calls
        let mut kinds: IndexSet<&str> = composed.components.keys().map(String::as_str).collect();
        kinds.extend(context.replace_merge.iter().map(String::as_str));
        let previous: Vec<String> = staged.kinds.keys().cloned().collect();
        kinds.extend(previous.iter().map(String::as_str));

        for kind in kinds {
            let Some(factory) = self.registry.get(kind) else {
                continue;
            };
            let fragments = composed
                .components
                .get(kind)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            self.reconcile_kind(staged, kind, factory.as_ref(), fragments, context, &mut report)?;
        }
        Ok(report)
    }

    fn reconcile_kind(
        &self,
        staged: &mut State,
        kind: &str,
        factory: &dyn ComponentFactory,
        fragments: &[ComposedFragment],
        context: &MergeContext,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let previous: Vec<Option<InstanceHandle>> = staged
            .kinds
            .get(kind)
            .map(|slots| {
                slots
                    .iter()
                    .map(|slot| slot.filter(|handle| staged.arena.contains(*handle)))
                    .collect()
            })
            .unwrap_or_default();
        if previous.iter().all(Option::is_none) && fragments.is_empty() {
            return Ok(());
        }

        // Matching
        let existing_keys: Vec<Option<KeyInfo>> = previous
            .iter()
            .map(|slot| {
                slot.and_then(|handle| staged.arena.get(handle))
                    .map(ComponentInstance::keys)
            })
            .collect();
        let incoming_keys: Vec<KeyInfo> = fragments
            .iter()
            .map(|fragment| KeyInfo::from_fragment(&fragment.effective, &self.config.subtype_key))
            .collect();
        let plan = compute_match(&existing_keys, &incoming_keys, context.match_mode(kind));
        let options = context.merge_options(kind, &self.config.merge);
        let mut stats = plan.stats.clone();

        // Merging, creating, destroying
        let mut slots: Vec<Option<InstanceHandle>> = Vec::with_capacity(plan.alignments.len());
        let mut created = Vec::new();
        let mut kept = Vec::new();
        for (position, alignment) in plan.alignments.iter().enumerate() {
            tracing::trace!(kind, position, ?alignment, "Applying slot alignment");
            let existing = alignment.existing().and_then(|idx| previous[idx]);
            let slot = match (alignment, existing) {
                (&SlotAlignment::Update { incoming, .. }, Some(handle)) => {
                    let changed = update_instance(
                        &mut staged.arena,
                        handle,
                        factory,
                        &fragments[incoming],
                        &incoming_keys[incoming],
                        &options,
                    )?;
                    kept.push((handle, changed));
                    Some(handle)
                }
                (&SlotAlignment::Retype { incoming, .. }, Some(old)) => {
                    destroy(&mut staged.arena, kind, old, report);
                    let new_instance = NewInstance {
                        fragment: &fragments[incoming],
                        keys: &incoming_keys[incoming],
                        position,
                        brand_new: false,
                    };
                    let handle = create_instance(&mut staged.arena, kind, factory, new_instance, &options)?;
                    created.push(handle);
                    Some(handle)
                }
                (&SlotAlignment::Create { incoming, brand_new }, _) => {
                    let new_instance = NewInstance {
                        fragment: &fragments[incoming],
                        keys: &incoming_keys[incoming],
                        position,
                        brand_new,
                    };
                    let handle = create_instance(&mut staged.arena, kind, factory, new_instance, &options)?;
                    created.push(handle);
                    Some(handle)
                }
                (SlotAlignment::Retain { .. }, Some(handle))
                    if staged.arena.get(handle).is_some_and(|instance| instance.overlay_only) =>
                {
                    // Nothing but the dropped overlay ever described it
                    destroy(&mut staged.arena, kind, handle, report);
                    stats.retained -= 1;
                    stats.removed += 1;
                    None
                }
                (SlotAlignment::Retain { .. }, Some(handle)) => {
                    let changed = retain_instance(&mut staged.arena, handle, factory)?;
                    kept.push((handle, changed));
                    Some(handle)
                }
                (SlotAlignment::Hole, _)
                | (
                    SlotAlignment::Update { .. } | SlotAlignment::Retype { .. } | SlotAlignment::Retain { .. },
                    None,
                ) => None,
            };
            slots.push(slot);
        }
        for handle in plan.removed.iter().filter_map(|&idx| previous[idx]) {
            destroy(&mut staged.arena, kind, handle, report);
        }
        while slots.last().is_some_and(Option::is_none) {
            slots.pop();
        }

        assign_view_keys(&mut staged.arena, &slots, &created);

        for handle in created {
            if let Some(instance) = staged.arena.get(handle) {
                report.created.push(CreatedInstance {
                    kind: kind.to_string(),
                    handle,
                    view_key: instance.view_key.clone(),
                    subtype: instance.subtype.clone(),
                    requires_new_view: instance.requires_new_view,
                });
            }
        }
        for (handle, changed) in kept {
            if let Some(instance) = staged.arena.get(handle) {
                report.kept.push(KeptInstance {
                    kind: kind.to_string(),
                    handle,
                    view_key: instance.view_key.clone(),
                    changed,
                });
            }
        }

        tracing::debug!(
            kind,
            updated = stats.updated,
            created = stats.created + stats.retyped,
            destroyed = stats.removed + stats.retyped,
            retained = stats.retained,
            "Reconciled component kind"
        );
        report.stats.merge(&stats);

        if slots.is_empty() {
            staged.kinds.shift_remove(kind);
        } else {
            staged.kinds.insert(kind.to_string(), slots);
        }
        Ok(())
    }
}

/// Two fragments of one kind may not share an id.
fn check_duplicate_ids(composed: &ComposedDocument, subtype_key: &str) -> Result<()> {
    for (kind, fragments) in &composed.components {
        let mut seen = FxHashSet::default();
        for fragment in fragments {
            if let Some(id) = KeyInfo::from_fragment(&fragment.effective, subtype_key).id
                && !seen.insert(id.clone())
            {
                return Err(ReconcileError::DuplicateId {
                    kind: kind.clone(),
                    id,
                });
            }
        }
    }
    Ok(())
}

/// Inputs for creating one instance.
struct NewInstance<'a> {
    fragment: &'a ComposedFragment,
    keys: &'a KeyInfo,
    position: usize,
    brand_new: bool,
}

fn create_instance(
    arena: &mut InstanceArena,
    kind: &str,
    factory: &dyn ComponentFactory,
    new: NewInstance<'_>,
    options: &MergeOptions,
) -> Result<InstanceHandle> {
    let subtype = new
        .keys
        .subtype
        .clone()
        .or_else(|| factory.default_subtype().map(str::to_string))
        .unwrap_or_default();
    check_subtype(kind, factory, &subtype)?;

    let defaults = factory
        .default_option(&subtype)
        .map_err(|source| ReconcileError::Component {
            kind: kind.to_string(),
            subtype: subtype.clone(),
            source,
        })?;
    let base_option = match &new.fragment.base {
        Some(base) => merge(&defaults, base, options)?,
        None => defaults,
    };
    let option = merge(&base_option, &new.fragment.effective, options)?;
    validate(kind, factory, &subtype, &option)?;

    Ok(arena.insert(ComponentInstance {
        kind: kind.to_string(),
        subtype,
        id: new.keys.id.clone(),
        name: new.keys.name.clone(),
        positional_index: new.position,
        option,
        base_option,
        generation: 0,
        view_key: ViewKey::Derived {
            name: None,
            ordinal: new.position,
        },
        requires_new_view: new.brand_new,
        overlay_only: new.fragment.base.is_none(),
    }))
}

/// Merge a bound fragment into an existing instance. Returns whether the
/// stored option changed.
fn update_instance(
    arena: &mut InstanceArena,
    handle: InstanceHandle,
    factory: &dyn ComponentFactory,
    fragment: &ComposedFragment,
    keys: &KeyInfo,
    options: &MergeOptions,
) -> Result<bool> {
    let Some(instance) = arena.get_mut(handle) else {
        return Ok(false);
    };
    let subtype = keys.subtype.clone().unwrap_or_else(|| instance.subtype.clone());
    check_subtype(&instance.kind, factory, &subtype)?;

    let base_option = match &fragment.base {
        Some(base) => merge(&instance.base_option, base, options)?,
        None => instance.base_option.clone(),
    };
    let option = merge(&base_option, &fragment.effective, options)?;
    validate(&instance.kind, factory, &subtype, &option)?;

    let changed =
        base_option != instance.base_option || option != instance.option || subtype != instance.subtype;
    if fragment.base.is_some() {
        instance.overlay_only = false;
    }
    if changed {
        instance.base_option = base_option;
        instance.option = option;
        instance.subtype = subtype;
        instance.generation += 1;
    }
    if instance.id.is_none() {
        instance.id = keys.id.clone();
    }
    if keys.name.is_some() {
        instance.name = keys.name.clone();
    }
    Ok(changed)
}

/// Drop any composition overlay from an instance no fragment matched.
fn retain_instance(
    arena: &mut InstanceArena,
    handle: InstanceHandle,
    factory: &dyn ComponentFactory,
) -> Result<bool> {
    let Some(instance) = arena.get_mut(handle) else {
        return Ok(false);
    };
    if instance.option == instance.base_option {
        return Ok(false);
    }
    validate(&instance.kind, factory, &instance.subtype, &instance.base_option)?;
    instance.option = instance.base_option.clone();
    instance.generation += 1;
    Ok(true)
}

fn destroy(arena: &mut InstanceArena, kind: &str, handle: InstanceHandle, report: &mut ApplyReport) {
    if let Some(instance) = arena.remove(handle) {
        report.destroyed.push(DestroyedInstance {
            kind: kind.to_string(),
            handle,
            view_key: instance.view_key,
        });
    }
}

fn check_subtype(kind: &str, factory: &dyn ComponentFactory, subtype: &str) -> Result<()> {
    if factory.accepts_subtype(subtype) {
        Ok(())
    } else {
        Err(ReconcileError::UnknownSubtype {
            kind: kind.to_string(),
            subtype: subtype.to_string(),
        })
    }
}

fn validate(kind: &str, factory: &dyn ComponentFactory, subtype: &str, option: &Value) -> Result<()> {
    factory
        .option_updated(subtype, option)
        .map_err(|source| ReconcileError::Component {
            kind: kind.to_string(),
            subtype: subtype.to_string(),
            source,
        })
}

/// Give freshly created instances their view keys.
///
/// Id-less named instances are numbered among earlier same-named id-less
/// instances of the kind; unnamed ones use their slot position.
fn assign_view_keys(
    arena: &mut InstanceArena,
    slots: &[Option<InstanceHandle>],
    created: &[InstanceHandle],
) {
    let mut ordinals: FxHashMap<String, usize> = FxHashMap::default();
    for (position, handle) in slots.iter().enumerate() {
        let Some(handle) = handle else {
            continue;
        };
        let Some(instance) = arena.get_mut(*handle) else {
            continue;
        };
        let view_key = match (&instance.id, &instance.name) {
            (Some(id), _) => ViewKey::Id(id.clone()),
            (None, Some(name)) => {
                let ordinal = ordinals.entry(name.clone()).or_default();
                let key = ViewKey::Derived {
                    name: Some(name.clone()),
                    ordinal: *ordinal,
                };
                *ordinal += 1;
                key
            }
            (None, None) => ViewKey::Derived {
                name: None,
                ordinal: position,
            },
        };
        if created.contains(handle) {
            instance.view_key = view_key;
        }
    }
}
