/*
 * compose.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Component-aware composition of option documents.
 *
 * Timeline frames and media fragments are overlays on a base document.
 * For registered kinds, overlay fragments are aligned with the base
 * fragments by identity (the same matcher the reconciler uses) before
 * merging, so `series: [{id: 'a', ...}]` in a media fragment refines the
 * base series with id `a` rather than the first one. All other keys are
 * deep-merged as plain options.
 */

use crate::config::ReconcilerConfig;
use crate::error::Result;
use crate::key::KeyInfo;
use crate::matcher::{MatchMode, SlotAlignment, compute_match};
use crate::registry::Registry;
use indexmap::IndexMap;
use option_merge::{merge, normalize_to_array, type_name};
use serde_json::{Map, Value};

/// One component fragment after composition.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedFragment {
    /// The fragment as declared by the base document. `None` when the
    /// fragment was introduced (or retyped) by an overlay.
    pub base: Option<Value>,
    /// The fragment with every applied overlay merged in.
    pub effective: Value,
}

impl ComposedFragment {
    fn from_base(fragment: &Value) -> Self {
        Self {
            base: Some(fragment.clone()),
            effective: fragment.clone(),
        }
    }

    fn from_overlay(fragment: &Value) -> Self {
        Self {
            base: None,
            effective: fragment.clone(),
        }
    }
}

/// A base document with zero or more overlays applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposedDocument {
    /// Non-component keys of the base document.
    pub globals_base: Map<String, Value>,
    /// Non-component keys contributed by overlays, merged in order.
    pub globals_overlay: Value,
    /// Non-component keys with overlays applied.
    pub globals: Value,
    /// Fragments per registered kind, in declaration order.
    pub components: IndexMap<String, Vec<ComposedFragment>>,
}

impl ComposedDocument {
    /// Flatten back into a plain option document.
    pub fn to_value(&self) -> Value {
        let mut root = match &self.globals {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        for (kind, fragments) in &self.components {
            let list = fragments.iter().map(|f| f.effective.clone()).collect();
            root.insert(kind.clone(), Value::Array(list));
        }
        Value::Object(root)
    }
}

/// Applies overlays to base documents for one registry and configuration.
#[derive(Debug, Clone, Copy)]
pub struct Composer<'a> {
    registry: &'a Registry,
    config: &'a ReconcilerConfig,
}

impl<'a> Composer<'a> {
    pub fn new(registry: &'a Registry, config: &'a ReconcilerConfig) -> Self {
        Self { registry, config }
    }

    /// Split a base document into globals and per-kind fragment lists.
    pub fn compose_base(&self, base: &Value) -> ComposedDocument {
        let mut document = ComposedDocument {
            globals_overlay: Value::Object(Map::new()),
            ..ComposedDocument::default()
        };
        let Some(map) = base.as_object() else {
            document.globals = Value::Object(Map::new());
            return document;
        };

        for (key, value) in map {
            if self.registry.contains(key) {
                let fragments = component_fragments(key, value)
                    .into_iter()
                    .map(ComposedFragment::from_base)
                    .collect();
                document.components.insert(key.clone(), fragments);
            } else {
                document.globals_base.insert(key.clone(), value.clone());
            }
        }
        document.globals = Value::Object(document.globals_base.clone());
        document
    }

    /// Merge an overlay fragment onto a composed document.
    ///
    /// Non-object overlays are ignored.
    pub fn overlay(&self, document: &mut ComposedDocument, overlay: &Value) -> Result<()> {
        let Some(map) = overlay.as_object() else {
            tracing::warn!(found = type_name(overlay), "Ignoring non-object overlay fragment");
            return Ok(());
        };

        let options = &self.config.merge;
        let mut globals = Map::new();
        for (key, value) in map {
            if !self.registry.contains(key) {
                globals.insert(key.clone(), value.clone());
                continue;
            }

            let incoming = component_fragments(key, value);
            let current = document.components.entry(key.clone()).or_default();
            let existing_keys: Vec<Option<KeyInfo>> = current
                .iter()
                .map(|f| Some(KeyInfo::from_fragment(&f.effective, &self.config.subtype_key)))
                .collect();
            let incoming_keys: Vec<KeyInfo> = incoming
                .iter()
                .map(|f| KeyInfo::from_fragment(f, &self.config.subtype_key))
                .collect();

            let plan = compute_match(&existing_keys, &incoming_keys, MatchMode::Normal);
            let mut composed = Vec::with_capacity(plan.alignments.len());
            for alignment in &plan.alignments {
                let fragment = match *alignment {
                    SlotAlignment::Update {
                        existing, incoming: inc, ..
                    } => ComposedFragment {
                        base: current[existing].base.clone(),
                        effective: merge(&current[existing].effective, incoming[inc], options)?,
                    },
                    SlotAlignment::Retype { incoming: inc, .. }
                    | SlotAlignment::Create { incoming: inc, .. } => {
                        ComposedFragment::from_overlay(incoming[inc])
                    }
                    SlotAlignment::Retain { existing } => current[existing].clone(),
                    // Composed lists are dense
                    SlotAlignment::Hole => continue,
                };
                composed.push(fragment);
            }
            tracing::trace!(
                kind = %key,
                updated = plan.stats.updated,
                created = plan.stats.created,
                "Composed overlay fragments"
            );
            *current = composed;
        }

        if !globals.is_empty() {
            let globals = Value::Object(globals);
            document.globals_overlay = merge(&document.globals_overlay, &globals, options)?;
            document.globals = merge(&document.globals, &globals, options)?;
        }
        Ok(())
    }
}

/// Normalize a kind entry, dropping fragments that are not objects.
fn component_fragments<'v>(kind: &str, value: &'v Value) -> Vec<&'v Value> {
    normalize_to_array(value)
        .into_iter()
        .filter(|fragment| {
            let keep = fragment.is_object();
            if !keep {
                tracing::debug!(kind = %kind, found = type_name(fragment), "Skipping non-object fragment");
            }
            keep
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::KindSpec;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::new()
            .with_kind(KindSpec::new("series"))
            .with_kind(KindSpec::new("xAxis"))
    }

    fn compose(base: Value, overlays: &[Value]) -> ComposedDocument {
        let registry = registry();
        let config = ReconcilerConfig::default();
        let composer = Composer::new(&registry, &config);
        let mut document = composer.compose_base(&base);
        for overlay in overlays {
            composer.overlay(&mut document, overlay).unwrap();
        }
        document
    }

    #[test]
    fn test_base_split() {
        let document = compose(
            json!({"title": {"text": "t"}, "series": {"type": "line"}, "xAxis": [{}, null]}),
            &[],
        );
        assert_eq!(document.globals, json!({"title": {"text": "t"}}));
        assert_eq!(document.components["series"].len(), 1);
        assert_eq!(document.components["xAxis"].len(), 1);
        assert!(document.components["series"][0].base.is_some());
    }

    #[test]
    fn test_overlay_aligns_by_id() {
        let document = compose(
            json!({"series": [{"id": "a", "data": [1]}, {"id": "b", "data": [2]}]}),
            &[json!({"series": [{"id": "b", "label": {"show": true}}]})],
        );
        let series = &document.components["series"];
        assert_eq!(series[0].effective, json!({"id": "a", "data": [1]}));
        assert_eq!(series[1].effective, json!({"id": "b", "data": [2], "label": {"show": true}}));
        assert_eq!(series[1].base, Some(json!({"id": "b", "data": [2]})));
    }

    #[test]
    fn test_overlay_aligns_by_position_and_appends() {
        let document = compose(
            json!({"series": [{"data": [1]}]}),
            &[json!({"series": [{"color": "red"}, {"data": [9]}]})],
        );
        let series = &document.components["series"];
        assert_eq!(series[0].effective, json!({"data": [1], "color": "red"}));
        assert_eq!(series[1], ComposedFragment { base: None, effective: json!({"data": [9]}) });
    }

    #[test]
    fn test_overlay_retype_drops_base() {
        let document = compose(
            json!({"series": [{"id": "a", "type": "line", "data": [1]}]}),
            &[json!({"series": [{"id": "a", "type": "bar"}]})],
        );
        assert_eq!(
            document.components["series"][0],
            ComposedFragment { base: None, effective: json!({"id": "a", "type": "bar"}) }
        );
    }

    #[test]
    fn test_overlay_globals_are_tracked_separately() {
        let document = compose(
            json!({"title": {"text": "t", "left": 0}}),
            &[json!({"title": {"left": 10}}), json!({"color": ["red"]})],
        );
        assert_eq!(document.globals, json!({"title": {"text": "t", "left": 10}, "color": ["red"]}));
        assert_eq!(document.globals_overlay, json!({"title": {"left": 10}, "color": ["red"]}));
        assert_eq!(document.globals_base.len(), 1);
    }

    #[test]
    fn test_overlay_introduces_new_kind() {
        let document = compose(json!({}), &[json!({"xAxis": {"type": "value"}})]);
        assert_eq!(document.to_value(), json!({"xAxis": [{"type": "value"}]}));
        assert_eq!(document.components["xAxis"][0].base, None);
    }

    #[test]
    fn test_non_object_overlay_is_ignored() {
        let base = json!({"series": [{"data": [1]}]});
        let document = compose(base.clone(), &[json!([1, 2])]);
        assert_eq!(document, compose(base, &[]));
    }
}
