/*
 * reconcile_properties.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Property tests for reconciliation across calls.
 */

use option_reconcile::{KindSpec, Reconciler, Registry, UpdateFlags, Viewport};
use proptest::prelude::*;
use serde_json::{Value, json};

fn registry() -> Registry {
    Registry::new()
        .with_kind(KindSpec::new("series").with_subtypes(["line", "bar"]))
        .with_kind(KindSpec::new("xAxis").with_default_subtype("category"))
}

/// A series fragment; ids are unique per position.
fn arb_series(index: usize) -> impl Strategy<Value = Value> {
    (
        any::<bool>(),
        prop::option::of("[a-b]"),
        prop::option::of(prop_oneof![Just("line"), Just("bar")]),
        prop::collection::vec(0i32..10, 0..3),
    )
        .prop_map(move |(has_id, name, subtype, data)| {
            let mut fragment = serde_json::Map::new();
            if has_id {
                fragment.insert("id".into(), json!(format!("s{index}")));
            }
            if let Some(name) = name {
                fragment.insert("name".into(), json!(name));
            }
            if let Some(subtype) = subtype {
                fragment.insert("type".into(), json!(subtype));
            }
            fragment.insert("data".into(), json!(data));
            Value::Object(fragment)
        })
}

fn arb_document() -> impl Strategy<Value = Value> {
    (0usize..4, 0usize..3, prop::option::of(0u32..900))
        .prop_flat_map(|(series, axes, max_width)| {
            let series: Vec<_> = (0..series).map(arb_series).collect();
            (series, Just(axes), Just(max_width))
        })
        .prop_map(|(series, axes, max_width)| {
            let mut document = json!({
                "series": series,
                "xAxis": (0..axes).map(|i| json!({"gridIndex": i})).collect::<Vec<_>>(),
                "title": {"text": "t"},
            });
            if let Some(max_width) = max_width {
                document["media"] = json!([
                    {"query": {"maxWidth": max_width}, "option": {"title": {"left": 10}, "series": [{"z": 3}]}},
                ]);
            }
            document
        })
}

proptest! {
    /// Applying the same document twice equals applying it once.
    #[test]
    fn repeated_application_is_idempotent(
        first in arb_document(),
        document in arb_document(),
    ) {
        let mut reconciler = Reconciler::new(registry(), Viewport::new(600.0, 400.0));
        reconciler.apply_option(&first, &UpdateFlags::merge()).unwrap();
        reconciler.apply_option(&document, &UpdateFlags::merge()).unwrap();

        let option = reconciler.get_option();
        let handles = reconciler.handles("series").to_vec();
        let generations: Vec<u64> = reconciler.instances("series").map(|i| i.generation).collect();

        let report = reconciler.apply_option(&document, &UpdateFlags::merge()).unwrap();
        prop_assert!(report.is_unchanged(), "{:?}", report);
        prop_assert_eq!(reconciler.get_option(), option);
        prop_assert_eq!(reconciler.handles("series"), handles.as_slice());
        prop_assert_eq!(
            reconciler.instances("series").map(|i| i.generation).collect::<Vec<_>>(),
            generations
        );
    }

    /// Every id appears at most once per kind and every live handle resolves.
    #[test]
    fn ids_stay_unique(documents in prop::collection::vec(arb_document(), 1..4)) {
        let mut reconciler = Reconciler::new(registry(), Viewport::new(600.0, 400.0));
        for document in &documents {
            reconciler.apply_option(document, &UpdateFlags::merge()).unwrap();
        }

        let mut ids: Vec<&str> = reconciler
            .instances("series")
            .filter_map(|i| i.id.as_deref())
            .collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), total);

        let live: usize = reconciler.kinds().map(|kind| reconciler.handles(kind).len()).sum();
        prop_assert_eq!(live, reconciler.instance_count());
        for kind in reconciler.kinds() {
            prop_assert!(matches!(reconciler.slots(kind).last(), Some(Some(_))), "{kind} ends in a hole");
        }
    }

    /// Resizing back restores the stored options exactly.
    #[test]
    fn resize_round_trip(document in arb_document(), width in 100u32..1000) {
        let mut reconciler = Reconciler::new(registry(), Viewport::new(600.0, 400.0));
        reconciler.apply_option(&document, &UpdateFlags::merge()).unwrap();
        let option = reconciler.get_option();

        reconciler.resize(Viewport::new(f64::from(width), 400.0)).unwrap();
        reconciler.resize(Viewport::new(600.0, 400.0)).unwrap();
        prop_assert_eq!(reconciler.get_option(), option);
    }
}
