/*
 * document.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Splitting a raw option document into its base, timeline frames and
 * media entries.
 */

use crate::error::{ReconcileError, Result};
use crate::media::MediaEntry;
use crate::query::MediaQuery;
use crate::timeline::TimelineSettings;
use option_merge::{LayerCursor, LayeredValue, OptionLayers, type_name};
use serde_json::{Map, Value};

pub const BASE_OPTION_KEY: &str = "baseOption";
pub const FRAMES_KEY: &str = "options";
pub const MEDIA_KEY: &str = "media";
pub const TIMELINE_KEY: &str = "timeline";

/// A document split into its regions.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    /// The base option, always an object.
    pub base: Value,
    pub frames: Vec<Value>,
    pub media: Vec<MediaEntry>,
    pub timeline: TimelineSettings,
}

/// Parse a raw option document.
///
/// # Errors
///
/// Returns `ReconcileError::InvalidDocument` if the document is not an object.
pub fn parse_document(document: &Value) -> Result<ParsedDocument> {
    let Some(root) = document.as_object() else {
        return Err(ReconcileError::InvalidDocument {
            found: type_name(document),
        });
    };

    let base = match root.get(BASE_OPTION_KEY) {
        Some(Value::Object(base)) => {
            let mut base = base.clone();
            if !base.contains_key(TIMELINE_KEY)
                && let Some(timeline) = root.get(TIMELINE_KEY)
            {
                base.insert(TIMELINE_KEY.to_string(), timeline.clone());
            }
            Value::Object(base)
        }
        other => {
            if let Some(other) = other {
                tracing::warn!(found = type_name(other), "Ignoring non-object baseOption");
            }
            let base: Map<String, Value> = root
                .iter()
                .filter(|(key, _)| !matches!(key.as_str(), BASE_OPTION_KEY | FRAMES_KEY | MEDIA_KEY))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Value::Object(base)
        }
    };

    let layers = OptionLayers::new(vec![document, &base]);
    let timeline = timeline_settings(&layers.cursor().at(TIMELINE_KEY));

    Ok(ParsedDocument {
        frames: parse_frames(root.get(FRAMES_KEY)),
        media: parse_media(root.get(MEDIA_KEY)),
        timeline,
        base,
    })
}

fn parse_frames(frames: Option<&Value>) -> Vec<Value> {
    match frames {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(frames)) => frames.clone(),
        Some(other) => {
            tracing::warn!(found = type_name(other), "Ignoring non-array timeline options");
            Vec::new()
        }
    }
}

fn parse_media(media: Option<&Value>) -> Vec<MediaEntry> {
    let entries = match media {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            tracing::warn!(found = type_name(other), "Ignoring non-array media");
            return Vec::new();
        }
    };

    let mut parsed = Vec::with_capacity(entries.len());
    let mut has_default = false;
    for (index, entry) in entries.iter().enumerate() {
        let Some(fragment) = entry.get("option").filter(|option| !option.is_null()) else {
            tracing::warn!(index, "Ignoring media entry without an option");
            continue;
        };
        match entry.get("query").filter(|query| !query.is_null()) {
            Some(query) => parsed.push(MediaEntry::new(MediaQuery::parse(query), fragment.clone())),
            None if has_default => {
                tracing::warn!(index, "Ignoring extra default media entry");
            }
            None => {
                has_default = true;
                parsed.push(MediaEntry::fallback(fragment.clone()));
            }
        }
    }
    parsed
}

/// Read `currentIndex` and `loop` from the layered `timeline` region.
///
/// An array-valued timeline contributes its first element.
fn timeline_settings(timeline: &LayerCursor<'_>) -> TimelineSettings {
    match timeline.as_value() {
        Some(LayeredValue::Map(map)) => TimelineSettings {
            current_index: map
                .get("currentIndex")
                .and_then(|cursor| cursor.as_leaf())
                .and_then(|leaf| index_value(leaf.value)),
            looped: map
                .get("loop")
                .and_then(|cursor| cursor.as_leaf())
                .and_then(|leaf| leaf.value.as_bool()),
        },
        Some(LayeredValue::Leaf(leaf)) => match leaf.value.as_array().and_then(|list| list.first()) {
            Some(first) => TimelineSettings {
                current_index: first.get("currentIndex").and_then(index_value),
                looped: first.get("loop").and_then(Value::as_bool),
            },
            None => TimelineSettings::default(),
        },
        None => TimelineSettings::default(),
    }
}

fn index_value(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f.trunc() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaSelection;
    use crate::media::select_media;
    use crate::query::Viewport;
    use serde_json::json;

    #[test]
    fn test_plain_document() {
        let parsed = parse_document(&json!({"series": [{"type": "line"}], "title": {}})).unwrap();
        assert_eq!(parsed.base, json!({"series": [{"type": "line"}], "title": {}}));
        assert!(parsed.frames.is_empty());
        assert!(parsed.media.is_empty());
        assert_eq!(parsed.timeline, TimelineSettings::default());
    }

    #[test]
    fn test_non_object_document() {
        let error = parse_document(&json!([1])).unwrap_err();
        insta::assert_snapshot!(error.to_string(), @"Option document must be an object, found array");
    }

    #[test]
    fn test_base_option_with_root_timeline() {
        let parsed = parse_document(&json!({
            "baseOption": {"series": [{"type": "bar"}]},
            "timeline": {"currentIndex": 2, "loop": false},
            "options": [{"series": [{"data": [1]}]}, {"series": [{"data": [2]}]}],
        }))
        .unwrap();

        assert_eq!(
            parsed.base,
            json!({"series": [{"type": "bar"}], "timeline": {"currentIndex": 2, "loop": false}})
        );
        assert_eq!(parsed.frames.len(), 2);
        assert_eq!(
            parsed.timeline,
            TimelineSettings {
                current_index: Some(2),
                looped: Some(false)
            }
        );
    }

    #[test]
    fn test_base_timeline_wins_over_root() {
        let parsed = parse_document(&json!({
            "baseOption": {"timeline": {"currentIndex": 1}},
            "timeline": {"currentIndex": 5, "loop": false},
        }))
        .unwrap();
        assert_eq!(parsed.base, json!({"timeline": {"currentIndex": 1}}));
        assert_eq!(parsed.timeline.current_index, Some(1));
        assert_eq!(parsed.timeline.looped, Some(false));
    }

    #[test]
    fn test_array_timeline_uses_first_element() {
        let parsed = parse_document(&json!({"timeline": [{"currentIndex": 3.0}, {"currentIndex": 9}]})).unwrap();
        assert_eq!(parsed.timeline.current_index, Some(3));
    }

    #[test]
    fn test_root_without_base_option_strips_reserved_keys() {
        let parsed = parse_document(&json!({
            "title": {"text": "t"},
            "options": [{}],
            "media": [{"option": {}}],
        }))
        .unwrap();
        assert_eq!(parsed.base, json!({"title": {"text": "t"}}));
        assert_eq!(parsed.frames.len(), 1);
        assert_eq!(parsed.media.len(), 1);
    }

    #[test]
    fn test_media_entries() {
        let parsed = parse_document(&json!({
            "media": [
                {"option": {"legend": {"top": 0}}},
                {"query": {"maxWidth": 500}, "option": {"legend": {"top": 10}}},
                {"query": {"maxWidth": 300}},
                {"option": {"legend": {"top": 20}}},
            ],
        }))
        .unwrap();

        assert_eq!(parsed.media.len(), 2);
        assert!(parsed.media[0].is_default());
        assert_eq!(parsed.media[0].fragment, json!({"legend": {"top": 0}}));
        assert_eq!(
            select_media(&parsed.media, &Viewport::new(400.0, 400.0)),
            MediaSelection::Matched(1)
        );
    }

    #[test]
    fn test_illegal_regions_are_ignored() {
        let parsed = parse_document(&json!({"options": {"a": 1}, "media": "narrow", "title": {}})).unwrap();
        assert!(parsed.frames.is_empty());
        assert!(parsed.media.is_empty());
        assert_eq!(parsed.base, json!({"title": {}}));
    }
}
