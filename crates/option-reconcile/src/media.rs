/*
 * media.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Media fragment selection and composition.
 */

use crate::compose::Composer;
use crate::config::ReconcilerConfig;
use crate::error::Result;
use crate::query::{MediaQuery, Viewport};
use crate::registry::Registry;
use serde::Serialize;
use serde_json::Value;

/// A fragment applied when its query matches the viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEntry {
    /// `None` marks the default entry, used when no query matches.
    pub query: Option<MediaQuery>,
    pub fragment: Value,
}

impl MediaEntry {
    pub fn new(query: MediaQuery, fragment: Value) -> Self {
        Self {
            query: Some(query),
            fragment,
        }
    }

    pub fn fallback(fragment: Value) -> Self {
        Self {
            query: None,
            fragment,
        }
    }

    pub fn is_default(&self) -> bool {
        self.query.is_none()
    }
}

/// Which media entry, if any, applies to a viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum MediaSelection {
    /// The first entry whose query matched.
    Matched(usize),
    /// No query matched; the default entry applies.
    Default(usize),
    #[default]
    None,
}

impl MediaSelection {
    pub fn index(&self) -> Option<usize> {
        match self {
            MediaSelection::Matched(index) | MediaSelection::Default(index) => Some(*index),
            MediaSelection::None => None,
        }
    }
}

/// Pick the entry to apply: the first matching query, else the first default.
pub fn select_media(entries: &[MediaEntry], viewport: &Viewport) -> MediaSelection {
    let matched = entries.iter().position(|entry| {
        entry
            .query
            .as_ref()
            .is_some_and(|query| query.evaluate(viewport))
    });
    if let Some(index) = matched {
        return MediaSelection::Matched(index);
    }
    match entries.iter().position(MediaEntry::is_default) {
        Some(index) => MediaSelection::Default(index),
        None => MediaSelection::None,
    }
}

/// Merge the selected media fragment onto `base`.
///
/// At most one entry is applied. Without a selection `base` is returned
/// unchanged.
pub fn compose_media_fragment(
    base: &Value,
    entries: &[MediaEntry],
    viewport: &Viewport,
    registry: &Registry,
    config: &ReconcilerConfig,
) -> Result<Value> {
    let Some(index) = select_media(entries, viewport).index() else {
        return Ok(base.clone());
    };
    let composer = Composer::new(registry, config);
    let mut document = composer.compose_base(base);
    composer.overlay(&mut document, &entries[index].fragment)?;
    Ok(document.to_value())
}
