/*
 * timeline.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Timeline frame selection and composition.
 */

use crate::compose::Composer;
use crate::config::ReconcilerConfig;
use crate::error::Result;
use crate::registry::Registry;
use serde::Serialize;
use serde_json::Value;

/// Frame list and playback position that survive across calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineState {
    pub current_index: i64,
    /// Wrap the index modulo the frame count; clamp it when false.
    pub looped: bool,
    pub frames: Vec<Value>,
}

impl Default for TimelineState {
    fn default() -> Self {
        Self {
            current_index: 0,
            looped: true,
            frames: Vec::new(),
        }
    }
}

impl TimelineState {
    pub fn with_frames(frames: Vec<Value>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    /// Index of the frame `current_index` selects, or `None` without frames.
    pub fn effective_index(&self) -> Option<usize> {
        let len = i64::try_from(self.frames.len()).ok().filter(|len| *len > 0)?;
        let index = if self.looped {
            self.current_index.rem_euclid(len)
        } else {
            self.current_index.clamp(0, len - 1)
        };
        usize::try_from(index).ok()
    }

    /// Overwrite position and looping with whatever `settings` declare.
    pub fn apply_settings(&mut self, settings: TimelineSettings) {
        if let Some(index) = settings.current_index {
            self.current_index = index;
        }
        if let Some(looped) = settings.looped {
            self.looped = looped;
        }
    }
}

/// Settings a document's `timeline` component declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimelineSettings {
    pub current_index: Option<i64>,
    pub looped: Option<bool>,
}

/// The frame `state` currently selects.
pub fn select_frame(state: &TimelineState) -> Option<&Value> {
    state.effective_index().and_then(|index| state.frames.get(index))
}

/// Merge the selected frame onto `base`.
///
/// Without frames `base` is returned unchanged. `base` is never modified,
/// so composing again after moving the index starts from the same base.
pub fn compose_timeline_frame(
    base: &Value,
    state: &TimelineState,
    registry: &Registry,
    config: &ReconcilerConfig,
) -> Result<Value> {
    let Some(frame) = select_frame(state) else {
        return Ok(base.clone());
    };
    let composer = Composer::new(registry, config);
    let mut document = composer.compose_base(base);
    composer.overlay(&mut document, frame)?;
    Ok(document.to_value())
}
