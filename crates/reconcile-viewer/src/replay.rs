/*
 * replay.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Feed a sequence of option documents through a reconciler and collect the reports.
 */

use anyhow::{Context, Result};
use option_reconcile::{ApplyReport, Reconciler, UpdateFlags, Viewport};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Everything the viewer prints.
#[derive(Serialize, Debug)]
pub struct ReplayOutput {
    pub steps: Vec<StepReport>,
    /// The final dumped option.
    pub option: Value,
}

#[derive(Serialize, Debug)]
pub struct StepReport {
    /// What triggered the pass: a file path, `timeline` or `resize`.
    pub step: String,
    pub report: ApplyReport,
}

/// Input for one run of the viewer.
#[derive(Debug, Default)]
pub struct Replay {
    pub files: Vec<PathBuf>,
    pub flags: UpdateFlags,
    pub timeline_index: Option<i64>,
    pub resize: Option<Viewport>,
}

impl Replay {
    pub fn run(&self, reconciler: &mut Reconciler) -> Result<ReplayOutput> {
        let mut steps = Vec::with_capacity(self.files.len() + 2);

        for path in &self.files {
            let document = read_document(path)?;
            let report = reconciler
                .apply_option(&document, &self.flags)
                .with_context(|| format!("Failed to apply {}", path.display()))?;
            tracing::info!(
                step = %path.display(),
                created = report.created.len(),
                destroyed = report.destroyed.len(),
                "Applied option document"
            );
            steps.push(StepReport {
                step: path.display().to_string(),
                report,
            });
        }

        if let Some(index) = self.timeline_index {
            let report = reconciler
                .set_timeline_index(index)
                .context("Failed to move the timeline")?;
            steps.push(StepReport {
                step: "timeline".to_string(),
                report,
            });
        }

        if let Some(viewport) = self.resize {
            let report = reconciler.resize(viewport).context("Failed to resize")?;
            steps.push(StepReport {
                step: "resize".to_string(),
                report,
            });
        }

        Ok(ReplayOutput {
            steps,
            option: reconciler.get_option(),
        })
    }
}

/// Read a document as YAML for `.yaml`/`.yml` files and as JSON otherwise.
pub fn read_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
        serde_yaml::from_str(&text).with_context(|| format!("Invalid YAML in {}", path.display()))
    } else {
        serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
    }
}

/// Parse a `WIDTHxHEIGHT` viewport such as `640x480`.
pub fn parse_viewport(text: &str) -> Result<Viewport, String> {
    let (width, height) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{text}'"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value > 0.0)
            .ok_or_else(|| format!("invalid viewport dimension '{part}'"))
    };
    Ok(Viewport::new(parse(width)?, parse(height)?))
}
