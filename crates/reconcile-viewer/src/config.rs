/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * TOML configuration for the viewer: viewport, update flags and kinds.
 */

use anyhow::{Context, Result};
use option_reconcile::{KindSpec, ReconcilerConfig, Registry, UpdateFlags, Viewport};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 800.0,
    height: 600.0,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub reconciler: ReconcilerConfig,
    pub viewport: Option<Viewport>,
    pub flags: UpdateFlags,

    /// Registered kinds. When empty the stock chart kinds are used.
    #[serde(rename = "kind")]
    pub kinds: Vec<KindConfig>,
}

/// One `[[kind]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindConfig {
    pub name: String,
    #[serde(default)]
    pub default_subtype: Option<String>,
    #[serde(default)]
    pub subtypes: Vec<String>,
    #[serde(default)]
    pub defaults: Option<Value>,
    #[serde(default)]
    pub subtype_defaults: BTreeMap<String, Value>,
}

impl KindConfig {
    fn to_spec(&self) -> KindSpec {
        let mut spec = KindSpec::new(&self.name).with_subtypes(self.subtypes.iter().cloned());
        if let Some(subtype) = &self.default_subtype {
            spec = spec.with_default_subtype(subtype);
        }
        if let Some(defaults) = &self.defaults {
            spec = spec.with_defaults(defaults.clone());
        }
        for (subtype, defaults) in &self.subtype_defaults {
            spec = spec.with_subtype_defaults(subtype, defaults.clone());
        }
        spec
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn registry(&self) -> Registry {
        if self.kinds.is_empty() {
            return Registry::charts();
        }
        self.kinds
            .iter()
            .fold(Registry::new(), |registry, kind| registry.with_kind(kind.to_spec()))
    }
}
