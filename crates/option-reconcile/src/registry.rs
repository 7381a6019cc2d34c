/*
 * registry.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Component kinds and the factories that create their instances.
 */

use crate::error::ComponentError;
use indexmap::IndexMap;
use option_merge::{MergeOptions, merge};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;

/// Creates and validates the instances of one component kind.
///
/// Implementations are shared across reconciliation passes and must not
/// hold per-call state.
pub trait ComponentFactory: Send + Sync {
    /// The kind this factory serves (the document key, e.g. `series`).
    fn kind(&self) -> &str;

    /// Subtype used when neither the fragment nor a bound instance names one.
    fn default_subtype(&self) -> Option<&str> {
        None
    }

    /// Whether `subtype` names a variant this factory can create.
    fn accepts_subtype(&self, _subtype: &str) -> bool {
        true
    }

    /// Option every new instance of `subtype` starts from.
    fn default_option(&self, _subtype: &str) -> Result<Value, ComponentError> {
        Ok(Value::Object(Map::new()))
    }

    /// Inspect a freshly stored option.
    ///
    /// Returning an error aborts the whole reconciliation pass.
    fn option_updated(&self, _subtype: &str, _option: &Value) -> Result<(), ComponentError> {
        Ok(())
    }
}

type Validator = dyn Fn(&str, &Value) -> Result<(), ComponentError> + Send + Sync;

/// Declarative factory: default subtype, accepted subtypes, default options
/// and an optional validator.
#[derive(Clone)]
pub struct KindSpec {
    name: String,
    default_subtype: Option<String>,
    subtypes: Vec<String>,
    defaults: Value,
    subtype_defaults: FxHashMap<String, Value>,
    validator: Option<Arc<Validator>>,
}

impl KindSpec {
    /// A kind that accepts any subtype and starts from `{}`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_subtype: None,
            subtypes: Vec::new(),
            defaults: Value::Object(Map::new()),
            subtype_defaults: FxHashMap::default(),
            validator: None,
        }
    }

    pub fn with_default_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.default_subtype = Some(subtype.into());
        self
    }

    /// Restrict the kind to these subtypes. An empty list accepts anything.
    pub fn with_subtypes<I, S>(mut self, subtypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subtypes = subtypes.into_iter().map(Into::into).collect();
        self
    }

    /// Default option shared by every subtype.
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = defaults;
        self
    }

    /// Default option layered over the shared defaults for one subtype.
    pub fn with_subtype_defaults(mut self, subtype: impl Into<String>, defaults: Value) -> Self {
        self.subtype_defaults.insert(subtype.into(), defaults);
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<(), ComponentError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl fmt::Debug for KindSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindSpec")
            .field("name", &self.name)
            .field("default_subtype", &self.default_subtype)
            .field("subtypes", &self.subtypes)
            .field("defaults", &self.defaults)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl ComponentFactory for KindSpec {
    fn kind(&self) -> &str {
        &self.name
    }

    fn default_subtype(&self) -> Option<&str> {
        self.default_subtype.as_deref()
    }

    fn accepts_subtype(&self, subtype: &str) -> bool {
        subtype.is_empty() || self.subtypes.is_empty() || self.subtypes.iter().any(|s| s == subtype)
    }

    fn default_option(&self, subtype: &str) -> Result<Value, ComponentError> {
        let Some(extra) = self.subtype_defaults.get(subtype) else {
            return Ok(self.defaults.clone());
        };
        merge(&self.defaults, extra, &MergeOptions::default()).map_err(|err| {
            ComponentError::new(format!("Invalid defaults for subtype '{subtype}': {err}"))
        })
    }

    fn option_updated(&self, subtype: &str, option: &Value) -> Result<(), ComponentError> {
        match &self.validator {
            Some(validator) => validator(subtype, option),
            None => Ok(()),
        }
    }
}

/// The table of registered kinds, in registration order.
#[derive(Clone, Default)]
pub struct Registry {
    factories: IndexMap<String, Arc<dyn ComponentFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any earlier one for the same kind.
    pub fn register(&mut self, factory: Arc<dyn ComponentFactory>) {
        let kind = factory.kind().to_string();
        if self.factories.insert(kind.clone(), factory).is_some() {
            tracing::debug!(kind = %kind, "Replaced component factory");
        }
    }

    pub fn with_kind(mut self, factory: impl ComponentFactory + 'static) -> Self {
        self.register(Arc::new(factory));
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn ComponentFactory>> {
        self.factories.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// A stock set of chart component kinds.
    pub fn charts() -> Self {
        const SERIES_TYPES: &[&str] = &[
            "line", "bar", "pie", "scatter", "effectScatter", "radar", "tree", "treemap",
            "sunburst", "boxplot", "candlestick", "heatmap", "map", "parallel", "lines", "graph",
            "sankey", "funnel", "gauge", "pictorialBar", "themeRiver", "custom",
        ];
        const AXIS_TYPES: &[&str] = &["category", "value", "time", "log"];

        Registry::new()
            .with_kind(KindSpec::new("title").with_defaults(json!({"show": true})))
            .with_kind(KindSpec::new("legend").with_default_subtype("plain").with_subtypes(["plain", "scroll"]))
            .with_kind(KindSpec::new("grid"))
            .with_kind(
                KindSpec::new("xAxis")
                    .with_default_subtype("category")
                    .with_subtypes(AXIS_TYPES.iter().copied()),
            )
            .with_kind(
                KindSpec::new("yAxis")
                    .with_default_subtype("value")
                    .with_subtypes(AXIS_TYPES.iter().copied()),
            )
            .with_kind(KindSpec::new("tooltip"))
            .with_kind(KindSpec::new("dataset"))
            .with_kind(KindSpec::new("timeline").with_default_subtype("slider").with_subtypes(["slider"]))
            .with_kind(KindSpec::new("dataZoom").with_default_subtype("slider").with_subtypes(["slider", "inside"]))
            .with_kind(
                KindSpec::new("visualMap")
                    .with_default_subtype("continuous")
                    .with_subtypes(["continuous", "piecewise"]),
            )
            .with_kind(
                KindSpec::new("series")
                    .with_subtypes(SERIES_TYPES.iter().copied())
                    .with_validator(check_series_layout),
            )
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

/// `seriesLayoutBy` may only be `column` or `row`.
fn check_series_layout(_subtype: &str, option: &Value) -> Result<(), ComponentError> {
    match option.get("seriesLayoutBy") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(layout)) if layout == "column" || layout == "row" => Ok(()),
        Some(other) => Err(ComponentError::new(format!(
            "seriesLayoutBy must be 'column' or 'row', got {other}"
        ))
        .with_directive("seriesLayoutBy")),
    }
}
