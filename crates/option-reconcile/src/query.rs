/*
 * query.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Media query predicates evaluated against a viewport.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The rendering surface a media query is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// `width / height`.
    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    fn dimension(&self, dimension: &Dimension) -> Option<f64> {
        match dimension {
            Dimension::Width => Some(self.width),
            Dimension::Height => Some(self.height),
            Dimension::AspectRatio => Some(self.aspect_ratio()),
            Dimension::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    /// Viewport value must be `>=` the condition value.
    Min,
    /// Viewport value must be `<=` the condition value.
    Max,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Width,
    Height,
    AspectRatio,
    /// A dimension the viewport does not describe; never satisfied.
    Unknown(String),
}

impl Dimension {
    fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "width" => Dimension::Width,
            "height" => Dimension::Height,
            "aspectratio" => Dimension::AspectRatio,
            _ => Dimension::Unknown(name.to_string()),
        }
    }
}

/// One `min*`/`max*` condition of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub bound: Bound,
    pub dimension: Dimension,
    /// `None` when the declared value is not numeric.
    pub value: Option<f64>,
}

impl Condition {
    pub fn holds(&self, viewport: &Viewport) -> bool {
        let (Some(actual), Some(expected)) = (viewport.dimension(&self.dimension), self.value) else {
            return false;
        };
        match self.bound {
            Bound::Min => actual >= expected,
            Bound::Max => actual <= expected,
        }
    }
}

/// A conjunction of conditions. The empty query always holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaQuery {
    conditions: Vec<Condition>,
}

impl MediaQuery {
    /// Parse a predicate object such as `{"minWidth": 500, "maxAspectRatio": 1}`.
    ///
    /// Keys that do not start with `min` or `max` are ignored.
    pub fn parse(predicate: &Value) -> Self {
        let Some(map) = predicate.as_object() else {
            tracing::warn!(found = option_merge::type_name(predicate), "Media query is not an object");
            return Self::default();
        };

        let mut conditions = Vec::new();
        for (key, value) in map {
            let (bound, rest) = if let Some(rest) = key.strip_prefix("min") {
                (Bound::Min, rest)
            } else if let Some(rest) = key.strip_prefix("max") {
                (Bound::Max, rest)
            } else {
                tracing::warn!(key = %key, "Ignoring media query key without min/max prefix");
                continue;
            };
            if rest.is_empty() {
                tracing::warn!(key = %key, "Ignoring media query key without a dimension");
                continue;
            }
            conditions.push(Condition {
                bound,
                dimension: Dimension::parse(rest),
                value: numeric(value),
            });
        }
        Self { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// True when every condition holds for `viewport`.
    pub fn evaluate(&self, viewport: &Viewport) -> bool {
        self.conditions.iter().all(|condition| condition.holds(viewport))
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn holds(predicate: Value, width: f64, height: f64) -> bool {
        MediaQuery::parse(&predicate).evaluate(&Viewport::new(width, height))
    }

    #[test]
    fn test_min_and_max_are_inclusive() {
        assert!(holds(json!({"maxWidth": 700}), 700.0, 400.0));
        assert!(!holds(json!({"maxWidth": 700}), 701.0, 400.0));
        assert!(holds(json!({"minHeight": 400}), 700.0, 400.0));
        assert!(!holds(json!({"minHeight": 401}), 700.0, 400.0));
    }

    #[test]
    fn test_all_conditions_must_hold() {
        let predicate = json!({"minWidth": 200, "maxWidth": 500});
        assert!(holds(predicate.clone(), 300.0, 100.0));
        assert!(!holds(predicate, 600.0, 100.0));
    }

    #[test]
    fn test_aspect_ratio() {
        assert!(holds(json!({"maxAspectRatio": 1}), 400.0, 800.0));
        assert!(!holds(json!({"maxAspectRatio": 1}), 800.0, 400.0));
        assert!(holds(json!({"minaspectratio": 2}), 800.0, 400.0));
    }

    #[test]
    fn test_unprefixed_keys_are_ignored() {
        let query = MediaQuery::parse(&json!({"width": 1, "minWidth": 10}));
        assert_eq!(query.conditions().len(), 1);
        assert!(MediaQuery::parse(&json!({"MinWidth": 1})).is_empty());
        assert!(MediaQuery::parse(&json!({"min": 1})).is_empty());
    }

    #[test]
    fn test_unknown_dimension_is_false() {
        assert!(!holds(json!({"minDepth": 0}), 800.0, 400.0));
    }

    #[test]
    fn test_numeric_strings_and_non_numeric_values() {
        assert!(holds(json!({"maxWidth": "700"}), 600.0, 400.0));
        assert!(!holds(json!({"maxWidth": "wide"}), 600.0, 400.0));
        assert!(!holds(json!({"maxWidth": null}), 600.0, 400.0));
    }

    #[test]
    fn test_empty_query_always_holds() {
        assert!(holds(json!({}), 1.0, 1.0));
        assert!(holds(json!("not an object"), 1.0, 1.0));
    }
}
