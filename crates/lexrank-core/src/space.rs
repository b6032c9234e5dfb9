//! Space definitions: typed projections of one entity attribute.
//!
//! Spaces are a closed set of variants resolved once when the registry is
//! built. Unknown `kind` tags are rejected by deserialization, never at query
//! time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::schema::AttributeKind;
use crate::types::{EntityKind, Payload};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NumericMode {
    Maximize,
    Minimize,
    Nearest,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpaceKind {
    /// Dense embedding of a text attribute produced by model `model`.
    Vector { model: String, dimensions: usize },
    /// Finite label set.
    Categorical { categories: BTreeSet<String> },
    /// Bounded number compared by `mode`.
    Numeric { min: f64, max: f64, mode: NumericMode },
}

impl SpaceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vector { .. } => "vector",
            Self::Categorical { .. } => "categorical",
            Self::Numeric { .. } => "numeric",
        }
    }

    /// Attribute kind this space can project.
    pub fn attribute_kind(&self) -> AttributeKind {
        match self {
            Self::Vector { .. } => AttributeKind::Text,
            Self::Categorical { .. } => AttributeKind::Label,
            Self::Numeric { .. } => AttributeKind::Number,
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector { .. })
    }

    pub(crate) fn validate(&self, space: &str) -> Result<()> {
        match self {
            Self::Vector { model, dimensions } => {
                if model.trim().is_empty() {
                    return Err(Error::config(format!("space '{space}': vector model id is empty")));
                }
                if *dimensions == 0 {
                    return Err(Error::config(format!("space '{space}': vector dimensions must be > 0")));
                }
            }
            Self::Categorical { categories } => {
                if categories.is_empty() {
                    return Err(Error::config(format!("space '{space}': category set is empty")));
                }
                if categories.iter().any(|c| c.trim().is_empty()) {
                    return Err(Error::config(format!("space '{space}': empty category label")));
                }
            }
            Self::Numeric { min, max, .. } => {
                if !min.is_finite() || !max.is_finite() || min >= max {
                    return Err(Error::config(format!(
                        "space '{space}': numeric range [{min}, {max}] must be finite with min < max"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A named projection, as declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpaceDefinition {
    pub name: String,
    pub entity: EntityKind,
    pub attribute: String,
    #[serde(flatten)]
    pub kind: SpaceKind,
}

impl SpaceDefinition {
    pub fn vector(name: &str, entity: EntityKind, attribute: &str, model: &str, dimensions: usize) -> Self {
        Self {
            name: name.to_string(),
            entity,
            attribute: attribute.to_string(),
            kind: SpaceKind::Vector { model: model.to_string(), dimensions },
        }
    }

    pub fn categorical<I, S>(name: &str, entity: EntityKind, attribute: &str, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            entity,
            attribute: attribute.to_string(),
            kind: SpaceKind::Categorical {
                categories: categories.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn numeric(name: &str, entity: EntityKind, attribute: &str, min: f64, max: f64, mode: NumericMode) -> Self {
        Self {
            name: name.to_string(),
            entity,
            attribute: attribute.to_string(),
            kind: SpaceKind::Numeric { min, max, mode },
        }
    }
}

/// What a backend is asked to score within one space.
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceQuery {
    Vector(Vec<f32>),
    Label(String),
    Numeric {
        min: f64,
        max: f64,
        mode: NumericMode,
        target: Option<f64>,
    },
}

impl SpaceQuery {
    /// Score a payload for label/numeric queries. Vector queries are scored
    /// against stored vectors, not payloads, and return `None` here.
    pub fn score_payload(&self, attribute: &str, payload: &Payload) -> Option<f64> {
        match self {
            Self::Vector(_) => None,
            Self::Label(target) => Some(categorical_similarity(
                payload.labels.get(attribute).map(String::as_str),
                target,
            )),
            Self::Numeric { min, max, mode, target } => payload
                .numbers
                .get(attribute)
                .map(|v| numeric_similarity(*v, *min, *max, *mode, *target)),
        }
    }
}

/// Cosine similarity clamped to `[0, 1]`. Mismatched or zero vectors score 0.
pub fn vector_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(0.0, 1.0)
}

pub fn categorical_similarity(value: Option<&str>, target: &str) -> f64 {
    match value {
        Some(v) if v == target => 1.0,
        _ => 0.0,
    }
}

pub fn numeric_similarity(value: f64, min: f64, max: f64, mode: NumericMode, target: Option<f64>) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let range = max - min;
    let x = ((value - min) / range).clamp(0.0, 1.0);
    match mode {
        NumericMode::Maximize => x,
        NumericMode::Minimize => 1.0 - x,
        NumericMode::Nearest => match target {
            Some(t) => (1.0 - (value - t).abs() / range).clamp(0.0, 1.0),
            None => 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_is_clamped_to_unit_interval() {
        assert!((vector_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert_eq!(vector_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(vector_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(vector_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn numeric_modes() {
        assert!((numeric_similarity(75.0, 0.0, 100.0, NumericMode::Maximize, None) - 0.75).abs() < 1e-12);
        assert!((numeric_similarity(75.0, 0.0, 100.0, NumericMode::Minimize, None) - 0.25).abs() < 1e-12);
        assert!((numeric_similarity(40.0, 0.0, 100.0, NumericMode::Nearest, Some(50.0)) - 0.9).abs() < 1e-12);
        assert_eq!(numeric_similarity(150.0, 0.0, 100.0, NumericMode::Maximize, None), 1.0);
        assert_eq!(numeric_similarity(f64::NAN, 0.0, 100.0, NumericMode::Maximize, None), 0.0);
    }

    #[test]
    fn unknown_kind_is_rejected_at_load() {
        let raw = r#"{"name":"x","entity":"document","attribute":"body","kind":"graph"}"#;
        assert!(serde_json::from_str::<SpaceDefinition>(raw).is_err());
        let raw = r#"{"name":"x","entity":"document","attribute":"body","kind":"vector","model":"m","dimensions":8}"#;
        let def: SpaceDefinition = serde_json::from_str(raw).expect("vector space");
        assert!(def.kind.is_vector());
    }
}
