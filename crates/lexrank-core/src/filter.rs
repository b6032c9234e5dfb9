//! Equality and range filters over document attributes.

use serde::{Deserialize, Serialize};

use crate::types::Payload;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Label attribute equals the given value.
    Equals(String),
    /// Number attribute lies in `[min, max]`; open ends are unbounded.
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

impl Filter {
    pub fn equals(value: impl Into<String>) -> Self {
        Self::Equals(value.into())
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self::Range { min: Some(min), max: Some(max) }
    }

    pub fn at_least(min: f64) -> Self {
        Self::Range { min: Some(min), max: None }
    }

    pub fn at_most(max: f64) -> Self {
        Self::Range { min: None, max: Some(max) }
    }

    /// A payload missing the attribute never matches.
    pub fn matches(&self, attribute: &str, payload: &Payload) -> bool {
        match self {
            Self::Equals(expected) => payload.labels.get(attribute).is_some_and(|v| v == expected),
            Self::Range { min, max } => payload.numbers.get(attribute).is_some_and(|v| {
                min.map_or(true, |lo| *v >= lo) && max.map_or(true, |hi| *v <= hi)
            }),
        }
    }
}

/// True when every `(attribute, filter)` pair matches.
pub fn matches_all<'a, I>(filters: I, payload: &Payload) -> bool
where
    I: IntoIterator<Item = (&'a String, &'a Filter)>,
{
    filters.into_iter().all(|(attr, f)| f.matches(attr, payload))
}
