//! Query Composer: Query Specification in, validated execution plan out.
//!
//! Composition is pure. Every caller error is raised here, so a plan that
//! reaches the router is always executable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use lexrank_core::config::RetrievalSettings;
use lexrank_core::error::{Error, Result};
use lexrank_core::filter::Filter;
use lexrank_core::registry::{SpaceHandle, SpaceRegistry};
use lexrank_core::schema::AttributeKind;
use lexrank_core::space::{NumericMode, SpaceKind, SpaceQuery};
use lexrank_core::types::{DisclosureTier, EntityKind, HierarchyPath};

use crate::hierarchy::HierarchyResolver;
use crate::presets::TierPresets;

/// Query-side value a categorical or numeric space is compared against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SpaceTarget {
    Label(String),
    Number(f64),
}

/// Ephemeral request value. Empty `weights` means "use the tier preset".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuerySpec {
    pub text: String,
    pub tier: DisclosureTier,
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub filters: BTreeMap<String, Filter>,
    /// Target path per hierarchy dimension name.
    #[serde(default)]
    pub hierarchy: BTreeMap<String, HierarchyPath>,
    #[serde(default)]
    pub targets: BTreeMap<String, SpaceTarget>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub hierarchy_weight: Option<f64>,
    #[serde(default)]
    pub recency_weight: Option<f64>,
}

impl QuerySpec {
    pub fn new(tier: DisclosureTier, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tier,
            weights: BTreeMap::new(),
            filters: BTreeMap::new(),
            hierarchy: BTreeMap::new(),
            targets: BTreeMap::new(),
            limit: None,
            hierarchy_weight: None,
            recency_weight: None,
        }
    }

    pub fn weight(mut self, space: &str, weight: f64) -> Self {
        self.weights.insert(space.to_string(), weight);
        self
    }

    pub fn filter(mut self, attribute: &str, filter: Filter) -> Self {
        self.filters.insert(attribute.to_string(), filter);
        self
    }

    pub fn within<I, S>(mut self, dimension: &str, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hierarchy.insert(dimension.to_string(), HierarchyPath::new(path));
        self
    }

    pub fn target_label(mut self, space: &str, label: &str) -> Self {
        self.targets.insert(space.to_string(), SpaceTarget::Label(label.to_string()));
        self
    }

    pub fn target_number(mut self, space: &str, value: f64) -> Self {
        self.targets.insert(space.to_string(), SpaceTarget::Number(value));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn hierarchy_weight(mut self, weight: f64) -> Self {
        self.hierarchy_weight = Some(weight);
        self
    }

    pub fn recency_weight(mut self, weight: f64) -> Self {
        self.recency_weight = Some(weight);
        self
    }
}

/// How the router obtains the per-space query.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupQuery {
    /// Embed the query text with `model` at routing time.
    Embed { model: String },
    Resolved(SpaceQuery),
}

#[derive(Debug, Clone)]
pub struct PlannedLookup {
    pub space: SpaceHandle,
    pub weight: f64,
    pub query: LookupQuery,
}

#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub tier: DisclosureTier,
    pub entity: EntityKind,
    /// `None` when the caller supplied explicit weights.
    pub preset_version: Option<u32>,
    pub text: String,
    /// Positive-weight lookups, ordered by space name.
    pub lookups: Vec<PlannedLookup>,
    pub filters: BTreeMap<String, Filter>,
    pub hierarchy: BTreeMap<String, HierarchyPath>,
    pub hierarchy_weight: f64,
    pub recency_weight: f64,
    pub limit: usize,
    /// Per-space top-K.
    pub candidate_k: usize,
    pub primary_space: Option<String>,
    /// Primary space queried only for the tie-break when no weighted lookup
    /// covers it. Its hits neither add candidates nor contribute to scores.
    pub tie_break: Option<PlannedLookup>,
}

impl QueryPlan {
    pub fn total_weight(&self) -> f64 {
        self.lookups.iter().map(|l| l.weight).sum()
    }

    pub fn space_names(&self) -> impl Iterator<Item = &str> {
        self.lookups.iter().map(|l| l.space.name.as_str())
    }
}

pub struct QueryComposer {
    registry: Arc<SpaceRegistry>,
    hierarchy: Arc<HierarchyResolver>,
    presets: TierPresets,
    retrieval: RetrievalSettings,
    primary_spaces: BTreeMap<EntityKind, String>,
}

impl QueryComposer {
    pub fn new(
        registry: Arc<SpaceRegistry>,
        hierarchy: Arc<HierarchyResolver>,
        presets: TierPresets,
        retrieval: RetrievalSettings,
        primary_spaces: BTreeMap<EntityKind, String>,
    ) -> Self {
        Self { registry, hierarchy, presets, retrieval, primary_spaces }
    }

    pub fn presets(&self) -> &TierPresets {
        &self.presets
    }

    pub fn compose(&self, spec: &QuerySpec) -> Result<QueryPlan> {
        let preset = self.presets.for_tier(spec.tier);
        let entity = preset.entity;
        let limit = self.limit(spec.limit)?;

        let explicit = !spec.weights.is_empty();
        let weights = if explicit { &spec.weights } else { &preset.weights };

        // Resolve every named space before judging any weight so typos surface
        // even when the weight is zero.
        let mut weighted = Vec::with_capacity(weights.len());
        for (name, weight) in weights {
            weighted.push((self.registry.resolve(name)?, *weight));
        }
        for (space, weight) in &weighted {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::InvalidWeight {
                    space: space.name.clone(),
                    reason: format!("weight must be finite and >= 0, got {weight}"),
                });
            }
            if space.entity != entity {
                return Err(Error::InvalidWeight {
                    space: space.name.clone(),
                    reason: format!("space indexes {} but tier '{}' ranks {}", space.entity, spec.tier, entity),
                });
            }
        }

        for (name, target) in &spec.targets {
            let space = self.registry.resolve(name)?;
            check_target(&space, target)?;
        }
        for (attribute, filter) in &spec.filters {
            self.check_filter(attribute, filter)?;
        }
        for (dimension, path) in &spec.hierarchy {
            self.hierarchy.validate_target(dimension, path)?;
        }

        let hierarchy_weight = factor_weight("hierarchy", spec.hierarchy_weight, preset.hierarchy_weight)?;
        let recency_weight = factor_weight("recency", spec.recency_weight, preset.recency_weight)?;

        let has_text = !spec.text.trim().is_empty();
        let mut lookups = Vec::new();
        for (space, weight) in weighted {
            if weight == 0.0 {
                continue;
            }
            let query = match &space.kind {
                SpaceKind::Vector { model, .. } => {
                    if !has_text {
                        continue;
                    }
                    LookupQuery::Embed { model: model.clone() }
                }
                SpaceKind::Categorical { .. } => match spec.targets.get(&space.name) {
                    Some(SpaceTarget::Label(label)) => LookupQuery::Resolved(SpaceQuery::Label(label.clone())),
                    _ => {
                        return Err(Error::invalid_filter(
                            &space.name,
                            "weighted categorical space requires a target label",
                        ))
                    }
                },
                SpaceKind::Numeric { min, max, mode } => {
                    let target = match spec.targets.get(&space.name) {
                        Some(SpaceTarget::Number(v)) => Some(*v),
                        _ => None,
                    };
                    if *mode == NumericMode::Nearest && target.is_none() {
                        return Err(Error::invalid_filter(&space.name, "nearest mode requires a target number"));
                    }
                    LookupQuery::Resolved(SpaceQuery::Numeric { min: *min, max: *max, mode: *mode, target })
                }
            };
            lookups.push(PlannedLookup { space, weight, query });
        }

        if lookups.is_empty() {
            let reason = if weights.values().all(|w| *w == 0.0) {
                "total space weight is zero"
            } else {
                "no weighted space can contribute; vector spaces need query text"
            };
            return Err(Error::EmptyQuery { reason: reason.into() });
        }

        let primary_space = self.primary_spaces.get(&entity).cloned();
        let tie_break = match &primary_space {
            Some(name) if has_text && !lookups.iter().any(|l| &l.space.name == name) => {
                self.tie_break_lookup(name)
            }
            _ => None,
        };

        let candidate_k = limit
            .saturating_mul(self.retrieval.fan_out_factor)
            .min(self.retrieval.max_candidates_per_space)
            .max(limit);

        Ok(QueryPlan {
            tier: spec.tier,
            entity,
            preset_version: (!explicit).then_some(preset.version),
            text: spec.text.clone(),
            lookups,
            filters: spec.filters.clone(),
            hierarchy: spec.hierarchy.clone(),
            hierarchy_weight,
            recency_weight,
            limit,
            candidate_k,
            primary_space,
            tie_break,
        })
    }

    fn tie_break_lookup(&self, name: &str) -> Option<PlannedLookup> {
        let space = self.registry.resolve(name).ok()?;
        let model = match &space.kind {
            SpaceKind::Vector { model, .. } => model.clone(),
            _ => return None,
        };
        Some(PlannedLookup { space, weight: 0.0, query: LookupQuery::Embed { model } })
    }

    fn limit(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            Some(0) => Err(Error::invalid_filter("limit", "limit must be at least 1")),
            Some(n) => Ok(n.min(self.retrieval.max_limit)),
            None => Ok(self.retrieval.default_limit),
        }
    }

    /// Filters name document attributes; chunk payloads inherit them.
    fn check_filter(&self, attribute: &str, filter: &Filter) -> Result<()> {
        let schema = &self.registry.schemas().document;
        let kind = schema
            .kind_of(attribute)
            .ok_or_else(|| Error::invalid_filter(attribute, "attribute is not declared on documents"))?;
        let spaces: Vec<&SpaceHandle> = self.registry.spaces_on(EntityKind::Document, attribute).collect();
        match filter {
            Filter::Equals(value) => {
                if kind != AttributeKind::Label {
                    return Err(Error::invalid_filter(attribute, "equality filters apply to label attributes"));
                }
                for space in spaces {
                    if let SpaceKind::Categorical { categories } = &space.kind {
                        if !categories.contains(value) {
                            return Err(Error::invalid_filter(
                                attribute,
                                format!("'{value}' is not a category of space '{}'", space.name),
                            ));
                        }
                    }
                }
            }
            Filter::Range { min, max } => {
                if kind != AttributeKind::Number {
                    return Err(Error::invalid_filter(attribute, "range filters apply to number attributes"));
                }
                if min.is_none() && max.is_none() {
                    return Err(Error::invalid_filter(attribute, "range needs at least one bound"));
                }
                if min.is_some_and(|v| !v.is_finite()) || max.is_some_and(|v| !v.is_finite()) {
                    return Err(Error::invalid_filter(attribute, "range bounds must be finite"));
                }
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(Error::invalid_filter(attribute, format!("range min {lo} exceeds max {hi}")));
                    }
                }
                for space in spaces {
                    if let SpaceKind::Numeric { min: s_min, max: s_max, .. } = &space.kind {
                        let disjoint = min.is_some_and(|lo| lo > *s_max) || max.is_some_and(|hi| hi < *s_min);
                        if disjoint {
                            return Err(Error::invalid_filter(
                                attribute,
                                format!("range lies outside [{s_min}, {s_max}] of space '{}'", space.name),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_target(space: &SpaceHandle, target: &SpaceTarget) -> Result<()> {
    match (&space.kind, target) {
        (SpaceKind::Categorical { categories }, SpaceTarget::Label(label)) => {
            if categories.contains(label) {
                Ok(())
            } else {
                Err(Error::invalid_filter(&space.name, format!("'{label}' is not a declared category")))
            }
        }
        (SpaceKind::Numeric { min, max, .. }, SpaceTarget::Number(v)) => {
            if v.is_finite() && *v >= *min && *v <= *max {
                Ok(())
            } else {
                Err(Error::invalid_filter(&space.name, format!("target {v} lies outside [{min}, {max}]")))
            }
        }
        (kind, _) => Err(Error::invalid_filter(
            &space.name,
            format!("target type does not fit a {} space", kind.name()),
        )),
    }
}

fn factor_weight(name: &str, requested: Option<f64>, preset: f64) -> Result<f64> {
    let weight = requested.unwrap_or(preset);
    if is_unit_weight(weight) {
        Ok(weight)
    } else {
        Err(Error::InvalidWeight {
            space: name.to_string(),
            reason: format!("{name} weight must lie in [0, 1], got {weight}"),
        })
    }
}

/// Factor weights interpolate between no effect and the full configured
/// boost, so they are bounded by 1.
pub fn is_unit_weight(weight: f64) -> bool {
    weight.is_finite() && (0.0..=1.0).contains(&weight)
}
