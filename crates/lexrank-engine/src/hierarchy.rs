//! Hierarchy Resolver.
//!
//! Each dimension (jurisdiction, practice area, ...) compares a document's
//! path with the query's target path and maps the resulting match tier to a
//! boost. Dimensions are resolved independently and combined by product.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use lexrank_core::config::{HierarchySettings, TierBoosts};
use lexrank_core::error::{Error, Result};
use lexrank_core::schema::{AttributeKind, Schemas};
use lexrank_core::types::{Document, HierarchyPath, Paths};

/// How a document path relates to a query target path.
///
/// Variants are declared weakest first so `Ord` follows boost order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchTier {
    None,
    Descendant,
    Ancestor,
    Exact,
}

impl MatchTier {
    pub const ALL: [MatchTier; 4] = [Self::Exact, Self::Ancestor, Self::Descendant, Self::None];

    pub fn boost(self, boosts: &TierBoosts) -> f64 {
        match self {
            Self::Exact => boosts.exact,
            Self::Ancestor => boosts.ancestor,
            Self::Descendant => boosts.descendant,
            Self::None => boosts.none,
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "EXACT",
            Self::Ancestor => "ANCESTOR",
            Self::Descendant => "DESCENDANT",
            Self::None => "NONE",
        })
    }
}

/// Pure tier function. An empty path on either side never matches.
pub fn resolve_tier(document: &HierarchyPath, query: &HierarchyPath) -> MatchTier {
    if document.is_empty() || query.is_empty() {
        MatchTier::None
    } else if document == query {
        MatchTier::Exact
    } else if query.is_strict_prefix_of(document) {
        MatchTier::Ancestor
    } else if document.is_strict_prefix_of(query) {
        MatchTier::Descendant
    } else {
        MatchTier::None
    }
}

/// `1 + weight * (boost - 1)` with `weight` clamped to `[0, 1]`; weight 0
/// disables the boost and weight 1 applies it in full.
pub fn weighted_boost(boost: f64, weight: f64) -> f64 {
    let weight = if weight.is_nan() { 0.0 } else { weight.clamp(0.0, 1.0) };
    1.0 + weight * (boost - 1.0)
}

/// Non-empty, no blank labels, no label repeated along the path.
pub fn check_path(path: &HierarchyPath) -> std::result::Result<(), String> {
    if path.is_empty() {
        return Err("path is empty".into());
    }
    let mut seen = HashSet::new();
    for label in path.labels() {
        if label.trim().is_empty() {
            return Err(format!("path {path} has an empty label"));
        }
        if !seen.insert(label.as_str()) {
            return Err(format!("path {path} repeats label '{label}'"));
        }
    }
    Ok(())
}

/// Fixed root tree. Every prefix of a declared path is a node.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    nodes: BTreeSet<Vec<String>>,
}

impl Taxonomy {
    pub fn new(dimension: &str, paths: &[HierarchyPath]) -> Result<Self> {
        let mut nodes = BTreeSet::new();
        for path in paths {
            check_path(path).map_err(|reason| Error::config(format!("hierarchy '{dimension}': {reason}")))?;
            for prefix in path.prefixes() {
                nodes.insert(prefix.to_vec());
            }
        }
        Ok(Self { nodes })
    }

    /// An empty taxonomy accepts any well-formed path.
    pub fn is_unconstrained(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, path: &HierarchyPath) -> bool {
        self.is_unconstrained() || self.nodes.contains(path.labels())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct HierarchyDimension {
    pub settings: HierarchySettings,
    pub taxonomy: Taxonomy,
}

impl HierarchyDimension {
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn attribute(&self) -> &str {
        &self.settings.attribute
    }

    pub fn boost(&self, tier: MatchTier) -> f64 {
        tier.boost(&self.settings.boosts)
    }

    /// Check a path against the dimension's taxonomy.
    pub fn check(&self, path: &HierarchyPath) -> std::result::Result<(), String> {
        check_path(path)?;
        if !self.taxonomy.contains(path) {
            return Err(format!("path {path} is not a node of the '{}' taxonomy", self.name()));
        }
        Ok(())
    }
}

/// Combined hierarchy boost and the tier each targeted dimension matched.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyOutcome {
    pub boost: f64,
    pub tiers: BTreeMap<String, MatchTier>,
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyResolver {
    dimensions: Vec<HierarchyDimension>,
}

impl HierarchyResolver {
    /// Validate boosts, attributes and taxonomies of every dimension.
    pub fn new(settings: &[HierarchySettings], schemas: &Schemas) -> Result<Self> {
        let mut names = HashSet::new();
        let mut dimensions = Vec::with_capacity(settings.len());
        for dim in settings {
            if !names.insert(dim.name.as_str()) {
                return Err(Error::config(format!("hierarchy dimension '{}' declared twice", dim.name)));
            }
            dim.boosts.validate(&dim.name)?;
            match schemas.document.kind_of(&dim.attribute) {
                Some(AttributeKind::Path) => {}
                Some(other) => {
                    return Err(Error::config(format!(
                        "hierarchy '{}': attribute '{}' is {:?}, expected a path",
                        dim.name, dim.attribute, other
                    )))
                }
                None => {
                    return Err(Error::config(format!(
                        "hierarchy '{}': attribute '{}' is not declared on documents",
                        dim.name, dim.attribute
                    )))
                }
            }
            let taxonomy = Taxonomy::new(&dim.name, &dim.taxonomy)?;
            dimensions.push(HierarchyDimension { settings: dim.clone(), taxonomy });
        }
        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> &[HierarchyDimension] {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&HierarchyDimension> {
        self.dimensions.iter().find(|d| d.name() == name)
    }

    /// Query targets may be partial, but must be taxonomy nodes.
    pub fn validate_target(&self, dimension: &str, path: &HierarchyPath) -> Result<()> {
        let dim = self
            .dimension(dimension)
            .ok_or_else(|| Error::invalid_filter(dimension, "unknown hierarchy dimension"))?;
        dim.check(path).map_err(|reason| Error::invalid_filter(dimension, reason))
    }

    /// Ingestion-time check of every hierarchy path a document carries.
    pub fn validate_document(&self, document: &Document) -> Result<()> {
        for dim in &self.dimensions {
            if let Some(path) = document.paths.get(dim.attribute()) {
                dim.check(path)
                    .map_err(|reason| Error::invalid_document(&document.id, format!("{}: {reason}", dim.attribute())))?;
            }
        }
        Ok(())
    }

    /// Resolve every targeted dimension against `paths` and multiply the
    /// weighted boosts. Untargeted dimensions do not contribute.
    pub fn resolve(&self, paths: &Paths, targets: &BTreeMap<String, HierarchyPath>, weight: f64) -> HierarchyOutcome {
        let mut boost = 1.0;
        let mut tiers = BTreeMap::new();
        for (name, target) in targets {
            let Some(dim) = self.dimension(name) else {
                continue;
            };
            let tier = paths
                .get(dim.attribute())
                .map_or(MatchTier::None, |path| resolve_tier(path, target));
            boost *= weighted_boost(dim.boost(tier), weight);
            tiers.insert(name.clone(), tier);
        }
        HierarchyOutcome { boost, tiers }
    }
}
