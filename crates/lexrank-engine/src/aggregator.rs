//! Score Aggregator.
//!
//! `final = (sum of weight * similarity) * hierarchy_boost * recency_multiplier`
//!
//! The sum runs in space-name order, so the score of a candidate is bitwise
//! independent of the order lookups were planned or answered in. Spaces that
//! did not return a candidate contribute similarity 0. The primary space's
//! raw similarity breaks score ties even when it carries no weight.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use lexrank_core::types::{ChunkOrigin, DocId, Payload};

use crate::composer::QueryPlan;
use crate::hierarchy::{HierarchyResolver, MatchTier};
use crate::recency::RecencyScorer;
use crate::router::Routed;

/// One space's share of a final score.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Contribution {
    pub space: String,
    pub weight: f64,
    /// Raw similarity in `[0, 1]`.
    pub similarity: f64,
    /// `weight * similarity * hierarchy_boost * recency_multiplier`.
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoreBreakdown {
    pub weighted_sum: f64,
    pub hierarchy_boost: f64,
    pub tiers: BTreeMap<String, MatchTier>,
    pub recency_multiplier: f64,
    pub primary_similarity: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedResult {
    pub id: DocId,
    pub score: f64,
    /// Partial scores, largest first; they sum to `score`.
    pub contributions: Vec<Contribution>,
    /// Owning document and offsets for chunk results.
    pub parent: Option<ChunkOrigin>,
    pub breakdown: ScoreBreakdown,
}

/// Score desc, then primary similarity desc, then id asc.
pub fn rank_order(a: &RankedResult, b: &RankedResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.breakdown.primary_similarity.total_cmp(&a.breakdown.primary_similarity))
        .then_with(|| a.id.cmp(&b.id))
}

pub struct ScoreAggregator {
    hierarchy: Arc<HierarchyResolver>,
    recency: RecencyScorer,
}

impl ScoreAggregator {
    pub fn new(hierarchy: Arc<HierarchyResolver>, recency: RecencyScorer) -> Self {
        Self { hierarchy, recency }
    }

    pub fn recency(&self) -> &RecencyScorer {
        &self.recency
    }

    pub fn aggregate(&self, plan: &QueryPlan, routed: &Routed, now: DateTime<Utc>) -> Vec<RankedResult> {
        let similarity: HashMap<&str, HashMap<&str, f64>> = routed
            .hits
            .iter()
            .map(|(space, hits)| {
                let by_id = hits.iter().map(|h| (h.id.as_str(), h.similarity)).collect();
                (space.as_str(), by_id)
            })
            .collect();

        let mut terms: Vec<(&str, f64)> = plan.lookups.iter().map(|l| (l.space.name.as_str(), l.weight)).collect();
        terms.sort_by(|a, b| a.0.cmp(b.0));

        let mut results: Vec<RankedResult> = routed
            .payloads
            .values()
            .map(|payload| self.score(plan, payload, &terms, &similarity, now))
            .collect();
        results.sort_by(rank_order);
        results.truncate(plan.limit);
        results
    }

    fn score(
        &self,
        plan: &QueryPlan,
        payload: &Payload,
        terms: &[(&str, f64)],
        similarity: &HashMap<&str, HashMap<&str, f64>>,
        now: DateTime<Utc>,
    ) -> RankedResult {
        let lookup = |space: &str| {
            similarity
                .get(space)
                .and_then(|hits| hits.get(payload.id.as_str()))
                .copied()
                .unwrap_or(0.0)
        };

        let mut weighted_sum = 0.0;
        let mut raw = Vec::with_capacity(terms.len());
        for &(space, weight) in terms {
            let s = lookup(space);
            weighted_sum += weight * s;
            raw.push((space, weight, s));
        }

        let hierarchy = self.hierarchy.resolve(&payload.paths, &plan.hierarchy, plan.hierarchy_weight);
        let recency_multiplier = self.recency.weighted_multiplier(payload.published_at, now, plan.recency_weight);
        let factor = hierarchy.boost * recency_multiplier;

        let mut contributions: Vec<Contribution> = raw
            .into_iter()
            .map(|(space, weight, similarity)| Contribution {
                space: space.to_string(),
                weight,
                similarity,
                score: weight * similarity * factor,
            })
            .collect();
        contributions.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.space.cmp(&b.space)));

        RankedResult {
            id: payload.id.clone(),
            score: weighted_sum * factor,
            contributions,
            parent: payload.origin.clone(),
            breakdown: ScoreBreakdown {
                weighted_sum,
                hierarchy_boost: hierarchy.boost,
                tiers: hierarchy.tiers,
                recency_multiplier,
                primary_similarity: plan.primary_space.as_deref().map_or(0.0, lookup),
            },
        }
    }
}
