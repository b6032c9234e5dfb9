//! Multi-space ranking for legal retrieval.
//!
//! A query names spaces and weights (or takes a disclosure-tier preset),
//! is composed into a validated plan, fanned out to the similarity backend,
//! and aggregated into deterministic, explained rankings.

pub mod aggregator;
pub mod cancel;
pub mod composer;
pub mod engine;
pub mod hierarchy;
pub mod indexer;
pub mod presets;
pub mod recency;
pub mod router;

pub use aggregator::{Contribution, RankedResult, ScoreBreakdown};
pub use cancel::CancellationToken;
pub use composer::{QueryPlan, QuerySpec, SpaceTarget};
pub use engine::{EngineSnapshot, QueryContext, RankingEngine};
pub use hierarchy::MatchTier;
pub use indexer::IndexReport;
