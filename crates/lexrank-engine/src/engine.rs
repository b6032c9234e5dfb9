//! `RankingEngine`: the query and introspection surface.
//!
//! A query is a single stateless pass `composed -> routed -> aggregated ->
//! returned`. Each stage logs one structured event; a failure at any stage
//! aborts the pass with a typed error.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use lexrank_core::config::{EngineConfig, HierarchySettings, PresetSettings, RecencySettings, RetrievalSettings};
use lexrank_core::error::{Error, Result};
use lexrank_core::registry::SpaceRegistry;
use lexrank_core::space::{SpaceDefinition, SpaceKind};
use lexrank_core::traits::SimilarityBackend;
use lexrank_core::types::{Chunk, Document, EntityKind};
use lexrank_embed::EmbedderSet;

use crate::aggregator::{RankedResult, ScoreAggregator};
use crate::cancel::CancellationToken;
use crate::composer::{QueryComposer, QueryPlan, QuerySpec};
use crate::hierarchy::HierarchyResolver;
use crate::indexer::{IndexReport, Indexer};
use crate::presets::TierPresets;
use crate::recency::RecencyScorer;
use crate::router::RetrievalRouter;

/// Per-query execution context.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
    /// Clock used for recency; defaults to the wall clock.
    pub now: Option<DateTime<Utc>>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }
}

/// Sealed configuration as seen by diagnostic tooling.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub sealed: bool,
    pub spaces: Vec<SpaceDefinition>,
    pub hierarchy: Vec<HierarchySettings>,
    pub recency: RecencySettings,
    pub presets: PresetSettings,
    pub retrieval: RetrievalSettings,
    pub primary_spaces: BTreeMap<EntityKind, String>,
}

pub struct RankingEngine {
    registry: Arc<SpaceRegistry>,
    composer: QueryComposer,
    router: RetrievalRouter,
    aggregator: ScoreAggregator,
    indexer: Indexer,
    snapshot: EngineSnapshot,
}

impl RankingEngine {
    /// Build the registry from `config.spaces` and wire the engine.
    pub fn from_config(
        config: &EngineConfig,
        embedders: EmbedderSet,
        backend: Arc<dyn SimilarityBackend>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = SpaceRegistry::from_definitions(config.schema.clone(), config.spaces.clone())?;
        Self::new(config, registry, embedders, backend)
    }

    /// Wire the engine around an already sealed registry.
    pub fn new(
        config: &EngineConfig,
        registry: SpaceRegistry,
        embedders: EmbedderSet,
        backend: Arc<dyn SimilarityBackend>,
    ) -> Result<Self> {
        if !registry.is_sealed() {
            return Err(Error::config("registry must be sealed before serving queries"));
        }
        config.validate()?;
        check_embedders(&registry, &embedders)?;
        check_primary_spaces(&registry, &config.primary_spaces)?;

        let registry = Arc::new(registry);
        let hierarchy = Arc::new(HierarchyResolver::new(&config.hierarchy, registry.schemas())?);
        let presets = TierPresets::new(config.presets.clone(), &registry)?;
        let recency = RecencyScorer::new(&config.recency)?;

        let snapshot = EngineSnapshot {
            sealed: registry.is_sealed(),
            spaces: registry.spaces().map(|s| s.definition().clone()).collect(),
            hierarchy: config.hierarchy.clone(),
            recency: config.recency.clone(),
            presets: config.presets.clone(),
            retrieval: config.retrieval.clone(),
            primary_spaces: config.primary_spaces.clone(),
        };

        tracing::info!(
            spaces = registry.len(),
            dimensions = hierarchy.dimensions().len(),
            models = embedders.model_ids().count(),
            "ranking engine ready"
        );

        Ok(Self {
            composer: QueryComposer::new(
                Arc::clone(&registry),
                Arc::clone(&hierarchy),
                presets,
                config.retrieval.clone(),
                config.primary_spaces.clone(),
            ),
            router: RetrievalRouter::new(Arc::clone(&backend), embedders.clone()),
            aggregator: ScoreAggregator::new(Arc::clone(&hierarchy), recency),
            indexer: Indexer::new(
                Arc::clone(&registry),
                hierarchy,
                embedders,
                backend,
                config.ingest.max_chunk_overlap,
            ),
            registry,
            snapshot,
        })
    }

    pub fn registry(&self) -> &SpaceRegistry {
        &self.registry
    }

    pub async fn index(&self, documents: &[Document], chunks: &[Chunk]) -> Result<IndexReport> {
        self.indexer.index(documents, chunks).await
    }

    /// Validate a query without touching the backend.
    pub fn compose(&self, spec: &QuerySpec) -> Result<QueryPlan> {
        self.composer.compose(spec)
    }

    pub async fn query(&self, spec: &QuerySpec) -> Result<Vec<RankedResult>> {
        self.query_with(spec, &QueryContext::default()).await
    }

    pub async fn query_with(&self, spec: &QuerySpec, ctx: &QueryContext) -> Result<Vec<RankedResult>> {
        let started = std::time::Instant::now();
        let elapsed_ms = || started.elapsed().as_millis() as u64;

        let plan = self.composer.compose(spec).map_err(|e| {
            tracing::debug!(stage = "composed", tier = %spec.tier, error = %e, "query rejected");
            e
        })?;
        tracing::debug!(
            stage = "composed",
            tier = %plan.tier,
            entity = %plan.entity,
            lookups = plan.lookups.len(),
            tie_break = plan.tie_break.is_some(),
            candidate_k = plan.candidate_k,
            limit = plan.limit,
            "query composed"
        );

        let routed = self.router.route(&plan, &ctx.cancel, ctx.deadline).await.map_err(|e| {
            tracing::warn!(stage = "routed", tier = %plan.tier, code = e.code(), error = %e, "query aborted");
            e
        })?;
        tracing::debug!(
            stage = "routed",
            tier = %plan.tier,
            candidates = routed.candidate_count(),
            dropped = routed.dropped,
            elapsed_ms = elapsed_ms(),
            "candidates collected"
        );

        let now = ctx.now.unwrap_or_else(Utc::now);
        let results = self.aggregator.aggregate(&plan, &routed, now);
        tracing::debug!(stage = "aggregated", tier = %plan.tier, results = results.len(), "scores aggregated");

        tracing::info!(
            stage = "returned",
            tier = %plan.tier,
            results = results.len(),
            elapsed_ms = elapsed_ms(),
            "query complete"
        );
        Ok(results)
    }

    pub fn introspect(&self) -> EngineSnapshot {
        self.snapshot.clone()
    }
}

fn check_embedders(registry: &SpaceRegistry, embedders: &EmbedderSet) -> Result<()> {
    for space in registry.spaces() {
        if let SpaceKind::Vector { model, dimensions } = &space.kind {
            let embedder = embedders
                .get(model)
                .map_err(|_| Error::config(format!("space '{}': no embedder for model '{model}'", space.name)))?;
            if embedder.dim() != *dimensions {
                return Err(Error::config(format!(
                    "space '{}': model '{model}' produces {} dimensions, space declares {dimensions}",
                    space.name,
                    embedder.dim()
                )));
            }
        }
    }
    Ok(())
}

fn check_primary_spaces(registry: &SpaceRegistry, primary: &BTreeMap<EntityKind, String>) -> Result<()> {
    for (entity, name) in primary {
        let space = registry
            .resolve(name)
            .map_err(|_| Error::config(format!("primary space '{name}' for {entity} is not registered")))?;
        if space.entity != *entity {
            return Err(Error::config(format!(
                "primary space '{name}' belongs to {}, not {entity}",
                space.entity
            )));
        }
    }
    Ok(())
}
