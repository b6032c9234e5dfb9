//! Retrieval Router.
//!
//! Fans one backend search per planned lookup out as a spawned task, joins
//! them all before anything is aggregated, then fetches payloads for the
//! candidate union in a single call. Any backend failure aborts the query.
//! On cancellation or deadline expiry the spawned calls run to completion
//! and their results are dropped.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

use lexrank_core::error::{BackendError, Error, Result};
use lexrank_core::filter::matches_all;
use lexrank_core::space::SpaceQuery;
use lexrank_core::traits::{SimilarityBackend, SpaceHit, SpaceSearch};
use lexrank_core::types::{DocId, Payload};
use lexrank_embed::EmbedderSet;

use crate::cancel::CancellationToken;
use crate::composer::{LookupQuery, QueryPlan};

/// Everything the aggregator needs, collected from a complete snapshot.
#[derive(Debug, Clone, Default)]
pub struct Routed {
    /// Raw hits per space name.
    pub hits: BTreeMap<String, Vec<SpaceHit>>,
    /// Payloads of candidates that exist and pass every filter.
    pub payloads: BTreeMap<DocId, Payload>,
    /// Candidates without a payload or rejected by a filter.
    pub dropped: usize,
}

impl Routed {
    pub fn candidate_count(&self) -> usize {
        self.payloads.len()
    }
}

pub struct RetrievalRouter {
    backend: Arc<dyn SimilarityBackend>,
    embedders: EmbedderSet,
}

/// Race `fut` against cancellation and an optional deadline.
async fn until_cancelled<F: Future>(fut: F, cancel: &CancellationToken, deadline: Option<Instant>) -> Result<F::Output> {
    let expiry = async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::QueryCancelled),
        () = expiry => Err(Error::QueryCancelled),
        out = fut => Ok(out),
    }
}

impl RetrievalRouter {
    pub fn new(backend: Arc<dyn SimilarityBackend>, embedders: EmbedderSet) -> Self {
        Self { backend, embedders }
    }

    pub fn embedders(&self) -> &EmbedderSet {
        &self.embedders
    }

    pub async fn route(&self, plan: &QueryPlan, cancel: &CancellationToken, deadline: Option<Instant>) -> Result<Routed> {
        if cancel.is_cancelled() {
            return Err(Error::QueryCancelled);
        }
        let searches = self.searches(plan)?;

        let handles: Vec<_> = searches
            .into_iter()
            .map(|search| {
                let backend = Arc::clone(&self.backend);
                let space = search.space.clone();
                (space, tokio::spawn(async move { backend.search(search).await }))
            })
            .collect();
        let (spaces, tasks): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
        let joined = until_cancelled(futures::future::join_all(tasks), cancel, deadline).await?;

        let mut hits = BTreeMap::new();
        for (space, outcome) in spaces.into_iter().zip(joined) {
            let result = outcome.map_err(|e| BackendError::new("task", e.to_string()).into_error(&space))?;
            let space_hits = result.map_err(|e| e.into_error(&space))?;
            tracing::debug!(space = %space, hits = space_hits.len(), "space searched");
            hits.insert(space, space_hits);
        }

        let tie_break = plan.tie_break.as_ref().map(|l| l.space.name.as_str());
        let candidates: BTreeSet<DocId> = hits
            .iter()
            .filter(|(space, _)| Some(space.as_str()) != tie_break)
            .flat_map(|(_, space_hits)| space_hits.iter().map(|h| h.id.clone()))
            .collect();
        let total = candidates.len();
        let mut payloads = BTreeMap::new();
        if !candidates.is_empty() {
            let backend = Arc::clone(&self.backend);
            let entity = plan.entity;
            let ids: Vec<DocId> = candidates.into_iter().collect();
            let task = tokio::spawn(async move { backend.payloads(entity, ids).await });
            let fetched = until_cancelled(task, cancel, deadline)
                .await?
                .map_err(|e| BackendError::new("task", e.to_string()).into_error("payloads"))?
                .map_err(|e| e.into_error("payloads"))?;
            for payload in fetched {
                if payload.entity == plan.entity && matches_all(&plan.filters, &payload) {
                    payloads.insert(payload.id.clone(), payload);
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(Error::QueryCancelled);
        }
        Ok(Routed { dropped: total - payloads.len(), hits, payloads })
    }

    /// One search per lookup plus the tie-break lookup, embedding the query
    /// text once per model.
    fn searches(&self, plan: &QueryPlan) -> Result<Vec<SpaceSearch>> {
        let mut embedded: HashMap<&str, Vec<f32>> = HashMap::new();
        let mut out = Vec::with_capacity(plan.lookups.len() + 1);
        for lookup in plan.lookups.iter().chain(&plan.tie_break) {
            let query = match &lookup.query {
                LookupQuery::Resolved(q) => q.clone(),
                LookupQuery::Embed { model } => {
                    if !embedded.contains_key(model.as_str()) {
                        let vector = self.embed(model, &plan.text).map_err(|e| e.into_error(&lookup.space.name))?;
                        embedded.insert(model.as_str(), vector);
                    }
                    SpaceQuery::Vector(embedded.get(model.as_str()).cloned().unwrap_or_default())
                }
            };
            out.push(SpaceSearch {
                space: lookup.space.name.clone(),
                entity: lookup.space.entity,
                attribute: lookup.space.attribute.clone(),
                query,
                k: plan.candidate_k,
                filters: plan.filters.clone(),
            });
        }
        Ok(out)
    }

    fn embed(&self, model: &str, text: &str) -> std::result::Result<Vec<f32>, BackendError> {
        let embedding_error = |e: anyhow::Error| BackendError::new("embedding", e.to_string());
        let embedder = self.embedders.get(model).map_err(embedding_error)?;
        let mut vectors = embedder.embed_batch(&[text.to_string()]).map_err(embedding_error)?;
        match vectors.pop() {
            Some(v) if v.len() == embedder.dim() => Ok(v),
            Some(v) => Err(BackendError::new(
                "embedding",
                format!("model '{model}' returned {} dimensions, expected {}", v.len(), embedder.dim()),
            )),
            None => Err(BackendError::new("embedding", format!("model '{model}' returned no vector"))),
        }
    }
}
