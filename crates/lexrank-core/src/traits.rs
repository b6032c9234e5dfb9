use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::BackendError;
use crate::filter::Filter;
use crate::space::SpaceQuery;
use crate::types::{DocId, EntityKind, Payload};

/// External embedding function for one model.
pub trait Embedder: Send + Sync {
    /// Stable model identity; spaces reference embedders by this id.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// One per-space lookup issued by the router.
#[derive(Debug, Clone)]
pub struct SpaceSearch {
    pub space: String,
    pub entity: EntityKind,
    pub attribute: String,
    pub query: SpaceQuery,
    pub k: usize,
    /// Pushdown hint; callers re-check filters on payloads.
    pub filters: BTreeMap<String, Filter>,
}

/// Raw similarity of one entity in one space. Higher is better.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceHit {
    pub id: DocId,
    pub similarity: f64,
}

/// A vector stored for one entity in one vector space.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: DocId,
    pub vector: Vec<f32>,
}

/// External similarity search and payload storage.
///
/// Implementations own their consistency guarantees; reads after writes are
/// not required to observe the write.
#[async_trait]
pub trait SimilarityBackend: Send + Sync {
    /// Insert or replace vectors of one space.
    async fn upsert_vectors(&self, space: &str, records: Vec<VectorRecord>) -> Result<(), BackendError>;

    /// Insert or replace payloads.
    async fn put_payloads(&self, payloads: Vec<Payload>) -> Result<(), BackendError>;

    /// Top-`k` entities of `request.entity` in one space, best first.
    async fn search(&self, request: SpaceSearch) -> Result<Vec<SpaceHit>, BackendError>;

    /// Payloads for the given ids. Unknown ids are skipped.
    async fn payloads(&self, entity: EntityKind, ids: Vec<DocId>) -> Result<Vec<Payload>, BackendError>;
}
