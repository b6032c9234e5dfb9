//! In-process similarity backend.
//!
//! Brute-force cosine search over per-space vector maps plus a payload map
//! per entity. Serves as the reference adapter and as the test double: its
//! availability can be toggled and every call is counted.
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use lexrank_core::error::BackendError;
use lexrank_core::filter::matches_all;
use lexrank_core::space::{vector_similarity, SpaceQuery};
use lexrank_core::traits::{SimilarityBackend, SpaceHit, SpaceSearch, VectorRecord};
use lexrank_core::types::{DocId, EntityKind, Payload};

use crate::rank_hits;

#[derive(Default)]
pub struct InMemoryBackend {
    vectors: RwLock<HashMap<String, BTreeMap<DocId, Vec<f32>>>>,
    payloads: RwLock<HashMap<EntityKind, BTreeMap<DocId, Payload>>>,
    unavailable: AtomicBool,
    search_calls: AtomicUsize,
    payload_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `unavailable`.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn payload_calls(&self) -> usize {
        self.payload_calls.load(Ordering::SeqCst)
    }

    /// Number of vectors stored for `space`.
    pub fn vector_count(&self, space: &str) -> usize {
        self.vectors
            .read()
            .map(|v| v.get(space).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::unavailable("in-memory backend marked unavailable"));
        }
        Ok(())
    }
}

fn poisoned() -> BackendError {
    BackendError::new("poisoned", "backend lock poisoned")
}

#[async_trait]
impl SimilarityBackend for InMemoryBackend {
    async fn upsert_vectors(&self, space: &str, records: Vec<VectorRecord>) -> Result<(), BackendError> {
        self.check_available()?;
        let mut vectors = self.vectors.write().map_err(|_| poisoned())?;
        let table = vectors.entry(space.to_string()).or_default();
        for record in records {
            table.insert(record.id, record.vector);
        }
        Ok(())
    }

    async fn put_payloads(&self, payloads: Vec<Payload>) -> Result<(), BackendError> {
        self.check_available()?;
        let mut stored = self.payloads.write().map_err(|_| poisoned())?;
        for payload in payloads {
            stored.entry(payload.entity).or_default().insert(payload.id.clone(), payload);
        }
        Ok(())
    }

    async fn search(&self, request: SpaceSearch) -> Result<Vec<SpaceHit>, BackendError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let payloads = self.payloads.read().map_err(|_| poisoned())?;
        let empty = BTreeMap::new();
        let entity_payloads = payloads.get(&request.entity).unwrap_or(&empty);
        let passes = |id: &str| {
            request.filters.is_empty()
                || entity_payloads
                    .get(id)
                    .is_some_and(|p| matches_all(&request.filters, p))
        };

        let hits: Vec<SpaceHit> = match &request.query {
            SpaceQuery::Vector(query) => {
                let vectors = self.vectors.read().map_err(|_| poisoned())?;
                vectors
                    .get(&request.space)
                    .map(|table| {
                        table
                            .iter()
                            .filter(|(id, _)| passes(id))
                            .map(|(id, v)| SpaceHit { id: id.clone(), similarity: vector_similarity(query, v) })
                            .collect()
                    })
                    .unwrap_or_default()
            }
            query => entity_payloads
                .values()
                .filter(|p| passes(&p.id))
                .filter_map(|p| {
                    query
                        .score_payload(&request.attribute, p)
                        .filter(|s| *s > 0.0)
                        .map(|similarity| SpaceHit { id: p.id.clone(), similarity })
                })
                .collect(),
        };
        Ok(rank_hits(hits, request.k))
    }

    async fn payloads(&self, entity: EntityKind, ids: Vec<DocId>) -> Result<Vec<Payload>, BackendError> {
        self.payload_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let payloads = self.payloads.read().map_err(|_| poisoned())?;
        Ok(payloads
            .get(&entity)
            .map(|stored| ids.iter().filter_map(|id| stored.get(id).cloned()).collect())
            .unwrap_or_default())
    }
}
