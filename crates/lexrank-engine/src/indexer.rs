//! Ingestion-side indexing: validate, embed, write payloads and vectors.
//!
//! Extraction, chunking and enrichment happen upstream; this only accepts
//! finished documents and their chunk decompositions.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use lexrank_core::chunk::validate_chunks;
use lexrank_core::error::{BackendError, Error, Result};
use lexrank_core::registry::{SpaceHandle, SpaceRegistry};
use lexrank_core::schema::AttributeKind;
use lexrank_core::space::SpaceKind;
use lexrank_core::traits::{SimilarityBackend, VectorRecord};
use lexrank_core::types::{Chunk, Document, EntityKind, Payload};
use lexrank_embed::EmbedderSet;

use crate::hierarchy::HierarchyResolver;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    /// Vectors written per space.
    pub vectors: BTreeMap<String, usize>,
}

pub struct Indexer {
    registry: Arc<SpaceRegistry>,
    hierarchy: Arc<HierarchyResolver>,
    embedders: EmbedderSet,
    backend: Arc<dyn SimilarityBackend>,
    max_chunk_overlap: usize,
}

impl Indexer {
    pub fn new(
        registry: Arc<SpaceRegistry>,
        hierarchy: Arc<HierarchyResolver>,
        embedders: EmbedderSet,
        backend: Arc<dyn SimilarityBackend>,
        max_chunk_overlap: usize,
    ) -> Self {
        Self { registry, hierarchy, embedders, backend, max_chunk_overlap }
    }

    /// Validate the whole batch first; nothing is written if any entity is
    /// rejected.
    pub async fn index(&self, documents: &[Document], chunks: &[Chunk]) -> Result<IndexReport> {
        let parents = self.validate_documents(documents)?;
        self.validate_chunks(&parents, chunks)?;

        let mut payloads: Vec<Payload> = documents.iter().map(Document::payload).collect();
        for chunk in chunks {
            if let Some(parent) = parents.get(chunk.parent_id.as_str()) {
                payloads.push(chunk.payload(parent));
            }
        }

        let mut vectors = BTreeMap::new();
        let mut pending = Vec::new();
        for space in self.registry.spaces() {
            let SpaceKind::Vector { model, .. } = &space.kind else {
                continue;
            };
            let texts: Vec<(String, String)> = match space.entity {
                EntityKind::Document => documents
                    .iter()
                    .filter_map(|d| non_empty(d.text(&space.attribute)).map(|t| (d.id.clone(), t)))
                    .collect(),
                EntityKind::Chunk => chunks
                    .iter()
                    .filter_map(|c| non_empty(c.text(&space.attribute)).map(|t| (c.id.clone(), t)))
                    .collect(),
            };
            if texts.is_empty() {
                continue;
            }
            let records = self.embed(space, model, texts)?;
            vectors.insert(space.name.clone(), records.len());
            pending.push((space.name.clone(), records));
        }

        self.backend
            .put_payloads(payloads)
            .await
            .map_err(|e| e.into_error("payloads"))?;
        for (space, records) in pending {
            self.backend
                .upsert_vectors(&space, records)
                .await
                .map_err(|e| e.into_error(&space))?;
        }

        let report = IndexReport { documents: documents.len(), chunks: chunks.len(), vectors };
        tracing::info!(
            documents = report.documents,
            chunks = report.chunks,
            spaces = report.vectors.len(),
            "indexed batch"
        );
        Ok(report)
    }

    fn validate_documents<'a>(&self, documents: &'a [Document]) -> Result<HashMap<&'a str, &'a Document>> {
        let schema = &self.registry.schemas().document;
        let mut by_id = HashMap::with_capacity(documents.len());
        for doc in documents {
            if doc.id.trim().is_empty() {
                return Err(Error::invalid_document(&doc.id, "identifier is empty"));
            }
            if by_id.insert(doc.id.as_str(), doc).is_some() {
                return Err(Error::invalid_document(&doc.id, "identifier appears twice in the batch"));
            }
            if !doc.confidence.is_finite() || !(0.0..=100.0).contains(&doc.confidence) {
                return Err(Error::invalid_document(
                    &doc.id,
                    format!("confidence {} outside [0, 100]", doc.confidence),
                ));
            }
            let declared = doc
                .labels
                .keys()
                .map(|k| (k, AttributeKind::Label))
                .chain(doc.paths.keys().map(|k| (k, AttributeKind::Path)))
                .chain(doc.derived.keys().map(|k| (k, AttributeKind::Text)));
            for (attribute, expected) in declared {
                if schema.kind_of(attribute) != Some(expected) {
                    return Err(Error::invalid_document(
                        &doc.id,
                        format!("attribute '{attribute}' is not a declared {expected:?} attribute"),
                    ));
                }
            }
            for space in self.registry.spaces_for(EntityKind::Document) {
                if let SpaceKind::Categorical { categories } = &space.kind {
                    if let Some(label) = doc.labels.get(&space.attribute) {
                        if !categories.contains(label) {
                            return Err(Error::invalid_document(
                                &doc.id,
                                format!("'{label}' is not a category of space '{}'", space.name),
                            ));
                        }
                    }
                }
            }
            self.hierarchy.validate_document(doc)?;
        }
        Ok(by_id)
    }

    fn validate_chunks(&self, parents: &HashMap<&str, &Document>, chunks: &[Chunk]) -> Result<()> {
        let mut ids = HashSet::with_capacity(chunks.len());
        let mut by_parent: BTreeMap<&str, Vec<&Chunk>> = BTreeMap::new();
        for chunk in chunks {
            if chunk.id.trim().is_empty() {
                return Err(Error::invalid_document(&chunk.id, "chunk identifier is empty"));
            }
            if !ids.insert(chunk.id.as_str()) {
                return Err(Error::invalid_document(&chunk.id, "identifier appears twice in the batch"));
            }
            if !parents.contains_key(chunk.parent_id.as_str()) {
                return Err(Error::invalid_document(
                    &chunk.id,
                    format!("parent '{}' is not part of the batch", chunk.parent_id),
                ));
            }
            by_parent.entry(chunk.parent_id.as_str()).or_default().push(chunk);
        }
        for (parent_id, mut group) in by_parent {
            // Order checks follow chunk indices, not arrival order.
            group.sort_by_key(|c| c.index);
            if let Some(parent) = parents.get(parent_id) {
                validate_chunks(parent, &group, self.max_chunk_overlap)?;
            }
        }
        Ok(())
    }

    fn embed(&self, space: &SpaceHandle, model: &str, texts: Vec<(String, String)>) -> Result<Vec<VectorRecord>> {
        let fail = |message: String| BackendError::new("embedding", message).into_error(&space.name);
        let embedder = self.embedders.get(model).map_err(|e| fail(e.to_string()))?;
        let (ids, batch): (Vec<String>, Vec<String>) = texts.into_iter().unzip();
        let vectors = embedder.embed_batch(&batch).map_err(|e| fail(e.to_string()))?;
        if vectors.len() != ids.len() {
            return Err(fail(format!("model '{model}' returned {} vectors for {} texts", vectors.len(), ids.len())));
        }
        if let Some(v) = vectors.iter().find(|v| v.len() != embedder.dim()) {
            return Err(fail(format!("model '{model}' returned {} dimensions, expected {}", v.len(), embedder.dim())));
        }
        Ok(ids
            .into_iter()
            .zip(vectors)
            .map(|(id, vector)| VectorRecord { id, vector })
            .collect())
    }
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty()).map(str::to_string)
}
