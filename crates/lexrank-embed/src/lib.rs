//! Embedding-function adapters.
//!
//! Model inference is external to the engine. This crate provides the
//! deterministic hashing embedder used for development and tests, a
//! content-hash keyed cache, and the set that maps model ids to embedders.
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use twox_hash::XxHash64;

use lexrank_core::config::EngineConfig;
use lexrank_core::space::SpaceKind;
use lexrank_core::traits::Embedder;

pub mod cache;
pub mod pool;

pub use cache::CachedEmbedder;
pub use pool::l2_normalize;

/// Bag-of-tokens feature hashing into `dim` buckets, L2-normalized.
///
/// Texts sharing tokens land close together, which is enough to exercise
/// ranking end to end without a model.
pub struct HashEmbedder {
    model_id: String,
    dim: usize,
}

impl HashEmbedder {
    pub fn new(model_id: &str, dim: usize) -> Self {
        Self { model_id: model_id.to_string(), dim: dim.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Embedders keyed by model id.
#[derive(Clone, Default)]
pub struct EmbedderSet {
    by_model: HashMap<String, Arc<dyn Embedder>>,
}

impl EmbedderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, embedder: Arc<dyn Embedder>) {
        self.by_model.insert(embedder.model_id().to_string(), embedder);
    }

    pub fn with(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.insert(embedder);
        self
    }

    pub fn get(&self, model_id: &str) -> Result<&Arc<dyn Embedder>> {
        self.by_model
            .get(model_id)
            .ok_or_else(|| anyhow!("no embedder registered for model '{}'", model_id))
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.by_model.keys().map(String::as_str)
    }

    /// One cached hashing embedder per vector model declared in `config`.
    pub fn hashed_for(config: &EngineConfig) -> Self {
        let mut set = Self::new();
        for space in &config.spaces {
            if let SpaceKind::Vector { model, dimensions } = &space.kind {
                if set.by_model.contains_key(model) {
                    continue;
                }
                tracing::debug!(model = %model, dimensions, "using hashing embedder");
                let inner = Arc::new(HashEmbedder::new(model, *dimensions));
                set.insert(Arc::new(CachedEmbedder::new(inner)));
            }
        }
        set
    }
}
