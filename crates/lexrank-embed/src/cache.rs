//! In-process embedding cache keyed by `(content_hash, model_id)`.
//!
//! The cache is consulted before calling the wrapped embedder and written
//! through on misses, so re-indexing unchanged attribute text is free.
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lexrank_core::traits::Embedder;

use crate::pool::check_dims;

pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    entries: Mutex<HashMap<String, Vec<f32>>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self { inner, entries: Mutex::new(HashMap::new()) }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Embedder for CachedEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let hashes: Vec<String> = texts.iter().map(|t| content_hash(t)).collect();
        let mut out: Vec<Option<Vec<f32>>> = {
            let entries = self.entries.lock().map_err(|_| anyhow!("embedding cache poisoned"))?;
            hashes.iter().map(|h| entries.get(h).cloned()).collect()
        };

        let misses: Vec<usize> = (0..texts.len()).filter(|i| out[*i].is_none()).collect();
        if !misses.is_empty() {
            let batch: Vec<String> = misses.iter().map(|i| texts[*i].clone()).collect();
            let fresh = self.inner.embed_batch(&batch)?;
            if fresh.len() != batch.len() {
                return Err(anyhow!(
                    "embedder '{}' returned {} vectors for {} texts",
                    self.model_id(),
                    fresh.len(),
                    batch.len()
                ));
            }
            check_dims(&fresh, self.dim())?;
            let mut entries = self.entries.lock().map_err(|_| anyhow!("embedding cache poisoned"))?;
            for (i, vector) in misses.into_iter().zip(fresh) {
                entries.insert(hashes[i].clone(), vector.clone());
                out[i] = Some(vector);
            }
        }

        out.into_iter()
            .map(|v| v.ok_or_else(|| anyhow!("embedding missing after cache fill")))
            .collect()
    }
}
