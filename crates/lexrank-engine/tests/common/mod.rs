#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use lexrank_core::config::EngineConfig;
use lexrank_core::types::{Chunk, Document, HierarchyPath, Span};
use lexrank_embed::EmbedderSet;
use lexrank_engine::RankingEngine;
use lexrank_vector::InMemoryBackend;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("valid date")
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

pub struct DocBuilder(Document);

impl DocBuilder {
    pub fn new(id: &str) -> Self {
        Self(Document {
            id: id.to_string(),
            title: format!("Document {id}"),
            body: String::new(),
            labels: BTreeMap::new(),
            paths: BTreeMap::new(),
            derived: BTreeMap::new(),
            published_at: now(),
            confidence: 80.0,
        })
    }

    pub fn title(mut self, title: &str) -> Self {
        self.0.title = title.to_string();
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.0.body = body.to_string();
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.0.derived.insert("summary".into(), summary.to_string());
        self
    }

    pub fn derived(mut self, attribute: &str, text: &str) -> Self {
        self.0.derived.insert(attribute.into(), text.to_string());
        self
    }

    pub fn kind(mut self, kind: &str) -> Self {
        self.0.labels.insert("kind".into(), kind.to_string());
        self
    }

    pub fn jurisdiction(mut self, path: &[&str]) -> Self {
        self.0.paths.insert("jurisdiction".into(), HierarchyPath::new(path.iter().copied()));
        self
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.0.published_at = at;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.0.confidence = confidence;
        self
    }

    pub fn build(self) -> Document {
        self.0
    }
}

/// Chunk covering `[start, end)` chars of `parent.body`.
pub fn chunk(parent: &Document, index: u32, start: usize, end: usize) -> Chunk {
    let text: String = parent.body.chars().skip(start).take(end - start).collect();
    Chunk {
        id: format!("{}#{index}", parent.id),
        parent_id: parent.id.clone(),
        index,
        span: Span::new(start, end),
        text,
        context: None,
    }
}

pub struct Harness {
    pub engine: RankingEngine,
    pub backend: Arc<InMemoryBackend>,
}

/// Opt-in log output via `RUST_LOG`; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn harness_with(config: EngineConfig) -> Harness {
    init_tracing();
    let backend = Arc::new(InMemoryBackend::new());
    let embedders = EmbedderSet::hashed_for(&config);
    let engine = RankingEngine::from_config(&config, embedders, backend.clone()).expect("engine builds");
    Harness { engine, backend }
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub async fn indexed(config: EngineConfig, documents: &[Document], chunks: &[Chunk]) -> Harness {
    let h = harness_with(config);
    h.engine.index(documents, chunks).await.expect("index batch");
    h
}
