mod common;

use std::sync::Arc;

use lexrank_core::config::EngineConfig;
use lexrank_core::error::Error;
use lexrank_core::registry::SpaceRegistry;
use lexrank_core::schema::Schemas;
use lexrank_core::space::SpaceDefinition;
use lexrank_core::types::{EntityKind, HierarchyPath};
use lexrank_embed::{EmbedderSet, HashEmbedder};
use lexrank_engine::RankingEngine;
use lexrank_vector::InMemoryBackend;

use common::{chunk, harness, harness_with, DocBuilder};

fn invalid_document_id(err: Error) -> String {
    match err {
        Error::InvalidDocument { id, .. } => id,
        other => panic!("expected InvalidDocument, got {other:?}"),
    }
}

#[tokio::test]
async fn indexing_writes_payloads_and_one_vector_per_text_attribute() {
    let h = harness();
    let doc = DocBuilder::new("lease")
        .body("The lessor shall return the deposit. Late returns accrue interest.")
        .summary("deposit return")
        .kind("statute")
        .jurisdiction(&["us", "texas"])
        .build();
    let end = doc.body.chars().count();
    let chunks = vec![chunk(&doc, 0, 0, 36), chunk(&doc, 1, 30, end)];
    let report = h.engine.index(std::slice::from_ref(&doc), &chunks).await.expect("index");

    assert_eq!(report.documents, 1);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.vectors["title"], 1);
    assert_eq!(report.vectors["content"], 1);
    assert_eq!(report.vectors["summary"], 1);
    assert_eq!(report.vectors["passage"], 2);
    assert!(!report.vectors.contains_key("facts"));
    assert_eq!(h.backend.vector_count("passage"), 2);
}

#[tokio::test]
async fn invalid_documents_are_rejected_and_nothing_is_written() {
    let h = harness();
    let good = DocBuilder::new("good").body("text").build();
    let cases = vec![
        DocBuilder::new("conf").confidence(120.0).build(),
        DocBuilder::new("nan").confidence(f64::NAN).build(),
        DocBuilder::new("cycle").jurisdiction(&["us", "texas", "us"]).build(),
        DocBuilder::new("blank").jurisdiction(&["us", " "]).build(),
        DocBuilder::new("memo").kind("memo").build(),
        DocBuilder::new("undeclared").derived("headnote", "x").build(),
    ];
    for bad in cases {
        let id = bad.id.clone();
        let err = h.engine.index(&[good.clone(), bad], &[]).await.expect_err("invalid");
        assert_eq!(invalid_document_id(err), id);
    }
    let err = h.engine.index(&[good.clone(), good.clone()], &[]).await.expect_err("duplicate");
    assert_eq!(invalid_document_id(err), "good");
    assert_eq!(h.backend.vector_count("content"), 0);
}

#[tokio::test]
async fn invalid_chunks_are_rejected() {
    let h = harness();
    let doc = DocBuilder::new("lease").body("0123456789abcdefghij").build();

    let mut wrong_text = chunk(&doc, 0, 0, 5);
    wrong_text.text = "01235".into();
    let mut out_of_bounds = chunk(&doc, 0, 0, 5);
    out_of_bounds.span.end = 25;
    let mut orphan = chunk(&doc, 0, 0, 5);
    orphan.parent_id = "missing".into();
    let cases = vec![
        vec![wrong_text],
        vec![out_of_bounds],
        vec![orphan],
        vec![chunk(&doc, 1, 0, 5), chunk(&doc, 0, 5, 10)],
        vec![chunk(&doc, 0, 5, 10), chunk(&doc, 1, 0, 5)],
    ];
    for chunks in cases {
        let err = h.engine.index(std::slice::from_ref(&doc), &chunks).await.expect_err("invalid chunk");
        assert_eq!(err.code(), "invalid_document", "{chunks:?}");
    }
    assert_eq!(h.backend.vector_count("passage"), 0);
}

#[tokio::test]
async fn chunks_may_arrive_out_of_index_order() {
    let h = harness();
    let doc = DocBuilder::new("lease").body("0123456789abcdefghij").build();
    let shuffled = vec![chunk(&doc, 2, 12, 20), chunk(&doc, 0, 0, 6), chunk(&doc, 1, 6, 12)];
    let report = h
        .engine
        .index(std::slice::from_ref(&doc), &shuffled)
        .await
        .expect("valid decomposition in any order");
    assert_eq!(report.chunks, 3);
    assert_eq!(h.backend.vector_count("passage"), 3);

    let mut twin = chunk(&doc, 1, 0, 6);
    twin.id = "lease#twin".into();
    let duplicate_index = vec![chunk(&doc, 1, 6, 12), twin];
    let err = h
        .engine
        .index(std::slice::from_ref(&doc), &duplicate_index)
        .await
        .expect_err("repeated index");
    assert_eq!(err.code(), "invalid_document");
}

#[tokio::test]
async fn chunk_overlap_is_bounded() {
    let mut config = EngineConfig::default();
    config.ingest.max_chunk_overlap = 2;
    let h = harness_with(config);
    let doc = DocBuilder::new("lease").body("0123456789abcdefghij").build();

    let ok = vec![chunk(&doc, 0, 0, 10), chunk(&doc, 1, 8, 20)];
    h.engine.index(std::slice::from_ref(&doc), &ok).await.expect("overlap of 2");

    let too_much = vec![chunk(&doc, 0, 0, 10), chunk(&doc, 1, 7, 20)];
    let err = h
        .engine
        .index(std::slice::from_ref(&doc), &too_much)
        .await
        .expect_err("overlap of 3");
    assert_eq!(err.code(), "invalid_document");
}

#[tokio::test]
async fn taxonomy_constrains_document_paths() {
    let mut config = EngineConfig::default();
    config.hierarchy[0].taxonomy = vec![
        HierarchyPath::new(["us", "texas", "houston"]),
        HierarchyPath::new(["us", "new_york"]),
    ];
    let h = harness_with(config);

    let inside = DocBuilder::new("tx").jurisdiction(&["us", "texas"]).build();
    h.engine.index(&[inside], &[]).await.expect("prefix of a declared path is a node");

    let orphan = DocBuilder::new("dallas").jurisdiction(&["us", "texas", "dallas"]).build();
    let err = h.engine.index(&[orphan], &[]).await.expect_err("not a node");
    assert_eq!(invalid_document_id(err), "dallas");
}

fn build_error(config: &EngineConfig, registry: SpaceRegistry, embedders: EmbedderSet) -> Error {
    match RankingEngine::new(config, registry, embedders, Arc::new(InMemoryBackend::new())) {
        Ok(_) => panic!("engine should not build"),
        Err(e) => e,
    }
}

fn sealed_default(config: &EngineConfig) -> SpaceRegistry {
    SpaceRegistry::from_definitions(config.schema.clone(), config.spaces.clone()).expect("registry")
}

#[test]
fn engine_rejects_misconfiguration() {
    let config = EngineConfig::default();
    let embedders = EmbedderSet::hashed_for(&config);

    let mut unsealed = SpaceRegistry::new(Schemas::default());
    unsealed
        .register(SpaceDefinition::vector("content", EntityKind::Document, "body", "hash-v1", 256))
        .expect("register");
    assert_eq!(build_error(&config, unsealed, embedders.clone()).code(), "configuration");

    let err = build_error(&config, sealed_default(&config), EmbedderSet::new());
    assert_eq!(err.code(), "configuration");

    let narrow = EmbedderSet::new().with(Arc::new(HashEmbedder::new("hash-v1", 8)));
    assert_eq!(build_error(&config, sealed_default(&config), narrow).code(), "configuration");

    let mut bad_boosts = config.clone();
    bad_boosts.hierarchy[0].boosts.ancestor = 2.0;
    assert_eq!(build_error(&bad_boosts, sealed_default(&config), embedders.clone()).code(), "configuration");

    let mut ghost = config.clone();
    ghost.presets.discovery.weights.insert("ghost".into(), 1.0);
    assert_eq!(build_error(&ghost, sealed_default(&config), embedders.clone()).code(), "configuration");

    let mut cross = config.clone();
    cross.presets.deep_dive.weights.insert("summary".into(), 1.0);
    assert_eq!(build_error(&cross, sealed_default(&config), embedders.clone()).code(), "configuration");

    let mut strong_recency = config.clone();
    strong_recency.presets.discovery.recency_weight = 2.0;
    assert_eq!(
        build_error(&strong_recency, sealed_default(&config), embedders.clone()).code(),
        "configuration"
    );

    let mut primary = config.clone();
    primary.primary_spaces.insert(EntityKind::Chunk, "content".into());
    assert_eq!(build_error(&primary, sealed_default(&config), embedders).code(), "configuration");
}
