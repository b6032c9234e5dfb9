use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

use lexrank_core::filter::Filter;
use lexrank_core::space::SpaceQuery;
use lexrank_core::traits::{SimilarityBackend, SpaceSearch, VectorRecord};
use lexrank_core::types::{EntityKind, Payload};
use lexrank_vector::LanceBackend;

fn payload(id: &str, status: &str) -> Payload {
    let mut labels = BTreeMap::new();
    labels.insert("review_status".to_string(), status.to_string());
    Payload {
        id: id.to_string(),
        entity: EntityKind::Document,
        origin: None,
        labels,
        numbers: BTreeMap::new(),
        paths: BTreeMap::new(),
        published_at: Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).single().expect("date"),
    }
}

fn unit(v: [f32; 3]) -> Vec<f32> {
    let n = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / n).collect()
}

#[tokio::test]
async fn lance_round_trip_search_and_payloads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let uri = dir.path().join("db");
    let backend = LanceBackend::open(uri.to_str().expect("utf8 path")).await.expect("open");

    backend
        .put_payloads(vec![payload("d1", "reviewed"), payload("d2", "pending"), payload("d'3", "reviewed")])
        .await
        .expect("payloads");
    backend
        .upsert_vectors(
            "content",
            vec![
                VectorRecord { id: "d1".into(), vector: unit([1.0, 0.0, 0.0]) },
                VectorRecord { id: "d2".into(), vector: unit([0.9, 0.1, 0.0]) },
                VectorRecord { id: "d'3".into(), vector: unit([0.0, 1.0, 0.0]) },
            ],
        )
        .await
        .expect("vectors");

    let request = SpaceSearch {
        space: "content".into(),
        entity: EntityKind::Document,
        attribute: "body".into(),
        query: SpaceQuery::Vector(unit([1.0, 0.0, 0.0])),
        k: 2,
        filters: BTreeMap::new(),
    };
    let hits = backend.search(request.clone()).await.expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "d1");
    assert!(hits[0].similarity > 0.99);
    assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.similarity)));

    let mut filtered = request;
    filtered.filters.insert("review_status".into(), Filter::equals("pending"));
    let hits = backend.search(filtered).await.expect("filtered search");
    assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["d2"]);

    let found = backend
        .payloads(EntityKind::Document, vec!["d'3".into(), "missing".into()])
        .await
        .expect("lookup");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0], payload("d'3", "reviewed"));
}

#[tokio::test]
async fn lance_upsert_replaces_and_missing_space_is_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = LanceBackend::open(dir.path().to_str().expect("utf8 path")).await.expect("open");

    backend.put_payloads(vec![payload("d1", "pending")]).await.expect("first");
    backend.put_payloads(vec![payload("d1", "reviewed")]).await.expect("second");
    let found = backend.payloads(EntityKind::Document, vec!["d1".into()]).await.expect("lookup");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].labels["review_status"], "reviewed");

    let hits = backend
        .search(SpaceSearch {
            space: "never_written".into(),
            entity: EntityKind::Document,
            attribute: "body".into(),
            query: SpaceQuery::Vector(vec![1.0, 0.0]),
            k: 5,
            filters: BTreeMap::new(),
        })
        .await
        .expect("search");
    assert!(hits.is_empty());

    let labelled = backend
        .search(SpaceSearch {
            space: "review_status".into(),
            entity: EntityKind::Document,
            attribute: "review_status".into(),
            query: SpaceQuery::Label("reviewed".into()),
            k: 5,
            filters: BTreeMap::new(),
        })
        .await
        .expect("label search");
    assert_eq!(labelled.len(), 1);
}

#[tokio::test]
async fn relative_storage_uri_resolves_against_base() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = lexrank_core::config::StorageSettings { uri: "nested/index".into() };
    let backend = LanceBackend::from_settings(&storage, dir.path()).await.expect("open");
    backend.put_payloads(vec![payload("d1", "reviewed")]).await.expect("payloads");
    assert!(dir.path().join("nested").join("index").exists());
    let found = backend
        .payloads(EntityKind::Document, vec!["d1".into()])
        .await
        .expect("payloads");
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn selective_filter_still_finds_distant_matches() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = LanceBackend::open(dir.path().join("db").to_str().expect("utf8 path"))
        .await
        .expect("open");

    // 60 near neighbours fail the filter; the only match is far from the query.
    let mut payloads: Vec<Payload> = (0..60).map(|i| payload(&format!("p{i}"), "pending")).collect();
    payloads.push(payload("target", "reviewed"));
    backend.put_payloads(payloads).await.expect("payloads");
    let mut records: Vec<VectorRecord> = (0..60)
        .map(|i| VectorRecord { id: format!("p{i}"), vector: unit([1.0, 0.01 * i as f32, 0.0]) })
        .collect();
    records.push(VectorRecord { id: "target".into(), vector: unit([0.0, 0.0, 1.0]) });
    backend.upsert_vectors("content", records).await.expect("vectors");

    let request = SpaceSearch {
        space: "content".into(),
        entity: EntityKind::Document,
        attribute: "body".into(),
        query: SpaceQuery::Vector(unit([1.0, 0.0, 0.0])),
        k: 2,
        filters: BTreeMap::from([("review_status".to_string(), Filter::equals("reviewed"))]),
    };
    let hits = backend.search(request).await.expect("search");
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["target"]);
}
