mod common;

use lexrank_core::chunk::slice_chars;
use lexrank_core::config::EngineConfig;
use lexrank_core::error::Error;
use lexrank_core::filter::Filter;
use lexrank_core::types::{ChunkOrigin, DisclosureTier};
use lexrank_engine::{MatchTier, QueryContext, QuerySpec};

use common::{chunk, days_ago, indexed, now, DocBuilder};

const DEPOSIT: &str = "tenant security deposit refund obligations";

#[tokio::test]
async fn newer_document_outranks_older_with_identical_content() {
    let mut config = EngineConfig::default();
    config.recency.half_life_days = 30.0;
    config.recency.boost_ceiling = 2.0;
    let docs = vec![
        DocBuilder::new("fresh").summary(DEPOSIT).published(now()).build(),
        DocBuilder::new("stale").summary(DEPOSIT).published(days_ago(60)).build(),
    ];
    let h = indexed(config, &docs, &[]).await;

    let spec = QuerySpec::new(DisclosureTier::Discovery, "security deposit refund")
        .weight("summary", 1.0)
        .recency_weight(1.0);
    let results = h
        .engine
        .query_with(&spec, &QueryContext::new().at(now()))
        .await
        .expect("query");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "fresh");
    assert!(results[0].score > results[1].score);
    assert!((results[0].breakdown.recency_multiplier - 2.0).abs() < 1e-12);
    let expected = 1.0 + (-2.0f64).exp();
    assert!((results[1].breakdown.recency_multiplier - expected).abs() < 1e-9);
    assert_eq!(results[0].breakdown.weighted_sum, results[1].breakdown.weighted_sum);
}

#[tokio::test]
async fn partial_jurisdiction_target_ranks_exact_then_ancestor_then_none() {
    let docs = vec![
        DocBuilder::new("houston").summary(DEPOSIT).jurisdiction(&["us", "texas", "houston"]).build(),
        DocBuilder::new("texas").summary(DEPOSIT).jurisdiction(&["us", "texas"]).build(),
        DocBuilder::new("new_york").summary(DEPOSIT).jurisdiction(&["us", "new_york"]).build(),
        DocBuilder::new("federal").summary(DEPOSIT).jurisdiction(&["us"]).build(),
    ];
    let h = indexed(EngineConfig::default(), &docs, &[]).await;

    let spec = QuerySpec::new(DisclosureTier::Exploration, "security deposit")
        .weight("summary", 1.0)
        .within("jurisdiction", ["us", "texas"])
        .hierarchy_weight(1.0)
        .recency_weight(0.0);
    let results = h.engine.query(&spec).await.expect("query");

    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["texas", "houston", "federal", "new_york"]);
    let tier = |id: &str| {
        results
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.breakdown.tiers["jurisdiction"])
            .expect("result present")
    };
    assert_eq!(tier("houston"), MatchTier::Ancestor);
    assert_eq!(tier("texas"), MatchTier::Exact);
    assert_eq!(tier("federal"), MatchTier::Descendant);
    assert_eq!(tier("new_york"), MatchTier::None);
    assert!((results[1].breakdown.hierarchy_boost - 1.25).abs() < 1e-12);
}

#[tokio::test]
async fn equality_filter_restricts_candidates() {
    let docs = vec![
        DocBuilder::new("s1").summary(DEPOSIT).kind("statute").build(),
        DocBuilder::new("c1").summary(DEPOSIT).kind("case_law").build(),
        DocBuilder::new("s2").summary("security deposit").kind("statute").build(),
    ];
    let h = indexed(EngineConfig::default(), &docs, &[]).await;

    let spec = QuerySpec::new(DisclosureTier::Discovery, "security deposit").filter("kind", Filter::equals("statute"));
    let results = h.engine.query(&spec).await.expect("query");
    let mut ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["s1", "s2"]);
}

#[tokio::test]
async fn confidence_acts_as_a_weighted_space() {
    let docs = vec![
        DocBuilder::new("low").summary(DEPOSIT).confidence(30.0).build(),
        DocBuilder::new("high").summary(DEPOSIT).confidence(90.0).build(),
    ];
    let h = indexed(EngineConfig::default(), &docs, &[]).await;

    let spec = QuerySpec::new(DisclosureTier::Discovery, "security deposit")
        .weight("summary", 1.0)
        .weight("quality", 0.5)
        .recency_weight(0.0);
    let results = h.engine.query(&spec).await.expect("query");
    assert_eq!(results[0].id, "high");
    let quality = results[0]
        .contributions
        .iter()
        .find(|c| c.space == "quality")
        .expect("quality contribution");
    assert!((quality.similarity - 0.9).abs() < 1e-12);
}

#[tokio::test]
async fn contributions_sum_to_score_and_limit_truncates() {
    let docs: Vec<_> = (0..6)
        .map(|i| {
            DocBuilder::new(&format!("d{i}"))
                .title(&format!("lease {i}"))
                .summary(if i % 2 == 0 { DEPOSIT } else { "security deposit interest" })
                .derived("key_findings", "deposit withheld without itemized list")
                .published(days_ago(i * 40))
                .build()
        })
        .collect();
    let h = indexed(EngineConfig::default(), &docs, &[]).await;

    let spec = QuerySpec::new(DisclosureTier::Discovery, "security deposit withheld").limit(4);
    let results = h
        .engine
        .query_with(&spec, &QueryContext::new().at(now()))
        .await
        .expect("query");
    assert_eq!(results.len(), 4);
    for r in &results {
        let sum: f64 = r.contributions.iter().map(|c| c.score).sum();
        assert!((sum - r.score).abs() < 1e-9, "{} sums to {sum}, score {}", r.id, r.score);
        assert!(r.score >= 0.0);
        assert!(r.contributions.windows(2).all(|w| w[0].score >= w[1].score));
    }
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn identical_queries_order_identically() {
    // Identical content everywhere forces the id tie-break.
    let docs: Vec<_> = ["c", "a", "b"]
        .iter()
        .map(|id| DocBuilder::new(id).title("lease").summary(DEPOSIT).build())
        .collect();
    let h = indexed(EngineConfig::default(), &docs, &[]).await;

    let spec = QuerySpec::new(DisclosureTier::Discovery, "deposit");
    let ctx = QueryContext::new().at(now());
    let first = h.engine.query_with(&spec, &ctx).await.expect("first");
    let second = h.engine.query_with(&spec, &ctx).await.expect("second");

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).expect("json"),
        serde_json::to_string(&second).expect("json")
    );
    let ids: Vec<&str> = first.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn score_ties_prefer_higher_primary_content_similarity() {
    let docs = vec![
        DocBuilder::new("a").title("lease").summary(DEPOSIT).body("maritime salvage award").build(),
        DocBuilder::new("b").title("lease").summary(DEPOSIT).body(DEPOSIT).build(),
    ];
    let h = indexed(EngineConfig::default(), &docs, &[]).await;

    // The discovery preset gives `content` zero weight.
    let spec = QuerySpec::new(DisclosureTier::Discovery, "security deposit refund");
    let results = h
        .engine
        .query_with(&spec, &QueryContext::new().at(now()))
        .await
        .expect("query");

    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(results[0].score, results[1].score);
    assert!(results[0].breakdown.primary_similarity > results[1].breakdown.primary_similarity);
    for r in &results {
        assert!(r.contributions.iter().all(|c| c.space != "content"));
        let sum: f64 = r.contributions.iter().map(|c| c.score).sum();
        assert!((sum - r.score).abs() < 1e-9);
    }
}

#[tokio::test]
async fn deep_dive_returns_chunks_with_parent_and_offsets() {
    let first = "The lessor shall return the security deposit within thirty days.";
    let second = "Disputes are resolved by arbitration in Harris County.";
    let doc = DocBuilder::new("lease")
        .body(&format!("{first} {second}"))
        .summary("residential lease")
        .jurisdiction(&["us", "texas", "houston"])
        .build();
    let start = first.chars().count() + 1;
    let end = doc.body.chars().count();
    let chunks = vec![chunk(&doc, 0, 0, first.chars().count()), chunk(&doc, 1, start, end)];
    let h = indexed(EngineConfig::default(), std::slice::from_ref(&doc), &chunks).await;

    let spec = QuerySpec::new(DisclosureTier::DeepDive, "arbitration Harris County disputes")
        .within("jurisdiction", ["us", "texas"]);
    let results = h.engine.query(&spec).await.expect("query");

    let top = &results[0];
    assert_eq!(top.id, "lease#1");
    let origin = top.parent.as_ref().expect("chunk results carry their parent");
    assert_eq!(
        origin,
        &ChunkOrigin { parent_id: "lease".into(), index: 1, span: chunks[1].span }
    );
    assert_eq!(slice_chars(&doc.body, origin.span), Some(second));
    // Chunks inherit the parent's jurisdiction.
    assert_eq!(top.breakdown.tiers["jurisdiction"], MatchTier::Ancestor);
}

#[tokio::test]
async fn backend_outage_fails_the_whole_query() {
    let docs = vec![DocBuilder::new("d1").summary(DEPOSIT).build()];
    let h = indexed(EngineConfig::default(), &docs, &[]).await;
    h.backend.set_available(false);

    let err = h
        .engine
        .query(&QuerySpec::new(DisclosureTier::Discovery, "deposit"))
        .await
        .expect_err("backend is down");
    match &err {
        Error::BackendUnavailable { space, code, .. } => {
            assert_eq!(space, "key_findings");
            assert_eq!(code, "unavailable");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn introspection_reports_sealed_configuration() {
    let h = common::harness();
    let snapshot = h.engine.introspect();
    assert!(snapshot.sealed);
    assert_eq!(snapshot.spaces.len(), EngineConfig::default().spaces.len());
    assert_eq!(snapshot.recency.boost_ceiling, 1.5);
    let json = serde_json::to_value(&snapshot).expect("snapshot serializes");
    assert_eq!(json["presets"]["deep_dive"]["entity"], "chunk");
    assert_eq!(json["primary_spaces"]["document"], "content");
}
