//! LanceDB-backed similarity backend.
//!
//! Vector spaces are ANN searches with cosine distance over the space's
//! table. Label and numeric spaces scan the entity's payload table and score
//! each payload in process. Filters are applied here on payloads; LanceDB
//! never sees them, so filtered vector searches widen their fetch until
//! enough rows pass.
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, StringArray};
use async_trait::async_trait;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use lexrank_core::config::StorageSettings;
use lexrank_core::error::BackendError;
use lexrank_core::filter::matches_all;
use lexrank_core::space::SpaceQuery;
use lexrank_core::traits::{SimilarityBackend, SpaceHit, SpaceSearch, VectorRecord};
use lexrank_core::types::{DocId, EntityKind, Payload};

use crate::rank_hits;
use crate::schema::{payload_schema, payload_table, vector_schema, vector_table};
use crate::table::{ensure_table, open_db, table_exists, upsert_batch};

/// Initial over-fetch factor for filtered vector searches.
const FILTERED_OVERFETCH: usize = 4;

fn lance_err(e: impl std::fmt::Display) -> BackendError {
    BackendError::new("lancedb", e.to_string())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, BackendError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| lance_err(format!("column '{name}' missing")))
}

fn quote_ids(ids: &[DocId]) -> String {
    ids.iter()
        .map(|id| format!("'{}'", id.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct LanceBackend {
    db: Connection,
}

impl LanceBackend {
    pub async fn open(uri: &str) -> anyhow::Result<Self> {
        tracing::info!(uri, "opening lancedb backend");
        let db = open_db(uri).await?;
        for entity in [EntityKind::Document, EntityKind::Chunk] {
            ensure_table(&db, &payload_table(entity), payload_schema()).await?;
        }
        Ok(Self { db })
    }

    /// Open the directory named by `storage.uri`, resolved against `base`.
    pub async fn from_settings(storage: &StorageSettings, base: &Path) -> anyhow::Result<Self> {
        let dir = storage.resolve(base);
        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(&dir.to_string_lossy()).await
    }

    pub fn connection(&self) -> &Connection {
        &self.db
    }

    async fn scan_payloads(&self, entity: EntityKind, predicate: Option<String>) -> Result<Vec<Payload>, BackendError> {
        let table = self
            .db
            .open_table(payload_table(entity))
            .execute()
            .await
            .map_err(lance_err)?;
        let mut query = table.query();
        if let Some(predicate) = predicate {
            query = query.only_if(predicate);
        }
        let mut stream = query.execute().await.map_err(lance_err)?;
        let mut out = Vec::new();
        while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await.map_err(lance_err)? {
            let json = string_column(&batch, "payload_json")?;
            for i in 0..batch.num_rows() {
                let payload: Payload = serde_json::from_str(json.value(i))
                    .map_err(|e| BackendError::new("corrupt_payload", e.to_string()))?;
                out.push(payload);
            }
        }
        Ok(out)
    }

    async fn payload_map(&self, entity: EntityKind, ids: Vec<DocId>) -> Result<HashMap<DocId, Payload>, BackendError> {
        Ok(self
            .payloads(entity, ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect())
    }

    async fn vector_search(&self, request: &SpaceSearch, query: &[f32]) -> Result<Vec<SpaceHit>, BackendError> {
        let name = vector_table(&request.space);
        if !table_exists(&self.db, &name).await.map_err(lance_err)? {
            return Ok(Vec::new());
        }
        let table = self.db.open_table(&name).execute().await.map_err(lance_err)?;
        if request.filters.is_empty() {
            return ann(&table, query, request.k).await;
        }

        // Filters run on payloads after the ANN stage; widen the fetch until
        // `k` rows pass or every row of the table has been seen.
        let rows = table.count_rows(None).await.map_err(lance_err)?;
        let mut fetch = request.k.saturating_mul(FILTERED_OVERFETCH).max(1);
        loop {
            let mut hits = ann(&table, query, fetch.min(rows)).await?;
            if !hits.is_empty() {
                let payloads = self
                    .payload_map(request.entity, hits.iter().map(|h| h.id.clone()).collect())
                    .await?;
                hits.retain(|h| payloads.get(&h.id).is_some_and(|p| matches_all(&request.filters, p)));
            }
            if hits.len() >= request.k || fetch >= rows {
                tracing::debug!(space = %request.space, fetch, kept = hits.len(), "filtered vector search");
                return Ok(hits);
            }
            fetch = fetch.saturating_mul(2);
        }
    }
}

async fn ann(table: &Table, query: &[f32], limit: usize) -> Result<Vec<SpaceHit>, BackendError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let mut results = table
        .vector_search(query.to_vec())
        .map_err(lance_err)?
        .distance_type(DistanceType::Cosine)
        .limit(limit)
        .execute()
        .await
        .map_err(lance_err)?;

    let mut hits = Vec::new();
    while let Some(batch) = futures::TryStreamExt::try_next(&mut results).await.map_err(lance_err)? {
        let ids = string_column(&batch, "id")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| lance_err("column '_distance' missing"))?;
        for i in 0..batch.num_rows() {
            let similarity = (1.0 - f64::from(distances.value(i))).clamp(0.0, 1.0);
            hits.push(SpaceHit { id: ids.value(i).to_string(), similarity });
        }
    }
    Ok(hits)
}

#[async_trait]
impl SimilarityBackend for LanceBackend {
    async fn upsert_vectors(&self, space: &str, records: Vec<VectorRecord>) -> Result<(), BackendError> {
        let Some(dim) = records.first().map(|r| r.vector.len()) else {
            return Ok(());
        };
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dim) {
            return Err(BackendError::new(
                "dimension_mismatch",
                format!("vector for '{}' has {} dimensions, expected {}", bad.id, bad.vector.len(), dim),
            ));
        }
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let vectors = records
            .into_iter()
            .map(|r| Some(r.vector.into_iter().map(Some).collect::<Vec<_>>()));
        let batch = RecordBatch::try_new(
            vector_schema(dim),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
                    vectors,
                    dim as i32,
                )),
            ],
        )
        .map_err(lance_err)?;
        tracing::debug!(space, rows = batch.num_rows(), "upserting vectors");
        upsert_batch(&self.db, &vector_table(space), batch).await.map_err(lance_err)
    }

    async fn put_payloads(&self, payloads: Vec<Payload>) -> Result<(), BackendError> {
        let mut by_entity: HashMap<EntityKind, (Vec<String>, Vec<String>)> = HashMap::new();
        for payload in payloads {
            let json = serde_json::to_string(&payload).map_err(|e| BackendError::new("encode", e.to_string()))?;
            let (ids, rows) = by_entity.entry(payload.entity).or_default();
            ids.push(payload.id);
            rows.push(json);
        }
        for (entity, (ids, rows)) in by_entity {
            let batch = RecordBatch::try_new(
                payload_schema(),
                vec![Arc::new(StringArray::from(ids)), Arc::new(StringArray::from(rows))],
            )
            .map_err(lance_err)?;
            tracing::debug!(entity = %entity, rows = batch.num_rows(), "upserting payloads");
            upsert_batch(&self.db, &payload_table(entity), batch).await.map_err(lance_err)?;
        }
        Ok(())
    }

    async fn search(&self, request: SpaceSearch) -> Result<Vec<SpaceHit>, BackendError> {
        let hits = match &request.query {
            SpaceQuery::Vector(query) => self.vector_search(&request, query).await?,
            query => self
                .scan_payloads(request.entity, None)
                .await?
                .into_iter()
                .filter(|p| matches_all(&request.filters, p))
                .filter_map(|p| {
                    query
                        .score_payload(&request.attribute, &p)
                        .filter(|s| *s > 0.0)
                        .map(|similarity| SpaceHit { id: p.id, similarity })
                })
                .collect(),
        };
        Ok(rank_hits(hits, request.k))
    }

    async fn payloads(&self, entity: EntityKind, ids: Vec<DocId>) -> Result<Vec<Payload>, BackendError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.scan_payloads(entity, Some(format!("id IN ({})", quote_ids(&ids)))).await
    }
}
