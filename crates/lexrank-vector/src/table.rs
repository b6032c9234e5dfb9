//! LanceDB connection and table housekeeping.
use anyhow::Result;
use arrow_array::{RecordBatch, RecordBatchIterator};
use lancedb::{connect, Connection};
use std::sync::Arc;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await?;
    Ok(names.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

/// Insert or replace rows keyed by `id`, creating the table from the batch
/// when it does not exist yet.
pub async fn upsert_batch(conn: &Connection, name: &str, batch: RecordBatch) -> Result<()> {
    let schema = batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    if !table_exists(conn, name).await? {
        conn.create_table(name, reader).execute().await?;
        return Ok(());
    }
    let table = conn.open_table(name).execute().await?;
    let mut mi = table.merge_insert(&["id"]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    mi.execute(reader).await?;
    Ok(())
}
