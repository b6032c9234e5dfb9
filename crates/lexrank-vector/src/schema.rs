//! Arrow schemas of the LanceDB tables.
//!
//! One vector table per vector space (`space__<name>`) and one payload table
//! per entity (`payload__<entity>`), all keyed by `id`.
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

use lexrank_core::types::EntityKind;

pub fn vector_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
            true,
        ),
    ]))
}

pub fn payload_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("payload_json", DataType::Utf8, false),
    ]))
}

pub fn vector_table(space: &str) -> String {
    format!("space__{space}")
}

pub fn payload_table(entity: EntityKind) -> String {
    format!("payload__{}", entity.as_str())
}
