//! Declared attributes per entity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Chunk, Document, EntityKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Text,
    Label,
    Number,
    Path,
    Timestamp,
}

/// Attribute name -> kind for one entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct EntitySchema {
    attributes: BTreeMap<String, AttributeKind>,
}

impl EntitySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, kind: AttributeKind) -> Self {
        self.attributes.insert(name.to_string(), kind);
        self
    }

    pub fn declare(&mut self, name: &str, kind: AttributeKind) {
        self.attributes.insert(name.to_string(), kind);
    }

    pub fn kind_of(&self, name: &str) -> Option<AttributeKind> {
        self.attributes.get(name).copied()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, AttributeKind)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Annotated legal document: body plus upstream-derived text fields.
    pub fn legal_document() -> Self {
        Self::new()
            .with(Document::TITLE, AttributeKind::Text)
            .with(Document::BODY, AttributeKind::Text)
            .with("summary", AttributeKind::Text)
            .with("key_findings", AttributeKind::Text)
            .with("facts", AttributeKind::Text)
            .with("provisions", AttributeKind::Text)
            .with("compliance_notes", AttributeKind::Text)
            .with("citations", AttributeKind::Text)
            .with("kind", AttributeKind::Label)
            .with("review_status", AttributeKind::Label)
            .with(Document::CONFIDENCE, AttributeKind::Number)
            .with("jurisdiction", AttributeKind::Path)
            .with("practice_area", AttributeKind::Path)
            .with(Document::PUBLISHED_AT, AttributeKind::Timestamp)
    }

    pub fn legal_chunk() -> Self {
        Self::new()
            .with(Chunk::TEXT, AttributeKind::Text)
            .with(Chunk::CONTEXT, AttributeKind::Text)
    }
}

/// Schemas for both entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schemas {
    pub document: EntitySchema,
    pub chunk: EntitySchema,
}

impl Schemas {
    pub fn for_entity(&self, entity: EntityKind) -> &EntitySchema {
        match entity {
            EntityKind::Document => &self.document,
            EntityKind::Chunk => &self.chunk,
        }
    }
}

impl Default for Schemas {
    fn default() -> Self {
        Self {
            document: EntitySchema::legal_document(),
            chunk: EntitySchema::legal_chunk(),
        }
    }
}
