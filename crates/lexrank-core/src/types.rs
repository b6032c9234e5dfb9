//! Domain types shared by the registry, backends and the ranking engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type DocId = String;
pub type Labels = BTreeMap<String, String>;
pub type Numbers = BTreeMap<String, f64>;
pub type Paths = BTreeMap<String, HierarchyPath>;

/// The two indexable entities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Document,
    Chunk,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Chunk => "chunk",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progressive disclosure level requested by a caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DisclosureTier {
    /// Broad, low-precision discovery over documents.
    Discovery,
    /// Filtered exploration over documents.
    Exploration,
    /// Passage-level retrieval over chunks.
    DeepDive,
}

impl DisclosureTier {
    pub const ALL: [DisclosureTier; 3] = [Self::Discovery, Self::Exploration, Self::DeepDive];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Exploration => "exploration",
            Self::DeepDive => "deep_dive",
        }
    }
}

impl fmt::Display for DisclosureTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered taxonomy labels from the root down, e.g. `["us", "texas", "houston"]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct HierarchyPath(Vec<String>);

impl HierarchyPath {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `self` is a prefix of `other` and strictly shorter.
    pub fn is_strict_prefix_of(&self, other: &HierarchyPath) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    /// Every non-empty prefix, shortest first.
    pub fn prefixes(&self) -> impl Iterator<Item = &[String]> + '_ {
        (1..=self.0.len()).map(move |n| &self.0[..n])
    }
}

impl fmt::Display for HierarchyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

impl<S: Into<String>> FromIterator<S> for HierarchyPath {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// An annotated legal text as delivered by ingestion.
///
/// - `labels`: categorical attributes (document kind, review status)
/// - `paths`: hierarchical attributes (jurisdiction, practice area)
/// - `derived`: free-text attributes produced upstream (summary, facts, ...)
/// - `confidence`: upstream quality score in `[0, 100]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub derived: BTreeMap<String, String>,
    pub published_at: DateTime<Utc>,
    pub confidence: f64,
}

impl Document {
    pub const TITLE: &'static str = "title";
    pub const BODY: &'static str = "body";
    pub const CONFIDENCE: &'static str = "confidence";
    pub const PUBLISHED_AT: &'static str = "published_at";

    pub fn text(&self, attribute: &str) -> Option<&str> {
        match attribute {
            Self::TITLE => Some(self.title.as_str()),
            Self::BODY => Some(self.body.as_str()),
            other => self.derived.get(other).map(String::as_str),
        }
    }

    pub fn numbers(&self) -> Numbers {
        let mut numbers = Numbers::new();
        numbers.insert(Self::CONFIDENCE.to_string(), self.confidence);
        numbers
    }

    /// Projection stored alongside vectors in the backend.
    pub fn payload(&self) -> Payload {
        Payload {
            id: self.id.clone(),
            entity: EntityKind::Document,
            origin: None,
            labels: self.labels.clone(),
            numbers: self.numbers(),
            paths: self.paths.clone(),
            published_at: self.published_at,
        }
    }
}

/// Half-open character offsets `[start, end)` into the parent body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A sub-span of a document body. Ownership is by back-reference only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: DocId,
    pub parent_id: DocId,
    pub index: u32,
    pub span: Span,
    pub text: String,
    #[serde(default)]
    pub context: Option<String>,
}

impl Chunk {
    pub const TEXT: &'static str = "text";
    pub const CONTEXT: &'static str = "context";

    pub fn text(&self, attribute: &str) -> Option<&str> {
        match attribute {
            Self::TEXT => Some(self.text.as_str()),
            Self::CONTEXT => self.context.as_deref(),
            _ => None,
        }
    }

    /// Chunk payloads inherit the parent's filterable attributes.
    pub fn payload(&self, parent: &Document) -> Payload {
        Payload {
            id: self.id.clone(),
            entity: EntityKind::Chunk,
            origin: Some(ChunkOrigin {
                parent_id: self.parent_id.clone(),
                index: self.index,
                span: self.span,
            }),
            labels: parent.labels.clone(),
            numbers: parent.numbers(),
            paths: parent.paths.clone(),
            published_at: parent.published_at,
        }
    }
}

/// Where a chunk-level result came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkOrigin {
    pub parent_id: DocId,
    pub index: u32,
    pub span: Span,
}

/// Filterable and scorable attributes of an indexed entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payload {
    pub id: DocId,
    pub entity: EntityKind,
    #[serde(default)]
    pub origin: Option<ChunkOrigin>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub numbers: Numbers,
    #[serde(default)]
    pub paths: Paths,
    pub published_at: DateTime<Utc>,
}
