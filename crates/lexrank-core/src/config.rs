//! Configuration loader, engine settings and path helpers.
//!
//! Uses Figment to merge serialized defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (nested keys split on `__`).
//! Values are only shape-checked here; spaces, hierarchy and presets are
//! validated when the registry and engine are built.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::schema::Schemas;
use crate::space::{NumericMode, SpaceDefinition};
use crate::types::{EntityKind, HierarchyPath};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Ok(Self::for_env(&env_name))
    }

    pub fn for_env(env_name: &str) -> Self {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Self { figment }
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and shape-check the full engine configuration.
    pub fn engine(&self) -> anyhow::Result<EngineConfig> {
        let config: EngineConfig = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract engine config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub retrieval: RetrievalSettings,
    pub recency: RecencySettings,
    pub ingest: IngestSettings,
    pub storage: StorageSettings,
    pub schema: Schemas,
    pub spaces: Vec<SpaceDefinition>,
    pub hierarchy: Vec<HierarchySettings>,
    pub presets: PresetSettings,
    /// Primary-content space per entity, used to break score ties.
    pub primary_spaces: BTreeMap<EntityKind, String>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.retrieval.validate()?;
        self.recency.validate()?;
        for dim in &self.hierarchy {
            dim.boosts.validate(&dim.name)?;
        }
        Ok(())
    }

    pub fn primary_space(&self, entity: EntityKind) -> Option<&str> {
        self.primary_spaces.get(&entity).map(String::as_str)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalSettings::default(),
            recency: RecencySettings::default(),
            ingest: IngestSettings::default(),
            storage: StorageSettings::default(),
            schema: Schemas::default(),
            spaces: legal_spaces(),
            hierarchy: vec![
                HierarchySettings::new("jurisdiction", "jurisdiction"),
                HierarchySettings::new("practice_area", "practice_area"),
            ],
            presets: PresetSettings::default(),
            primary_spaces: BTreeMap::from([
                (EntityKind::Document, "content".to_string()),
                (EntityKind::Chunk, "passage".to_string()),
            ]),
        }
    }
}

pub const DEFAULT_MODEL: &str = "hash-v1";
pub const DEFAULT_DIMENSIONS: usize = 256;

fn legal_spaces() -> Vec<SpaceDefinition> {
    let doc = EntityKind::Document;
    let vector = |name: &str, entity, attr: &str| {
        SpaceDefinition::vector(name, entity, attr, DEFAULT_MODEL, DEFAULT_DIMENSIONS)
    };
    vec![
        vector("title", doc, "title"),
        vector("content", doc, "body"),
        vector("summary", doc, "summary"),
        vector("key_findings", doc, "key_findings"),
        vector("facts", doc, "facts"),
        vector("provisions", doc, "provisions"),
        vector("compliance", doc, "compliance_notes"),
        vector("citations", doc, "citations"),
        vector("passage", EntityKind::Chunk, "text"),
        vector("passage_context", EntityKind::Chunk, "context"),
        SpaceDefinition::categorical(
            "kind",
            doc,
            "kind",
            ["statute", "regulation", "case_law", "guidance", "contract"],
        ),
        SpaceDefinition::categorical("review_status", doc, "review_status", ["reviewed", "pending"]),
        SpaceDefinition::numeric("quality", doc, "confidence", 0.0, 100.0, NumericMode::Maximize),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Per-space top-K is `limit * fan_out_factor`.
    pub fan_out_factor: usize,
    pub max_candidates_per_space: usize,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl RetrievalSettings {
    fn validate(&self) -> Result<()> {
        if self.fan_out_factor < 1 {
            return Err(Error::config("retrieval.fan_out_factor must be >= 1"));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(Error::config(format!(
                "retrieval.default_limit {} must be in 1..={}",
                self.default_limit, self.max_limit
            )));
        }
        if self.max_candidates_per_space < self.max_limit {
            return Err(Error::config(
                "retrieval.max_candidates_per_space must be >= retrieval.max_limit",
            ));
        }
        Ok(())
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            fan_out_factor: 4,
            max_candidates_per_space: 400,
            default_limit: 10,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecencySettings {
    pub half_life_days: f64,
    /// Multiplier for a document published at query time.
    pub boost_ceiling: f64,
}

impl RecencySettings {
    pub fn validate(&self) -> Result<()> {
        if !self.half_life_days.is_finite() || self.half_life_days <= 0.0 {
            return Err(Error::config(format!(
                "recency.half_life_days must be finite and > 0, got {}",
                self.half_life_days
            )));
        }
        if !self.boost_ceiling.is_finite() || self.boost_ceiling < 1.0 {
            return Err(Error::config(format!(
                "recency.boost_ceiling must be finite and >= 1.0, got {}",
                self.boost_ceiling
            )));
        }
        Ok(())
    }
}

impl Default for RecencySettings {
    fn default() -> Self {
        Self { half_life_days: 365.0, boost_ceiling: 1.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestSettings {
    /// Max chars a chunk may share with its predecessor.
    pub max_chunk_overlap: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { max_chunk_overlap: 256 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    /// LanceDB directory; relative paths resolve against the config base.
    pub uri: String,
}

impl StorageSettings {
    pub fn resolve(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.uri)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { uri: "data/lexrank".to_string() }
    }
}

/// Boost multiplier per hierarchy match tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TierBoosts {
    pub exact: f64,
    pub ancestor: f64,
    pub descendant: f64,
    pub none: f64,
}

impl TierBoosts {
    /// Requires `exact > ancestor > descendant > none == 1.0`, all finite.
    pub fn validate(&self, dimension: &str) -> Result<()> {
        let all = [self.exact, self.ancestor, self.descendant, self.none];
        if all.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(Error::config(format!(
                "hierarchy '{dimension}': boosts must be finite and non-negative"
            )));
        }
        if self.none != 1.0 {
            return Err(Error::config(format!(
                "hierarchy '{dimension}': boost for NONE must be 1.0, got {}",
                self.none
            )));
        }
        if !(self.exact > self.ancestor && self.ancestor > self.descendant && self.descendant > self.none) {
            return Err(Error::config(format!(
                "hierarchy '{dimension}': boosts must satisfy EXACT > ANCESTOR > DESCENDANT > NONE \
                 (got {} / {} / {} / {})",
                self.exact, self.ancestor, self.descendant, self.none
            )));
        }
        Ok(())
    }
}

impl Default for TierBoosts {
    fn default() -> Self {
        Self { exact: 1.5, ancestor: 1.25, descendant: 1.1, none: 1.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HierarchySettings {
    pub name: String,
    /// Path attribute on documents.
    pub attribute: String,
    #[serde(default)]
    pub boosts: TierBoosts,
    /// Full paths of the fixed taxonomy; empty means unconstrained.
    #[serde(default)]
    pub taxonomy: Vec<HierarchyPath>,
}

impl HierarchySettings {
    pub fn new(name: &str, attribute: &str) -> Self {
        Self {
            name: name.to_string(),
            attribute: attribute.to_string(),
            boosts: TierBoosts::default(),
            taxonomy: Vec::new(),
        }
    }
}

/// Default weights for one disclosure tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierPreset {
    pub version: u32,
    pub entity: EntityKind,
    pub weights: BTreeMap<String, f64>,
    pub hierarchy_weight: f64,
    pub recency_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresetSettings {
    pub discovery: TierPreset,
    pub exploration: TierPreset,
    pub deep_dive: TierPreset,
}

fn weights(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

impl Default for PresetSettings {
    fn default() -> Self {
        Self {
            discovery: TierPreset {
                version: 1,
                entity: EntityKind::Document,
                weights: weights(&[
                    ("summary", 1.0),
                    ("key_findings", 0.6),
                    ("title", 0.4),
                    ("content", 0.0),
                ]),
                hierarchy_weight: 0.5,
                recency_weight: 0.5,
            },
            exploration: TierPreset {
                version: 1,
                entity: EntityKind::Document,
                weights: weights(&[
                    ("provisions", 1.0),
                    ("compliance", 0.8),
                    ("summary", 0.4),
                    ("facts", 0.4),
                    ("content", 0.2),
                ]),
                hierarchy_weight: 1.0,
                recency_weight: 0.5,
            },
            deep_dive: TierPreset {
                version: 1,
                entity: EntityKind::Chunk,
                weights: weights(&[("passage", 1.0), ("passage_context", 0.3)]),
                hierarchy_weight: 0.25,
                recency_weight: 0.25,
            },
        }
    }
}

/// `~` and `$VAR` / `${VAR}` expansion; no canonicalization.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let raw = input.as_ref();
    let with_env = shellexpand::env(raw).unwrap_or(std::borrow::Cow::Borrowed(raw));
    PathBuf::from(shellexpand::tilde(&with_env).as_ref())
}

/// Expanded `path`, joined onto `base` unless already absolute.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, path: S) -> PathBuf {
    let expanded = expand_path(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
