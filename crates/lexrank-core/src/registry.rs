//! Entity & Space Registry.
//!
//! Holds the authoritative list of spaces. Registration validates every
//! definition against the declared entity schemas; `seal` freezes the set so
//! the registry can be shared read-only across concurrent queries.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::Schemas;
use crate::space::{SpaceDefinition, SpaceKind};
use crate::types::EntityKind;

/// Cheap, clonable reference to a registered space.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceHandle(Arc<SpaceDefinition>);

impl SpaceHandle {
    pub fn definition(&self) -> &SpaceDefinition {
        &self.0
    }
}

impl Deref for SpaceHandle {
    type Target = SpaceDefinition;

    fn deref(&self) -> &SpaceDefinition {
        &self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpaceRegistry {
    schemas: Schemas,
    spaces: BTreeMap<String, SpaceHandle>,
    sealed: bool,
}

impl SpaceRegistry {
    pub fn new(schemas: Schemas) -> Self {
        Self { schemas, spaces: BTreeMap::new(), sealed: false }
    }

    /// Build and seal a registry from a list of definitions.
    pub fn from_definitions<I>(schemas: Schemas, definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = SpaceDefinition>,
    {
        let mut registry = Self::new(schemas);
        for def in definitions {
            registry.register(def)?;
        }
        registry.seal();
        Ok(registry)
    }

    pub fn register_space(
        &mut self,
        name: &str,
        entity: EntityKind,
        attribute: &str,
        kind: SpaceKind,
    ) -> Result<SpaceHandle> {
        self.register(SpaceDefinition {
            name: name.to_string(),
            entity,
            attribute: attribute.to_string(),
            kind,
        })
    }

    pub fn register(&mut self, def: SpaceDefinition) -> Result<SpaceHandle> {
        if self.sealed {
            return Err(Error::RegistrySealed { space: def.name });
        }
        if def.name.trim().is_empty() {
            return Err(Error::config("space name is empty"));
        }
        if self.spaces.contains_key(&def.name) {
            return Err(Error::config(format!("space '{}' is already registered", def.name)));
        }
        let declared = self.schemas.for_entity(def.entity).kind_of(&def.attribute).ok_or_else(|| {
            Error::config(format!(
                "space '{}': attribute '{}' is not declared on {}",
                def.name, def.attribute, def.entity
            ))
        })?;
        let expected = def.kind.attribute_kind();
        if declared != expected {
            return Err(Error::config(format!(
                "space '{}': {} space needs a {:?} attribute but '{}' is {:?}",
                def.name,
                def.kind.name(),
                expected,
                def.attribute,
                declared
            )));
        }
        def.kind.validate(&def.name)?;

        let handle = SpaceHandle(Arc::new(def));
        self.spaces.insert(handle.name.clone(), handle.clone());
        Ok(handle)
    }

    /// Idempotent.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn resolve(&self, name: &str) -> Result<SpaceHandle> {
        self.spaces
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownSpace { name: name.to_string() })
    }

    pub fn schemas(&self) -> &Schemas {
        &self.schemas
    }

    /// All spaces, in name order.
    pub fn spaces(&self) -> impl Iterator<Item = &SpaceHandle> {
        self.spaces.values()
    }

    pub fn spaces_for(&self, entity: EntityKind) -> impl Iterator<Item = &SpaceHandle> {
        self.spaces.values().filter(move |s| s.entity == entity)
    }

    /// Spaces over `attribute` on `entity`.
    pub fn spaces_on(&self, entity: EntityKind, attribute: &str) -> impl Iterator<Item = &SpaceHandle> + '_ {
        let attribute = attribute.to_string();
        self.spaces
            .values()
            .filter(move |s| s.entity == entity && s.attribute == attribute)
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }
}
