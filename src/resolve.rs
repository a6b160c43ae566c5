//! Resolver module: maps abstract fields onto concrete storage locations.
//!
//! Implemented once per entity domain by the surrounding application. The
//! compiler asks it for storage paths and for the joins needed to reach fields
//! that live on related entities.

use crate::field::{FieldId, FilterableField};
use crate::ResolutionError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Dotted path to an attribute in the storage model, e.g.
/// `person.participantProfile.remarks`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn new(path: impl Into<String>) -> Self {
        StoragePath(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StoragePath {
    fn from(path: &str) -> Self {
        StoragePath::new(path)
    }
}

/// An entity type in the storage model, used as the root of a query or as the
/// destination of a join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityDescriptor(String);

impl EntityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        EntityDescriptor(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityDescriptor {
    fn from(name: &str) -> Self {
        EntityDescriptor::new(name)
    }
}

/// A traversal from a source collection into the rows of a related entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinSpec {
    pub source: StoragePath,
    pub target: EntityDescriptor,
}

impl JoinSpec {
    pub fn new(source: impl Into<StoragePath>, target: impl Into<EntityDescriptor>) -> Self {
        JoinSpec {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for JoinSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Resolves fields by identity. Most specific mapping wins because ids are
/// unique; an unknown field is a configuration bug, not user input.
pub trait FieldResolver {
    fn path_for(&self, field: &FilterableField) -> Result<StoragePath, ResolutionError>;

    /// The related entity type reached through a join, for fields that live on
    /// a related entity.
    fn entity_for(&self, field: &FilterableField) -> Result<EntityDescriptor, ResolutionError>;

    fn join_for(&self, field: &FilterableField) -> Result<JoinSpec, ResolutionError>;

    fn needs_join_for(&self, field: &FilterableField) -> bool;
}

/// Table-backed [`FieldResolver`], built once per entity domain.
#[derive(Debug, Default, Clone)]
pub struct MapResolver {
    paths: HashMap<FieldId, StoragePath>,
    entities: HashMap<FieldId, EntityDescriptor>,
    joins: HashMap<FieldId, JoinSpec>,
}

impl MapResolver {
    pub fn builder() -> MapResolverBuilder {
        MapResolverBuilder::default()
    }

    fn unmapped(field: &FilterableField) -> ResolutionError {
        ResolutionError::UnmappedField {
            field: field.id().clone(),
        }
    }
}

impl FieldResolver for MapResolver {
    fn path_for(&self, field: &FilterableField) -> Result<StoragePath, ResolutionError> {
        self.paths
            .get(field.id())
            .cloned()
            .ok_or_else(|| Self::unmapped(field))
    }

    fn entity_for(&self, field: &FilterableField) -> Result<EntityDescriptor, ResolutionError> {
        self.entities
            .get(field.id())
            .cloned()
            .ok_or_else(|| Self::unmapped(field))
    }

    fn join_for(&self, field: &FilterableField) -> Result<JoinSpec, ResolutionError> {
        self.joins
            .get(field.id())
            .cloned()
            .ok_or_else(|| Self::unmapped(field))
    }

    fn needs_join_for(&self, field: &FilterableField) -> bool {
        self.joins.contains_key(field.id())
    }
}

#[derive(Debug, Default)]
pub struct MapResolverBuilder {
    resolver: MapResolver,
}

impl MapResolverBuilder {
    /// Maps a field onto its storage path.
    pub fn path(mut self, field: &FilterableField, path: impl Into<StoragePath>) -> Self {
        self.resolver.paths.insert(field.id().clone(), path.into());
        self
    }

    /// Maps a field onto the entity type sub-compilations for it are rooted
    /// at, without requiring a join (subquery strategy).
    pub fn entity(
        mut self,
        field: &FilterableField,
        entity: impl Into<EntityDescriptor>,
    ) -> Self {
        self.resolver
            .entities
            .insert(field.id().clone(), entity.into());
        self
    }

    /// Marks a field as living on a related entity: resolving it requires the
    /// given join, and sub-compilations for it are rooted at the join target.
    pub fn join(
        mut self,
        field: &FilterableField,
        source: impl Into<StoragePath>,
        target: impl Into<EntityDescriptor>,
    ) -> Self {
        let target = target.into();
        self.resolver
            .entities
            .insert(field.id().clone(), target.clone());
        self.resolver.joins.insert(
            field.id().clone(),
            JoinSpec {
                source: source.into(),
                target,
            },
        );
        self
    }

    pub fn build(self) -> MapResolver {
        self.resolver
    }
}
