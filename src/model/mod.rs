//! The boundary to the surrounding data system.
//!
//! The core engine never depends on a concrete entity representation; it
//! requires only the capability set expressed by [`EntityLike`] and
//! [`Corpus`]: a stable id, a schema with a matchable flag and a
//! compatibility predicate, typed property access grouped by semantic type,
//! and adjacency through entity-valued properties.
//!
//! [`record`] supplies a concrete JSON-lines implementation used by the CLI
//! and the test suites.

pub mod record;

pub use record::{MemoryCorpus, Record};

/// Semantic type of a property value.
///
/// Drives per-type token weighting in the index tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropType {
    Name,
    Date,
    Country,
    Phone,
    Email,
    Address,
    Identifier,
    Text,
    /// Reference to another entity by id.
    Entity,
}

/// Capability set the engine requires from an entity.
pub trait EntityLike {
    /// Stable entity id.
    fn id(&self) -> &str;

    /// Schema name.
    fn schema(&self) -> &str;

    /// Whether entities of this schema participate in matching at all.
    fn matchable(&self) -> bool;

    /// Whether entities of this schema may match entities of `other_schema`.
    fn can_match(&self, other_schema: &str) -> bool;

    /// All property values with their semantic type, excluding entity
    /// references.
    fn typed_values(&self) -> Vec<(PropType, &str)>;

    /// Entity ids referenced through entity-valued properties.
    fn entity_refs(&self) -> Vec<&str>;
}

/// Capability set the engine requires from a dataset scope.
pub trait Corpus {
    type Entity: EntityLike;

    /// Iterate all entities in scope.
    fn entities(&self) -> impl Iterator<Item = &Self::Entity>;

    /// Fetch one entity by id.
    fn get(&self, id: &str) -> Option<&Self::Entity>;

    /// Entities adjacent to `id` through entity-valued properties, in both
    /// directions (referenced by it, or referencing it).
    fn adjacent(&self, id: &str) -> Vec<&Self::Entity>;

    /// Number of entities in scope.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
