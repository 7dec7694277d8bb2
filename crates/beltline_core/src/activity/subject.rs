//! Nodes of the activity machinery: component-bearing entities and
//! path-like aggregates (belt paths) that have no component bag.

use crate::ecs::{EntityId, Handle};

/// Handle of a path-like aggregate such as a belt path.
///
/// Issued by the system that owns the aggregates and registered with the
/// tracker through `add_aggregate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct AggregateId(u64);

impl AggregateId {
    /// Creates an aggregate ID from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Index portion.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation portion.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl Handle for AggregateId {
    #[inline]
    fn slot(self) -> u32 {
        self.index()
    }

    #[inline]
    fn generation(self) -> u32 {
        AggregateId::generation(self)
    }

    #[inline]
    fn from_parts(slot: u32, generation: u32) -> Self {
        Self::new(slot, generation)
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "path#{}v{}", self.index(), self.generation())
    }
}

/// Anything that can block or depend on something else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    /// A component-bearing entity.
    Entity(EntityId),
    /// A path-like aggregate.
    Aggregate(AggregateId),
}

impl From<EntityId> for Subject {
    #[inline]
    fn from(entity: EntityId) -> Self {
        Self::Entity(entity)
    }
}

impl From<AggregateId> for Subject {
    #[inline]
    fn from(aggregate: AggregateId) -> Self {
        Self::Aggregate(aggregate)
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entity(entity) => write!(f, "{entity}"),
            Self::Aggregate(aggregate) => write!(f, "{aggregate}"),
        }
    }
}
