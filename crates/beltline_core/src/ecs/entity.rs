//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into the world's slot arena
//! - A generation counter for safe reuse
//!
//! The world keeps one [`EntityRecord`] per slot holding the component
//! mask and the lifecycle flags the registries filter on.

use super::component::{ComponentKind, ComponentMask};

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index into the slot arena
/// - Upper 32 bits: Generation counter for detecting stale references
///
/// Ordering is by raw value, which is NOT slot order. Anything that needs
/// deterministic iteration goes through a [`HandleSet`](super::HandleSet).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new entity ID from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - The slot index (0 to 2^32-1)
    /// * `generation` - The generation counter (0 to 2^32-1)
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw 64-bit value, used as the stable uid in logs.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Null/invalid entity ID.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// Per-slot entity state owned by the world.
#[derive(Clone, Copy, Debug)]
pub struct EntityRecord {
    /// The identifier currently occupying this slot.
    pub id: EntityId,
    /// Components attached to the entity.
    pub components: ComponentMask,
    /// Whether this slot is currently alive.
    pub alive: bool,
    /// Set when destruction was requested; the slot is freed on the next flush.
    pub queued_for_destroy: bool,
}

impl EntityRecord {
    /// Creates a live record with the given components.
    #[inline]
    #[must_use]
    pub const fn new(id: EntityId, components: ComponentMask) -> Self {
        Self {
            id,
            components,
            alive: true,
            queued_for_destroy: false,
        }
    }

    /// Creates a dead/empty slot record.
    #[inline]
    #[must_use]
    pub const fn dead() -> Self {
        Self {
            id: EntityId::NULL,
            components: ComponentMask::EMPTY,
            alive: false,
            queued_for_destroy: false,
        }
    }

    /// Checks if this entity has a specific component.
    #[inline]
    #[must_use]
    pub const fn has(&self, kind: ComponentKind) -> bool {
        self.components.contains(kind)
    }

    /// Alive and not waiting for destruction.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.alive && !self.queued_for_destroy
    }
}

impl Default for EntityRecord {
    fn default() -> Self {
        Self::dead()
    }
}
