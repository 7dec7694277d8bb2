//! # Entity World
//!
//! Slot arena owning every entity record and the lifecycle signal bus.
//! Pre-allocates all slots at creation time.
//!
//! ```text
//! spawn ──> EntityAdded
//! add_component ──> EntityComponentAdded
//! remove_component ──> EntityComponentRemoved
//! queue_destroy ──> EntityQueuedForDestroy ──(flush_destroyed)──> slot freed
//! end_bulk (outermost) ──> BulkOperationFinished
//! finish_loading ──> PostLoadHook
//! start_frame ──> FrameStarted
//! ```
//!
//! Component payloads live with their owning systems; the world only
//! tracks which kinds each entity holds.

use super::component::{ComponentKind, ComponentMask};
use super::entity::{EntityId, EntityRecord};
use crate::signal::{Signal, SignalBus};

/// The entity world.
///
/// # Capacity
///
/// The world has a fixed capacity set at creation. Spawning past it
/// returns [`EntityId::NULL`].
///
/// # Example
///
/// ```rust
/// use beltline_core::{ComponentKind, World};
///
/// let mut world = World::new(1024);
/// let acceptor = world.spawn(&[ComponentKind::ItemAcceptor]);
/// assert!(world.is_alive(acceptor));
/// ```
pub struct World {
    /// All entity slots (pre-allocated).
    records: Box<[EntityRecord]>,
    /// Free list of slot indices for reuse.
    free_indices: Vec<u32>,
    /// Entities queued for destruction, freed on the next flush.
    destroy_queue: Vec<EntityId>,
    /// Number of currently alive entities (including queued ones).
    alive_count: usize,
    /// Nesting depth of bulk operations.
    bulk_depth: u32,
    /// Frames started so far.
    frame: u64,
    /// Lifecycle signal dispatcher.
    signals: SignalBus,
}

impl World {
    /// Creates a new world with the specified entity capacity.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of live entities
    ///
    /// # Panics
    ///
    /// Panics if capacity exceeds `u32::MAX`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(
            u32::try_from(capacity).is_ok(),
            "Capacity cannot exceed u32::MAX"
        );

        let records = vec![EntityRecord::dead(); capacity].into_boxed_slice();

        // Lowest index is handed out first
        #[allow(clippy::cast_possible_truncation)]
        let free_indices: Vec<u32> = (0..capacity as u32).rev().collect();

        Self {
            records,
            free_indices,
            destroy_queue: Vec::new(),
            alive_count: 0,
            bulk_depth: 0,
            frame: 0,
            signals: SignalBus::new(),
        }
    }

    /// Returns the maximum capacity of this world.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// The signal bus registries subscribe to.
    #[inline]
    #[must_use]
    pub const fn signals(&self) -> &SignalBus {
        &self.signals
    }

    /// Spawns a new entity holding `components`.
    ///
    /// # Returns
    ///
    /// The new entity's ID, or `EntityId::NULL` if capacity is reached.
    pub fn spawn(&mut self, components: &[ComponentKind]) -> EntityId {
        let Some(index) = self.free_indices.pop() else {
            tracing::warn!(capacity = self.capacity(), "world full, spawn ignored");
            return EntityId::NULL;
        };

        let record = &mut self.records[index as usize];

        // Bump generation to invalidate old references
        let generation = record.id.generation().wrapping_add(1);
        let id = EntityId::new(index, generation);

        *record = EntityRecord::new(id, ComponentMask::from_kinds(components));
        self.alive_count += 1;

        self.signals.publish(Signal::EntityAdded(id));
        id
    }

    /// Attaches a component kind to an entity.
    ///
    /// # Returns
    ///
    /// `true` if the kind was newly attached. Stale IDs and entities queued
    /// for destruction are ignored.
    pub fn add_component(&mut self, id: EntityId, kind: ComponentKind) -> bool {
        let Some(record) = self.get_mut(id) else {
            return false;
        };
        if record.queued_for_destroy || !record.components.insert(kind) {
            return false;
        }
        self.signals.publish(Signal::EntityComponentAdded(id, kind));
        true
    }

    /// Detaches a component kind from an entity.
    ///
    /// # Returns
    ///
    /// `true` if the kind was attached before.
    pub fn remove_component(&mut self, id: EntityId, kind: ComponentKind) -> bool {
        let Some(record) = self.get_mut(id) else {
            return false;
        };
        if !record.components.remove(kind) {
            return false;
        }
        self.signals.publish(Signal::EntityComponentRemoved(id, kind));
        true
    }

    /// Requests destruction of an entity.
    ///
    /// The entity stays resolvable, flagged `queued_for_destroy`, until
    /// [`World::flush_destroyed`] runs.
    ///
    /// # Returns
    ///
    /// `false` if the ID is stale or the entity was already queued.
    pub fn queue_destroy(&mut self, id: EntityId) -> bool {
        let Some(record) = self.get_mut(id) else {
            return false;
        };
        if record.queued_for_destroy {
            return false;
        }
        record.queued_for_destroy = true;
        self.destroy_queue.push(id);
        self.signals.publish(Signal::EntityQueuedForDestroy(id));
        true
    }

    /// Frees the slots of every entity queued for destruction.
    ///
    /// Does nothing while a bulk operation runs: registries still hold
    /// deferred removals that must resolve against the old records.
    ///
    /// # Returns
    ///
    /// Number of slots freed.
    pub fn flush_destroyed(&mut self) -> usize {
        if self.bulk_operation_running() {
            tracing::trace!(queued = self.destroy_queue.len(), "flush deferred by bulk operation");
            return 0;
        }
        let mut freed = 0;
        for id in std::mem::take(&mut self.destroy_queue) {
            let idx = id.index() as usize;
            let record = &mut self.records[idx];
            if !record.alive || record.id != id {
                continue;
            }
            // Keep the id so the next spawn bumps its generation
            record.alive = false;
            record.queued_for_destroy = false;
            record.components = ComponentMask::EMPTY;
            self.free_indices.push(id.index());
            self.alive_count -= 1;
            freed += 1;
        }
        if freed > 0 {
            tracing::debug!(freed, "destroyed entities flushed");
        }
        freed
    }

    // =========================================================================
    // Bulk operations
    // =========================================================================

    /// Enters a bulk operation. Calls nest.
    pub fn begin_bulk(&mut self) {
        self.bulk_depth += 1;
    }

    /// Leaves a bulk operation.
    ///
    /// Leaving the outermost one publishes `BulkOperationFinished`. Unbalanced
    /// calls are ignored.
    pub fn end_bulk(&mut self) {
        match self.bulk_depth {
            0 => tracing::debug!("end_bulk without matching begin_bulk"),
            1 => {
                self.bulk_depth = 0;
                self.signals.publish(Signal::BulkOperationFinished);
            }
            _ => self.bulk_depth -= 1,
        }
    }

    /// Runs `f` inside a bulk operation.
    pub fn bulk_operation<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_bulk();
        let result = f(self);
        self.end_bulk();
        result
    }

    /// Whether a bulk operation is in progress.
    #[inline]
    #[must_use]
    pub const fn bulk_operation_running(&self) -> bool {
        self.bulk_depth > 0
    }

    // =========================================================================
    // Frame and load hooks
    // =========================================================================

    /// Announces that loading finished and registries must rebuild.
    pub fn finish_loading(&mut self) {
        tracing::info!(entities = self.alive_count, "world loaded");
        self.signals.publish(Signal::PostLoadHook);
    }

    /// Starts a new frame.
    ///
    /// # Returns
    ///
    /// The new frame number (first frame is 1).
    pub fn start_frame(&mut self) -> u64 {
        self.frame += 1;
        self.signals.publish(Signal::FrameStarted(self.frame));
        self.frame
    }

    /// Frames started so far.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Checks if an entity is alive (queued-for-destroy entities still are).
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        if id.is_null() {
            return false;
        }
        self.records
            .get(id.index() as usize)
            .is_some_and(|record| record.alive && record.id == id)
    }

    /// Gets an entity record by ID.
    ///
    /// # Returns
    ///
    /// The record, or None if dead/stale.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        if !self.is_alive(id) {
            return None;
        }
        Some(&self.records[id.index() as usize])
    }

    #[inline]
    fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        if !self.is_alive(id) {
            return None;
        }
        Some(&mut self.records[id.index() as usize])
    }

    /// Component mask of a live entity.
    #[inline]
    #[must_use]
    pub fn components(&self, id: EntityId) -> Option<ComponentMask> {
        self.get(id).map(|record| record.components)
    }

    /// Iterates over every live record, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.iter().filter(|record| record.alive)
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("capacity", &self.capacity())
            .field("alive", &self.alive_count)
            .field("queued_for_destroy", &self.destroy_queue.len())
            .field("bulk_depth", &self.bulk_depth)
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}
