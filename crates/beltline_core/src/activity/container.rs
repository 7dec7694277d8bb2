//! # Activity Containers
//!
//! One container per tracked component kind (plus one for aggregates)
//! partitions the matched subjects into active and inactive. Changes are
//! queued during the tick and applied together by [`ActivityContainer::drain`].
//!
//! ## Drain order
//!
//! 1. Drop every queued deactivation that also has a queued activation
//! 2. Apply the remaining deactivations
//! 3. Apply activations for subjects that still exist; drop the rest
//! 4. Clear both queues and rebuild the ordered array
//!
//! A fresh wake-up therefore always beats a stale idle verdict from the
//! same cycle.

use crate::ecs::{Handle, HandleSet};

/// Counters from one drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Subjects that became active.
    pub activated: usize,
    /// Subjects that became inactive.
    pub deactivated: usize,
    /// Queued activations dropped because the subject no longer exists.
    pub dropped: usize,
}

/// Active/inactive partition with queued transitions.
#[derive(Clone, Debug)]
pub struct ActivityContainer<H: Handle> {
    active: HandleSet<H>,
    /// Slot-ordered view of `active`, valid after every drain.
    active_array: Vec<H>,
    to_activate: HandleSet<H>,
    to_deactivate: HandleSet<H>,
}

impl<H: Handle> ActivityContainer<H> {
    /// Creates an empty container.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: HandleSet::new(),
            active_array: Vec::new(),
            to_activate: HandleSet::new(),
            to_deactivate: HandleSet::new(),
        }
    }

    /// Queues `subject` for activation on the next drain.
    #[inline]
    pub fn queue_activate(&mut self, subject: H) {
        self.to_activate.insert(subject);
    }

    /// Queues `subject` for deactivation on the next drain.
    ///
    /// Ignored unless `subject` is currently active, so stale or foreign
    /// handles never size the queue.
    #[inline]
    pub fn queue_deactivate(&mut self, subject: H) {
        if self.active.contains(subject) {
            self.to_deactivate.insert(subject);
        }
    }

    /// Applies queued transitions.
    ///
    /// # Arguments
    ///
    /// * `exists` - Whether a subject is still a member of the owning registry
    pub fn drain(&mut self, exists: impl Fn(H) -> bool) -> DrainStats {
        let mut stats = DrainStats::default();
        if self.to_activate.is_empty() && self.to_deactivate.is_empty() {
            return stats;
        }

        for subject in &self.to_deactivate {
            if self.to_activate.contains(subject) {
                continue;
            }
            if self.active.remove(subject) {
                stats.deactivated += 1;
            }
        }

        for subject in &self.to_activate {
            if exists(subject) {
                if self.active.insert(subject) {
                    stats.activated += 1;
                }
            } else {
                self.active.remove(subject);
                stats.dropped += 1;
            }
        }

        self.to_activate.clear();
        self.to_deactivate.clear();

        self.active_array.clear();
        self.active_array.extend(self.active.iter());
        stats
    }

    /// Active subjects in slot order, as of the last drain.
    #[inline]
    #[must_use]
    pub fn active(&self) -> &[H] {
        &self.active_array
    }

    /// Whether `subject` was active after the last drain.
    #[inline]
    #[must_use]
    pub fn is_active(&self, subject: H) -> bool {
        self.active.contains(subject)
    }

    /// Number of active subjects.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Checks if no subject is active.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Transitions queued for the next drain, as (activations, deactivations).
    #[inline]
    #[must_use]
    pub fn queued(&self) -> (usize, usize) {
        (self.to_activate.len(), self.to_deactivate.len())
    }
}

impl<H: Handle> Default for ActivityContainer<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EntityId;

    fn id(index: u32) -> EntityId {
        EntityId::new(index, 0)
    }

    #[test]
    fn test_activate_then_deactivate_across_cycles() {
        let mut container = ActivityContainer::new();
        container.queue_activate(id(1));
        container.queue_activate(id(2));
        let stats = container.drain(|_| true);
        assert_eq!(stats.activated, 2);
        assert_eq!(container.active(), &[id(1), id(2)]);

        container.queue_deactivate(id(1));
        let stats = container.drain(|_| true);
        assert_eq!(stats.deactivated, 1);
        assert_eq!(container.active(), &[id(2)]);
    }

    #[test]
    fn test_activation_wins_within_cycle() {
        let mut container = ActivityContainer::new();
        container.queue_activate(id(4));
        container.drain(|_| true);

        container.queue_deactivate(id(4));
        container.queue_activate(id(4));
        container.drain(|_| true);
        assert!(container.is_active(id(4)));

        // Order of queueing does not matter
        container.queue_activate(id(4));
        container.queue_deactivate(id(4));
        container.drain(|_| true);
        assert!(container.is_active(id(4)));
    }

    #[test]
    fn test_missing_subject_is_dropped() {
        let mut container = ActivityContainer::new();
        container.queue_activate(id(1));
        container.drain(|_| true);

        container.queue_activate(id(1));
        container.queue_activate(id(9));
        let stats = container.drain(|subject| subject != id(1) && subject != id(9));
        assert_eq!(stats.dropped, 2);
        assert!(container.is_empty());
    }

    #[test]
    fn test_deactivating_inactive_is_noop() {
        let mut container: ActivityContainer<EntityId> = ActivityContainer::new();
        container.queue_deactivate(id(3));
        assert_eq!(container.queued(), (0, 0));
        let stats = container.drain(|_| true);
        assert_eq!(stats, DrainStats::default());
    }

    #[test]
    fn test_deactivating_stale_or_foreign_handle_is_noop() {
        let mut container = ActivityContainer::new();
        container.queue_activate(id(3));
        container.drain(|_| true);

        container.queue_deactivate(EntityId::new(3, 1));
        container.queue_deactivate(EntityId::new(20_000_000, 0));
        container.queue_deactivate(EntityId::NULL);
        assert_eq!(container.queued(), (0, 0));

        container.drain(|_| true);
        assert_eq!(container.active(), &[id(3)]);
    }
}
