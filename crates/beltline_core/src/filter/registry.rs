//! # Component-Filtered Registry
//!
//! Keeps the set of entities holding every kind of a [`Signature`],
//! consistent against the world's lifecycle signals.
//!
//! ```text
//! EntityAdded ─────────────┐
//! EntityComponentAdded ────┼──> register / reconsider
//! EntityComponentRemoved ──┼──> check_after_component_removal ─┐
//! EntityQueuedForDestroy ──┼──> unregister_if_present <────────┘
//!                          │        │ bulk running?
//!                          │        └──> pending_deletions ──┐
//! BulkOperationFinished ───┼──> refresh <─────────────────────┘
//! PostLoadHook ────────────┴──> rescan (register all + refresh)
//! ```
//!
//! Every operation tolerates double delivery: registering a member or
//! removing a non-member is a silent no-op.

use crate::ecs::{EntityId, HandleSet, Signature, World};
use crate::signal::{Signal, SignalBus, SignalSubscription};

/// Receives membership changes as the registry applies them.
pub trait MembershipObserver {
    /// An entity entered the registry.
    fn on_register(&mut self, _entity: EntityId) {}
    /// An entity left the registry.
    fn on_unregister(&mut self, _entity: EntityId) {}
}

impl MembershipObserver for () {}

/// A single membership change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipChange {
    /// The entity entered the registry.
    Registered(EntityId),
    /// The entity left the registry.
    Unregistered(EntityId),
}

impl MembershipObserver for Vec<MembershipChange> {
    fn on_register(&mut self, entity: EntityId) {
        self.push(MembershipChange::Registered(entity));
    }

    fn on_unregister(&mut self, entity: EntityId) {
        self.push(MembershipChange::Unregistered(entity));
    }
}

/// Counters from one [`FilteredRegistry::pump`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Signals drained from the subscription.
    pub signals: usize,
    /// Entities that entered the registry.
    pub registered: usize,
    /// Entities that left the registry.
    pub unregistered: usize,
}

/// The live set of entities matching one signature.
pub struct FilteredRegistry {
    signature: Signature,
    members: HandleSet<EntityId>,
    /// Removals deferred while a bulk operation runs.
    pending_deletions: Vec<EntityId>,
    /// Slot-ordered copy of `members`.
    snapshot: Vec<EntityId>,
    snapshot_stale: bool,
    subscription: SignalSubscription,
}

impl FilteredRegistry {
    /// Creates an empty registry and subscribes it to `signals`.
    ///
    /// Entities that already exist are picked up by [`FilteredRegistry::rescan`]
    /// or the next `PostLoadHook`.
    #[must_use]
    pub fn new(signature: Signature, signals: &SignalBus) -> Self {
        Self {
            signature,
            members: HandleSet::new(),
            pending_deletions: Vec::new(),
            snapshot: Vec::new(),
            snapshot_stale: false,
            subscription: signals.subscribe(),
        }
    }

    /// The required-component signature.
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Checks membership.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.contains(entity)
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Checks if the registry has no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Removals waiting for the next refresh.
    #[inline]
    #[must_use]
    pub fn pending_deletions(&self) -> &[EntityId] {
        &self.pending_deletions
    }

    fn eligible(&self, world: &World, entity: EntityId) -> bool {
        world
            .get(entity)
            .is_some_and(|record| record.is_active() && self.signature.matches(record.components))
    }

    fn remove_now(&mut self, entity: EntityId, observer: &mut impl MembershipObserver) -> bool {
        if !self.members.remove(entity) {
            return false;
        }
        self.snapshot_stale = true;
        observer.on_unregister(entity);
        true
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Adds `entity` if it is alive, not queued for destruction, matches the
    /// signature and is not already a member.
    ///
    /// # Returns
    ///
    /// `true` if the entity was added.
    pub fn register(
        &mut self,
        world: &World,
        entity: EntityId,
        observer: &mut impl MembershipObserver,
    ) -> bool {
        if self.members.contains(entity) {
            tracing::trace!(%entity, signature = %self.signature, "already registered");
            return false;
        }
        if !self.eligible(world, entity) {
            return false;
        }
        self.members.insert(entity);
        self.snapshot_stale = true;
        observer.on_register(entity);
        true
    }

    /// Removes `entity` if it is a member.
    ///
    /// While a bulk operation runs the removal is deferred to the
    /// pending-deletion queue and applied by the next refresh.
    ///
    /// # Returns
    ///
    /// `true` if the entity was removed or queued for removal.
    pub fn unregister_if_present(
        &mut self,
        world: &World,
        entity: EntityId,
        observer: &mut impl MembershipObserver,
    ) -> bool {
        if !self.members.contains(entity) {
            tracing::trace!(%entity, signature = %self.signature, "unregister of non-member");
            return false;
        }
        if world.bulk_operation_running() {
            self.pending_deletions.push(entity);
            return true;
        }
        self.remove_now(entity, observer)
    }

    /// Re-evaluates an entity after a component was added. Idempotent.
    pub fn reconsider(
        &mut self,
        world: &World,
        entity: EntityId,
        observer: &mut impl MembershipObserver,
    ) -> bool {
        self.register(world, entity, observer)
    }

    /// Re-evaluates a member after a component was removed.
    ///
    /// Removes it (subject to bulk deferral) when it no longer matches.
    pub fn check_after_component_removal(
        &mut self,
        world: &World,
        entity: EntityId,
        observer: &mut impl MembershipObserver,
    ) -> bool {
        if !self.members.contains(entity) {
            return false;
        }
        let still_matches = world
            .components(entity)
            .is_some_and(|mask| self.signature.matches(mask));
        if still_matches {
            return false;
        }
        self.unregister_if_present(world, entity, observer)
    }

    /// Applies deferred removals, sweeps members that are gone, queued for
    /// destruction or no longer matching, and rebuilds the snapshot.
    ///
    /// Safe to call any number of times. While a bulk operation runs only
    /// the snapshot is rebuilt; removals wait for the operation to end.
    ///
    /// # Returns
    ///
    /// Number of members removed.
    pub fn refresh(&mut self, world: &World, observer: &mut impl MembershipObserver) -> usize {
        if world.bulk_operation_running() {
            self.rebuild_snapshot();
            return 0;
        }
        let mut removed = 0;

        // Re-checked against the world: a component removed and re-added
        // within one bulk operation keeps the entity. Duplicates are no-ops.
        for entity in std::mem::take(&mut self.pending_deletions) {
            if !self.eligible(world, entity) && self.remove_now(entity, observer) {
                removed += 1;
            }
        }

        let signature = &self.signature;
        let swept = self.members.retain(|entity| {
            world
                .get(entity)
                .is_some_and(|record| record.is_active() && signature.matches(record.components))
        });
        for entity in swept {
            observer.on_unregister(entity);
            removed += 1;
        }
        if removed > 0 {
            self.snapshot_stale = true;
        }

        self.rebuild_snapshot();
        removed
    }

    /// Registers every eligible entity in the world, then refreshes.
    ///
    /// # Returns
    ///
    /// Number of entities added.
    pub fn rescan(&mut self, world: &World, observer: &mut impl MembershipObserver) -> usize {
        let mut added = 0;
        let candidates: Vec<EntityId> = world.iter().map(|record| record.id).collect();
        for entity in candidates {
            if self.register(world, entity, observer) {
                added += 1;
            }
        }
        self.refresh(world, observer);
        tracing::debug!(signature = %self.signature, added, members = self.len(), "registry rescanned");
        added
    }

    // =========================================================================
    // Signal handling
    // =========================================================================

    /// Drains pending signals and applies them.
    pub fn pump(&mut self, world: &World, observer: &mut impl MembershipObserver) -> PumpStats {
        let signals: Vec<Signal> = self.subscription.drain().collect();
        let mut stats = PumpStats {
            signals: signals.len(),
            ..PumpStats::default()
        };

        let mut counter = CountingObserver {
            inner: observer,
            stats: &mut stats,
        };
        for signal in signals {
            self.handle(world, signal, &mut counter);
        }
        stats
    }

    /// Applies a single signal.
    pub fn handle(&mut self, world: &World, signal: Signal, observer: &mut impl MembershipObserver) {
        match signal {
            Signal::EntityAdded(entity) => {
                self.register(world, entity, observer);
            }
            Signal::EntityComponentAdded(entity, kind) => {
                if self.signature.mask().contains(kind) {
                    self.reconsider(world, entity, observer);
                }
            }
            Signal::EntityComponentRemoved(entity, kind) => {
                if self.signature.mask().contains(kind) {
                    self.check_after_component_removal(world, entity, observer);
                }
            }
            Signal::EntityQueuedForDestroy(entity) => {
                self.unregister_if_present(world, entity, observer);
            }
            Signal::BulkOperationFinished => {
                self.refresh(world, observer);
            }
            Signal::PostLoadHook => {
                self.rescan(world, observer);
            }
            Signal::FrameStarted(_) => {}
        }
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    fn rebuild_snapshot(&mut self) {
        if !self.snapshot_stale {
            return;
        }
        self.snapshot.clear();
        self.snapshot.extend(self.members.iter());
        self.snapshot_stale = false;
    }

    /// Members in slot order, rebuilt first if stale.
    ///
    /// Deferred removals still count as members until the next refresh.
    pub fn snapshot(&mut self) -> &[EntityId] {
        self.rebuild_snapshot();
        &self.snapshot
    }

    /// The last built snapshot, without rebuilding.
    #[inline]
    #[must_use]
    pub fn cached_snapshot(&self) -> &[EntityId] {
        &self.snapshot
    }

    /// Whether the cached snapshot lags the member set.
    #[inline]
    #[must_use]
    pub const fn snapshot_is_stale(&self) -> bool {
        self.snapshot_stale
    }
}

impl std::fmt::Debug for FilteredRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredRegistry")
            .field("signature", &self.signature)
            .field("members", &self.members.len())
            .field("pending_deletions", &self.pending_deletions.len())
            .field("snapshot_stale", &self.snapshot_stale)
            .finish_non_exhaustive()
    }
}

struct CountingObserver<'a, O: MembershipObserver> {
    inner: &'a mut O,
    stats: &'a mut PumpStats,
}

impl<O: MembershipObserver> MembershipObserver for CountingObserver<'_, O> {
    fn on_register(&mut self, entity: EntityId) {
        self.stats.registered += 1;
        self.inner.on_register(entity);
    }

    fn on_unregister(&mut self, entity: EntityId) {
        self.stats.unregistered += 1;
        self.inner.on_unregister(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::ComponentKind;

    fn acceptor_registry(world: &World) -> FilteredRegistry {
        FilteredRegistry::new(Signature::single(ComponentKind::ItemAcceptor), world.signals())
    }

    #[test]
    fn test_register_requires_match() {
        let mut world = World::new(8);
        let mut registry = acceptor_registry(&world);
        let yes = world.spawn(&[ComponentKind::ItemAcceptor]);
        let no = world.spawn(&[ComponentKind::Belt]);

        assert!(registry.register(&world, yes, &mut ()));
        assert!(!registry.register(&world, no, &mut ()));
        assert_eq!(registry.snapshot(), &[yes]);
    }

    #[test]
    fn test_double_register_is_noop() {
        let mut world = World::new(8);
        let mut registry = acceptor_registry(&world);
        let e = world.spawn(&[ComponentKind::ItemAcceptor]);
        let mut changes = Vec::new();

        assert!(registry.register(&world, e, &mut changes));
        assert!(!registry.register(&world, e, &mut changes));
        assert!(!registry.reconsider(&world, e, &mut changes));
        assert_eq!(changes, vec![MembershipChange::Registered(e)]);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let mut world = World::new(8);
        let mut registry = acceptor_registry(&world);
        let e = world.spawn(&[ComponentKind::ItemAcceptor]);
        assert!(!registry.unregister_if_present(&world, e, &mut ()));
        assert!(!registry.check_after_component_removal(&world, e, &mut ()));
    }

    #[test]
    fn test_queued_for_destroy_is_not_registered() {
        let mut world = World::new(8);
        let mut registry = acceptor_registry(&world);
        let e = world.spawn(&[ComponentKind::ItemAcceptor]);
        world.queue_destroy(e);
        assert!(!registry.register(&world, e, &mut ()));
    }

    #[test]
    fn test_component_removal_only_drops_when_unmatched() {
        let mut world = World::new(8);
        let mut registry = FilteredRegistry::new(
            Signature::new(&[ComponentKind::ItemAcceptor, ComponentKind::ItemEjector]),
            world.signals(),
        );
        let e = world.spawn(&[
            ComponentKind::ItemAcceptor,
            ComponentKind::ItemEjector,
            ComponentKind::Storage,
        ]);
        registry.pump(&world, &mut ());
        assert!(registry.contains(e));

        world.remove_component(e, ComponentKind::Storage);
        registry.pump(&world, &mut ());
        assert!(registry.contains(e));

        world.remove_component(e, ComponentKind::ItemEjector);
        registry.pump(&world, &mut ());
        assert!(!registry.contains(e));
    }

    #[test]
    fn test_pump_reports_counts() {
        let mut world = World::new(8);
        let mut registry = acceptor_registry(&world);
        let a = world.spawn(&[ComponentKind::ItemAcceptor]);
        world.spawn(&[ComponentKind::Miner]);
        world.queue_destroy(a);

        let stats = registry.pump(&world, &mut ());
        // Destruction was already requested when the add was processed
        assert_eq!(stats.signals, 3);
        assert_eq!(stats.registered, 0);
        assert_eq!(stats.unregistered, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_bulk_defers_removal_until_refresh() {
        let mut world = World::new(8);
        let mut registry = acceptor_registry(&world);
        let e = world.spawn(&[ComponentKind::ItemAcceptor]);
        registry.pump(&world, &mut ());

        world.begin_bulk();
        world.remove_component(e, ComponentKind::ItemAcceptor);
        registry.pump(&world, &mut ());
        assert!(registry.contains(e));
        assert_eq!(registry.pending_deletions(), &[e]);

        world.end_bulk();
        let mut changes = Vec::new();
        registry.pump(&world, &mut changes);
        assert!(!registry.contains(e));
        assert!(registry.pending_deletions().is_empty());
        assert_eq!(changes, vec![MembershipChange::Unregistered(e)]);
    }

    #[test]
    fn test_bulk_remove_then_readd_keeps_member() {
        let mut world = World::new(8);
        let mut registry = acceptor_registry(&world);
        let e = world.spawn(&[ComponentKind::ItemAcceptor]);
        registry.pump(&world, &mut ());

        let mut changes = Vec::new();
        world.bulk_operation(|w| {
            w.remove_component(e, ComponentKind::ItemAcceptor);
            registry.pump(w, &mut changes);
            w.add_component(e, ComponentKind::ItemAcceptor);
            registry.pump(w, &mut changes);
        });
        registry.pump(&world, &mut changes);

        assert!(registry.contains(e));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let mut world = World::new(8);
        let mut registry = acceptor_registry(&world);
        let a = world.spawn(&[ComponentKind::ItemAcceptor]);
        let b = world.spawn(&[ComponentKind::ItemAcceptor]);
        registry.pump(&world, &mut ());
        world.queue_destroy(b);
        world.flush_destroyed();

        assert_eq!(registry.refresh(&world, &mut ()), 1);
        assert_eq!(registry.refresh(&world, &mut ()), 0);
        assert_eq!(registry.snapshot(), &[a]);
    }

    #[test]
    fn test_post_load_rescans_existing_entities() {
        let mut world = World::new(8);
        let a = world.spawn(&[ComponentKind::ItemAcceptor]);
        let mut registry = acceptor_registry(&world);
        assert!(registry.is_empty());

        world.finish_loading();
        registry.pump(&world, &mut ());
        assert_eq!(registry.snapshot(), &[a]);
    }

    #[test]
    fn test_snapshot_marks_stale_on_mutation() {
        let mut world = World::new(8);
        let mut registry = acceptor_registry(&world);
        let a = world.spawn(&[ComponentKind::ItemAcceptor]);
        registry.register(&world, a, &mut ());
        assert!(registry.snapshot_is_stale());
        assert!(registry.cached_snapshot().is_empty());
        assert_eq!(registry.snapshot(), &[a]);
        assert!(!registry.snapshot_is_stale());
    }
}
