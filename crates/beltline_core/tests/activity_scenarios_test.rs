//! Integration tests for activity tracking: dependency resolution, idle
//! thresholds and container tie-breaks.

use beltline_core::{
    ActivityConfig, ActivityContainer, ActivityTracker, AggregateId, ComponentKind, EntityId,
    Subject, World,
};

fn tracker_with_threshold(world: &World, threshold: u32) -> ActivityTracker {
    ActivityTracker::new(ActivityConfig::with_threshold(threshold), world)
}

#[test]
fn test_belt_path_full_then_acceptor_resolves() {
    let mut world = World::new(32);
    let mut tracker = tracker_with_threshold(&world, 10);
    let acceptor = world.spawn(&[ComponentKind::ItemAcceptor]);
    let path = AggregateId::new(0, 1);
    tracker.add_aggregate(path);
    tracker.update(&world);

    tracker.report_full(path, Some(acceptor.into()));
    assert_eq!(
        tracker.graph().dependents_of(acceptor.into()),
        &[Subject::Aggregate(path)]
    );
    assert_eq!(
        tracker.graph().blockers_of(path.into()),
        &[Subject::Aggregate(path), Subject::Entity(acceptor)]
    );

    tracker.report_resolved(acceptor, None);
    assert!(tracker.graph().dependents_of(acceptor.into()).is_empty());

    // The path is still full: its edge on itself survives
    assert_eq!(tracker.graph().edge_count(), 1);
    assert_eq!(tracker.graph().blockers_of(path.into()), &[Subject::Aggregate(path)]);
    assert_eq!(tracker.graph().idle_frames(path.into()), Some(0));

    tracker.update(&world);
    assert_eq!(tracker.active_aggregates(), &[path]);

    tracker.report_resolved(path, None);
    assert_eq!(tracker.graph().edge_count(), 0);
    assert!(!tracker.graph().is_waiting(path.into()));
}

#[test]
fn test_resolve_schedules_every_dependent() {
    let mut world = World::new(32);
    let mut tracker = tracker_with_threshold(&world, 0);
    let blocker = world.spawn(&[ComponentKind::ItemAcceptor]);
    let dependents: Vec<EntityId> = (0..4)
        .map(|_| world.spawn(&[ComponentKind::ItemEjector]))
        .collect();
    tracker.update(&world);

    for dependent in &dependents {
        tracker.report_blocked(*dependent, blocker);
    }
    tracker.update(&world);
    assert!(tracker.active_entities(ComponentKind::ItemEjector).is_empty());

    tracker.report_accepted(blocker);
    assert!(tracker.graph().dependents_of(blocker.into()).is_empty());
    tracker.update(&world);
    assert_eq!(tracker.active_entities(ComponentKind::ItemEjector), dependents.as_slice());
}

#[test]
fn test_resolve_twice_is_idempotent() {
    let mut world = World::new(8);
    let mut tracker = tracker_with_threshold(&world, 5);
    let a = world.spawn(&[ComponentKind::ItemAcceptor]);
    let b = world.spawn(&[ComponentKind::ItemEjector]);
    tracker.update(&world);

    tracker.report_blocked(b, a);
    tracker.report_resolved(a, None);
    let edges = tracker.graph().edge_count();
    let waiting = tracker.graph().waiting_count();
    tracker.report_resolved(a, None);
    assert_eq!(tracker.graph().edge_count(), edges);
    assert_eq!(tracker.graph().waiting_count(), waiting);
}

#[test]
fn test_idle_threshold_boundary() {
    const THRESHOLD: u32 = 15;
    let mut world = World::new(8);
    let mut tracker = tracker_with_threshold(&world, THRESHOLD);
    let storage = world.spawn(&[ComponentKind::Storage]);
    tracker.update(&world);

    tracker.report_full(storage, None);
    for _ in 0..THRESHOLD {
        tracker.update(&world);
    }
    assert!(tracker.is_active(storage.into()), "still active after exactly threshold ticks");

    tracker.update(&world);
    assert!(!tracker.is_active(storage.into()), "idled after threshold + 1 ticks");
    assert!(tracker.graph().is_idled(storage.into()));
    assert_eq!(tracker.matched_entities(ComponentKind::Storage), &[storage]);
}

#[test]
fn test_resolution_before_threshold_resets_wait() {
    let mut world = World::new(8);
    let mut tracker = tracker_with_threshold(&world, 3);
    let e = world.spawn(&[ComponentKind::ItemProcessor]);
    tracker.update(&world);

    tracker.report_empty(e);
    tracker.update(&world);
    tracker.update(&world);
    tracker.report_resolved(e, None);
    tracker.report_empty(e);
    assert_eq!(tracker.graph().idle_frames(e.into()), Some(0));

    for _ in 0..3 {
        tracker.update(&world);
    }
    assert!(tracker.is_active(e.into()));
}

#[test]
fn test_activation_wins_tie_break() {
    let mut container = ActivityContainer::new();
    let e = EntityId::new(1, 1);
    container.queue_activate(e);
    container.drain(|_| true);

    container.queue_deactivate(e);
    container.queue_activate(e);
    container.drain(|_| true);
    assert!(container.is_active(e));
}

#[test]
fn test_wake_and_idle_in_same_tick_ends_active() {
    let mut world = World::new(8);
    let mut tracker = tracker_with_threshold(&world, 0);
    let a = world.spawn(&[ComponentKind::ItemAcceptor]);
    let b = world.spawn(&[ComponentKind::ItemEjector]);
    tracker.update(&world);

    // queued deactivation and wake-up meet in one drain
    tracker.report_blocked(b, a);
    tracker.queue_deactivate(b.into());
    tracker.report_accepted(a);
    tracker.update(&world);
    assert!(tracker.is_active(b.into()));
    assert!(!tracker.graph().is_waiting(b.into()));
}

#[test]
fn test_entity_in_several_containers() {
    let mut world = World::new(8);
    let mut tracker = tracker_with_threshold(&world, 0);
    let e = world.spawn(&[ComponentKind::ItemAcceptor, ComponentKind::ItemEjector]);
    tracker.update(&world);
    assert_eq!(tracker.active_entities(ComponentKind::ItemAcceptor), &[e]);
    assert_eq!(tracker.active_entities(ComponentKind::ItemEjector), &[e]);

    // Losing one kind only affects that container
    world.remove_component(e, ComponentKind::ItemEjector);
    tracker.update(&world);
    assert_eq!(tracker.active_entities(ComponentKind::ItemAcceptor), &[e]);
    assert!(tracker.active_entities(ComponentKind::ItemEjector).is_empty());
    assert!(tracker.contains(e.into()));
}

#[test]
fn test_destroy_during_bulk_removes_after_refresh() {
    let mut world = World::new(8);
    let mut tracker = tracker_with_threshold(&world, 5);
    let a = world.spawn(&[ComponentKind::Miner]);
    let b = world.spawn(&[ComponentKind::Miner]);
    tracker.update(&world);
    tracker.report_empty(b);

    world.begin_bulk();
    world.queue_destroy(b);
    tracker.update(&world);
    assert_eq!(tracker.matched_entities(ComponentKind::Miner), &[a, b]);

    world.end_bulk();
    tracker.update(&world);
    assert_eq!(tracker.matched_entities(ComponentKind::Miner), &[a]);
    assert_eq!(tracker.active_entities(ComponentKind::Miner), &[a]);
    assert_eq!(tracker.graph().edge_count(), 0);
}
