//! # Activity Tracking Benchmark
//!
//! REQUIREMENTS:
//! - 100,000 tracked entities
//! - Idle entities must not cost per-tick work in the drain
//!
//! Run with: `cargo bench --package beltline_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use beltline_core::{ActivityConfig, ActivityTracker, ComponentKind, EntityId, FilteredRegistry, Signature, World};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const ENTITY_COUNT: usize = 100_000;

fn populated_world(count: usize) -> (World, Vec<EntityId>) {
    let mut world = World::new(count);
    let ids = (0..count)
        .map(|i| {
            if i % 2 == 0 {
                world.spawn(&[ComponentKind::ItemAcceptor, ComponentKind::ItemEjector])
            } else {
                world.spawn(&[ComponentKind::Belt])
            }
        })
        .collect();
    (world, ids)
}

/// Benchmark: Rescan a registry over a loaded world.
fn bench_registry_rescan(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_rescan");
    for count in [10_000, ENTITY_COUNT] {
        let (world, _) = populated_world(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut registry = FilteredRegistry::new(
                    Signature::new(&[ComponentKind::ItemAcceptor, ComponentKind::ItemEjector]),
                    world.signals(),
                );
                registry.rescan(&world, &mut ());
                black_box(registry.len())
            });
        });
    }
    group.finish();
}

/// Benchmark: Steady-state tracker update with most entities idled.
fn bench_tracker_update_mostly_idle(c: &mut Criterion) {
    let (world, ids) = populated_world(ENTITY_COUNT);
    let mut tracker = ActivityTracker::new(ActivityConfig::with_threshold(1), &world);
    for id in ids.iter().step_by(2).skip(100) {
        tracker.report_full(*id, None);
    }
    for _ in 0..3 {
        tracker.update(&world);
    }

    c.bench_function("tracker_update_100k_mostly_idle", |b| {
        b.iter(|| black_box(tracker.update(&world)));
    });
}

/// Benchmark: Report full then resolve, one subject at a time.
fn bench_report_resolve(c: &mut Criterion) {
    let (world, ids) = populated_world(10_000);
    let mut tracker = ActivityTracker::new(ActivityConfig::with_threshold(60), &world);
    let acceptors: Vec<EntityId> = ids.iter().step_by(2).copied().collect();

    c.bench_function("report_full_resolve_5k", |b| {
        b.iter(|| {
            for pair in acceptors.chunks_exact(2) {
                tracker.report_full(pair[0], Some(pair[1].into()));
            }
            for pair in acceptors.chunks_exact(2) {
                tracker.report_resolved(pair[1], None);
                tracker.report_resolved(pair[0], None);
            }
            black_box(tracker.graph().edge_count())
        });
    });
}

criterion_group!(
    benches,
    bench_registry_rescan,
    bench_tracker_update_mostly_idle,
    bench_report_resolve,
);
criterion_main!(benches);
