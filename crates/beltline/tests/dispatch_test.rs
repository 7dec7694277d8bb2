//! Integration tests for phase-ordered dispatch through the game loop.

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;

use beltline::core::{ComponentKind, EntityId, Signature, SimulationConfig, Subject};
use beltline::{GameLoop, GameSystem, SystemError, SystemPhase, SystemResult, TickContext};

type Log = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: &'static str,
    phase: SystemPhase,
    parallel: bool,
    log: Log,
}

impl GameSystem for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn phase(&self) -> SystemPhase {
        self.phase
    }

    fn parallel_safe(&self) -> bool {
        self.parallel
    }

    fn update(&mut self, ctx: &TickContext<'_>) -> SystemResult {
        self.log.lock().push(format!("{}@{}", self.name, ctx.frame));
        Ok(())
    }
}

fn recorder(name: &'static str, phase: SystemPhase, parallel: bool, log: &Log) -> Box<Recorder> {
    Box::new(Recorder {
        name,
        phase,
        parallel,
        log: Arc::clone(log),
    })
}

fn game(parallel_phases: bool) -> GameLoop {
    let mut config = SimulationConfig::default();
    config.dispatch.parallel_phases = parallel_phases;
    config.activity.idle_after_frames = 5;
    GameLoop::new(config, 64).unwrap()
}

#[test]
fn test_parallel_phase_joins_before_next_phase() {
    let mut game = game(true);
    let log = Log::default();
    game.add_system(recorder("wires", SystemPhase::Wiring, false, &log));
    game.add_system(recorder("belts_a", SystemPhase::Belt, true, &log));
    game.add_system(recorder("belts_b", SystemPhase::Belt, true, &log));

    let stats = game.tick();
    assert_eq!(stats.dispatch.parallel_phases, 1);
    assert_eq!(stats.dispatch.systems_run, 3);

    let log = log.lock();
    assert_eq!(log.len(), 3);
    assert_eq!(log[2], "wires@1");
    assert!(log[..2].contains(&"belts_a@1".to_string()));
    assert!(log[..2].contains(&"belts_b@1".to_string()));
}

#[test]
fn test_mixed_phase_runs_sequentially() {
    let mut game = game(true);
    let log = Log::default();
    game.add_system(recorder("safe", SystemPhase::Miner, true, &log));
    game.add_system(recorder("unsafe", SystemPhase::Miner, false, &log));

    let stats = game.tick();
    assert_eq!(stats.dispatch.parallel_phases, 0);
    assert_eq!(*log.lock(), vec!["safe@1", "unsafe@1"]);
}

struct Panicking;

impl GameSystem for Panicking {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn phase(&self) -> SystemPhase {
        SystemPhase::ItemAcceptor
    }

    fn update(&mut self, _ctx: &TickContext<'_>) -> SystemResult {
        panic!("acceptor exploded");
    }
}

struct Erroring;

impl GameSystem for Erroring {
    fn name(&self) -> &'static str {
        "erroring"
    }

    fn phase(&self) -> SystemPhase {
        SystemPhase::Belt
    }

    fn update(&mut self, _ctx: &TickContext<'_>) -> SystemResult {
        Err(SystemError::Failed("belt jammed".into()))
    }
}

#[test]
fn test_failing_systems_do_not_stop_the_tick() {
    let mut game = game(false);
    let log = Log::default();
    game.add_system(Box::new(Panicking));
    game.add_system(Box::new(Erroring));
    game.add_system(recorder("ejector", SystemPhase::ItemEjector, false, &log));

    let stats = game.tick();
    assert_eq!(stats.dispatch.systems_run, 3);
    assert_eq!(stats.dispatch.failures, 2);
    assert_eq!(*log.lock(), vec!["ejector@1"]);
    assert_eq!(game.systems().failures("panicking"), Some(1));
    assert_eq!(game.stats().failures, 2);
}

struct ParallelPanicking;

impl GameSystem for ParallelPanicking {
    fn name(&self) -> &'static str {
        "parallel_panicking"
    }

    fn phase(&self) -> SystemPhase {
        SystemPhase::Belt
    }

    fn parallel_safe(&self) -> bool {
        true
    }

    fn update(&mut self, _ctx: &TickContext<'_>) -> SystemResult {
        panic!("belt snapped");
    }
}

#[test]
fn test_panic_in_parallel_phase_is_isolated() {
    let mut game = game(true);
    let log = Log::default();
    game.add_system(Box::new(ParallelPanicking));
    game.add_system(recorder("belts", SystemPhase::Belt, true, &log));
    game.add_system(recorder("ejector", SystemPhase::ItemEjector, false, &log));

    let stats = game.tick();
    assert_eq!(stats.dispatch.parallel_phases, 1);
    assert_eq!(stats.dispatch.systems_run, 3);
    assert_eq!(stats.dispatch.failures, 1);
    assert_eq!(*log.lock(), vec!["belts@1", "ejector@1"]);
    assert_eq!(game.systems().failures("parallel_panicking"), Some(1));

    // The pool survives for the next tick
    game.tick();
    assert_eq!(game.systems().failures("parallel_panicking"), Some(2));
}

struct Blocker {
    pairs: Vec<(EntityId, EntityId)>,
}

impl GameSystem for Blocker {
    fn name(&self) -> &'static str {
        "blocker"
    }

    fn phase(&self) -> SystemPhase {
        SystemPhase::ItemEjector
    }

    fn update(&mut self, ctx: &TickContext<'_>) -> SystemResult {
        for (ejector, acceptor) in self.pairs.drain(..) {
            ctx.reports.blocked(ejector, acceptor);
        }
        Ok(())
    }
}

#[test]
fn test_reports_apply_on_next_tick() {
    let mut game = game(false);
    let (ejector, acceptor) = game.load(|world| {
        (
            world.spawn(&[ComponentKind::ItemEjector]),
            world.spawn(&[ComponentKind::ItemAcceptor]),
        )
    });
    game.add_system(Box::new(Blocker {
        pairs: vec![(ejector, acceptor)],
    }));

    game.tick();
    assert_eq!(game.activity().graph().edge_count(), 0);

    let stats = game.tick();
    assert_eq!(stats.dispatch.activity.reports_applied, 1);
    assert_eq!(game.activity().graph().dependents_of(acceptor.into()), &[Subject::Entity(ejector)]);

    // Blocked past the threshold, the ejector idles
    game.run_ticks(6);
    assert!(game.activity().active_entities(ComponentKind::ItemEjector).is_empty());
    assert_eq!(game.activity().active_entities(ComponentKind::ItemAcceptor), &[acceptor]);
}

struct Membership {
    members: Arc<Mutex<Vec<EntityId>>>,
}

impl GameSystem for Membership {
    fn name(&self) -> &'static str {
        "membership"
    }

    fn phase(&self) -> SystemPhase {
        SystemPhase::Storage
    }

    fn signature(&self) -> Option<Signature> {
        Some(Signature::new(&[ComponentKind::Storage, ComponentKind::StaticMapEntity]))
    }

    fn on_register(&mut self, entity: EntityId) {
        self.members.lock().push(entity);
    }

    fn on_unregister(&mut self, entity: EntityId) {
        self.members.lock().retain(|e| *e != entity);
    }

    fn update(&mut self, ctx: &TickContext<'_>) -> SystemResult {
        assert_eq!(ctx.matched, self.members.lock().as_slice());
        Ok(())
    }
}

#[test]
fn test_membership_hooks_follow_world() {
    let mut game = game(false);
    let existing = game.load(|world| {
        world.spawn(&[ComponentKind::Storage, ComponentKind::StaticMapEntity])
    });
    let members = Arc::new(Mutex::new(Vec::new()));
    game.add_system(Box::new(Membership {
        members: Arc::clone(&members),
    }));
    assert_eq!(*members.lock(), vec![existing]);

    let partial = game.world_mut().spawn(&[ComponentKind::Storage]);
    game.tick();
    assert_eq!(*members.lock(), vec![existing]);

    game.world_mut().add_component(partial, ComponentKind::StaticMapEntity);
    game.tick();
    assert_eq!(*members.lock(), vec![existing, partial]);

    game.world_mut().queue_destroy(existing);
    game.tick();
    assert_eq!(*members.lock(), vec![partial]);
    assert_eq!(game.systems().matched_entities("membership"), Some(&[partial][..]));
}

fn phase_strategy() -> impl Strategy<Value = SystemPhase> {
    (0..SystemPhase::ORDER.len()).prop_map(|i| SystemPhase::ORDER[i])
}

const NAMES: [&str; 6] = ["s0", "s1", "s2", "s3", "s4", "s5"];

proptest! {
    #[test]
    fn prop_dispatch_follows_phase_then_declaration_order(
        phases in prop::collection::vec(phase_strategy(), 1..NAMES.len()),
    ) {
        let mut game = game(false);
        let log = Log::default();
        for (name, phase) in NAMES.iter().zip(&phases) {
            game.add_system(recorder(name, *phase, false, &log));
        }
        game.tick();

        let mut expected: Vec<(SystemPhase, usize)> =
            phases.iter().copied().zip(0..).collect();
        expected.sort();
        let expected: Vec<String> = expected
            .into_iter()
            .map(|(_, i)| format!("{}@1", NAMES[i]))
            .collect();
        prop_assert_eq!(log.lock().clone(), expected);
    }
}
