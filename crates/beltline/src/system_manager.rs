//! # System Manager
//!
//! Owns every game system together with its filtered registry and runs
//! them phase by phase.
//!
//! ```text
//! tick(world, activity):
//!   1. world.start_frame()                 FrameStarted
//!   2. pump every system registry          on_register / on_unregister
//!   3. activity.update(world)              queues drained, idle sweep
//!   4. for phase in SystemPhase::ORDER:
//!        parallel?  ── rayon pool, joined before the next phase
//!        otherwise  ── declaration order
//!   5. world.flush_destroyed()             deferred while a bulk operation is open
//! ```
//!
//! A failing or panicking system is logged and counted; the tick always
//! completes.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use rayon::prelude::*;

use beltline_core::{
    ActivityStats, ActivityTracker, ComponentMask, DispatchConfig, EntityId, FilteredRegistry,
    MembershipObserver, ReportSender, World,
};

use crate::system::{GameSystem, SystemError, SystemPhase, SystemResult, TickContext};

/// Counters from one [`SystemManager::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Frame number of this tick.
    pub frame: u64,
    /// Lifecycle signals drained by system registries.
    pub signals: usize,
    /// Systems whose update ran.
    pub systems_run: usize,
    /// Systems whose update failed or panicked.
    pub failures: usize,
    /// Phases that ran on the rayon pool.
    pub parallel_phases: usize,
    /// Entity slots freed at the end of the tick.
    pub destroyed: usize,
    /// Activity tracker counters.
    pub activity: ActivityStats,
    /// Time spent pumping registries and updating activity.
    pub bookkeeping_us: u64,
    /// Time spent in system updates.
    pub systems_us: u64,
}

struct SystemSlot {
    system: Box<dyn GameSystem>,
    registry: Option<FilteredRegistry>,
    failures: u64,
}

/// Forwards registry membership changes to the owning system.
struct SystemObserver<'a>(&'a mut dyn GameSystem);

impl MembershipObserver for SystemObserver<'_> {
    fn on_register(&mut self, entity: EntityId) {
        self.0.on_register(entity);
    }

    fn on_unregister(&mut self, entity: EntityId) {
        self.0.on_unregister(entity);
    }
}

/// Phase-ordered dispatcher for game systems.
pub struct SystemManager {
    slots: Vec<SystemSlot>,
    config: DispatchConfig,
}

impl SystemManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            slots: Vec::new(),
            config,
        }
    }

    /// Adds a system.
    ///
    /// Filtered systems get a registry subscribed to `world`, pre-filled
    /// with the entities that already match.
    pub fn add_system(&mut self, world: &World, mut system: Box<dyn GameSystem>) {
        let registry = system.signature().map(|signature| {
            let mut registry = FilteredRegistry::new(signature, world.signals());
            registry.rescan(world, &mut SystemObserver(system.as_mut()));
            registry
        });
        tracing::debug!(
            system = system.name(),
            phase = ?system.phase(),
            matched = registry.as_ref().map_or(0, FilteredRegistry::len),
            "system added"
        );
        self.slots.push(SystemSlot {
            system,
            registry,
            failures: 0,
        });
    }

    /// Number of systems.
    #[inline]
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.slots.len()
    }

    /// System names in execution order.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&'static str> {
        let mut order = Vec::with_capacity(self.slots.len());
        for phase in SystemPhase::ORDER {
            for slot in self.slots.iter().filter(|s| s.system.phase() == phase) {
                order.push(slot.system.name());
            }
        }
        order
    }

    /// Names of the systems whose signature accepts `components`.
    #[must_use]
    pub fn interested_systems(&self, components: ComponentMask) -> Vec<&'static str> {
        self.slots
            .iter()
            .filter(|slot| slot.system.matches(components))
            .map(|slot| slot.system.name())
            .collect()
    }

    /// Entities a system currently matches. `None` for unknown names.
    #[must_use]
    pub fn matched_entities(&self, name: &str) -> Option<&[EntityId]> {
        self.slots
            .iter()
            .find(|slot| slot.system.name() == name)
            .map(|slot| match &slot.registry {
                Some(registry) => registry.cached_snapshot(),
                None => &[],
            })
    }

    /// Total failures recorded for a system.
    #[must_use]
    pub fn failures(&self, name: &str) -> Option<u64> {
        self.slots
            .iter()
            .find(|slot| slot.system.name() == name)
            .map(|slot| slot.failures)
    }

    /// Refreshes every system registry.
    pub fn refresh_caches(&mut self, world: &World) {
        for slot in &mut self.slots {
            let SystemSlot {
                system, registry, ..
            } = slot;
            if let Some(registry) = registry {
                registry.refresh(world, &mut SystemObserver(system.as_mut()));
            }
        }
    }

    fn pump(&mut self, world: &World) -> usize {
        let mut signals = 0;
        for slot in &mut self.slots {
            let SystemSlot {
                system, registry, ..
            } = slot;
            if let Some(registry) = registry {
                signals += registry.pump(world, &mut SystemObserver(system.as_mut())).signals;
                registry.snapshot();
            }
        }
        signals
    }

    /// Runs one full tick.
    pub fn tick(&mut self, world: &mut World, activity: &mut ActivityTracker) -> DispatchStats {
        let started = Instant::now();
        let frame = world.start_frame();
        let mut stats = DispatchStats {
            frame,
            ..DispatchStats::default()
        };

        stats.signals = self.pump(world);
        stats.activity = activity.update(world);
        let reports = activity.report_sender();
        stats.bookkeeping_us = elapsed_us(started);

        let systems_started = Instant::now();
        for phase in SystemPhase::ORDER {
            self.run_phase(phase, frame, world, activity, &reports, &mut stats);
        }
        stats.systems_us = elapsed_us(systems_started);

        stats.destroyed = world.flush_destroyed();
        stats
    }

    fn run_phase(
        &mut self,
        phase: SystemPhase,
        frame: u64,
        world: &World,
        activity: &ActivityTracker,
        reports: &ReportSender,
        stats: &mut DispatchStats,
    ) {
        let mut group: Vec<&mut SystemSlot> = self
            .slots
            .iter_mut()
            .filter(|slot| slot.system.phase() == phase)
            .collect();
        if group.is_empty() {
            return;
        }

        let parallel = self.config.parallel_phases
            && group.len() > 1
            && group.iter().all(|slot| slot.system.parallel_safe());

        let results: Vec<SystemResult> = if parallel {
            stats.parallel_phases += 1;
            group
                .par_iter_mut()
                .map(|slot| run_guarded(slot, frame, world, activity, reports))
                .collect()
        } else {
            group
                .iter_mut()
                .map(|slot| run_guarded(slot, frame, world, activity, reports))
                .collect()
        };

        for (slot, result) in group.iter_mut().zip(results) {
            stats.systems_run += 1;
            if let Err(error) = result {
                stats.failures += 1;
                slot.failures += 1;
                tracing::error!(
                    system = slot.system.name(),
                    frame,
                    %error,
                    "system update failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemManager")
            .field("systems", &self.execution_order())
            .field("config", &self.config)
            .finish()
    }
}

fn run_slot(
    slot: &mut SystemSlot,
    frame: u64,
    world: &World,
    activity: &ActivityTracker,
    reports: &ReportSender,
) -> SystemResult {
    let SystemSlot {
        system, registry, ..
    } = slot;
    let matched = match registry {
        Some(registry) => registry.cached_snapshot(),
        None => &[],
    };
    let ctx = TickContext {
        frame,
        world,
        matched,
        activity,
        reports,
    };
    system.update(&ctx)
}

/// Runs one system, turning a panic into [`SystemError::Panicked`].
fn run_guarded(
    slot: &mut SystemSlot,
    frame: u64,
    world: &World,
    activity: &ActivityTracker,
    reports: &ReportSender,
) -> SystemResult {
    panic::catch_unwind(AssertUnwindSafe(|| {
        run_slot(slot, frame, world, activity, reports)
    }))
    .unwrap_or_else(|payload| Err(panic_error(&*payload)))
}

fn panic_error(payload: &(dyn Any + Send)) -> SystemError {
    let message = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    SystemError::Panicked(message)
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_us(since: Instant) -> u64 {
    since.elapsed().as_micros() as u64
}
