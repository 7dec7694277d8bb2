//! # Beltline Game Loop
//!
//! ```text
//! Tick N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. BEGIN                                                            │
//! │    └─ world.start_frame() publishes FrameStarted                    │
//! │                                                                     │
//! │ 2. BOOKKEEPING                                                      │
//! │    ├─ system registries drain lifecycle signals                     │
//! │    └─ activity tracker applies reports, idles, drains queues        │
//! │                                                                     │
//! │ 3. SYSTEMS                                                          │
//! │    └─ phases in fixed order, parallel where allowed                 │
//! │                                                                     │
//! │ 4. END                                                              │
//! │    ├─ destroyed entities freed (outside bulk operations)            │
//! │    └─ timing recorded, slow ticks logged                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::{Duration, Instant};

use beltline_core::{ActivityTracker, CoreResult, SimulationConfig, World};

use crate::system::GameSystem;
use crate::system_manager::{DispatchStats, SystemManager};
use crate::tick::TickClock;

/// Statistics for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Wall time of the whole tick in microseconds.
    pub total_us: u64,
    /// Dispatcher counters.
    pub dispatch: DispatchStats,
}

/// Owns the world, the activity tracker and the systems.
pub struct GameLoop {
    world: World,
    activity: ActivityTracker,
    systems: SystemManager,
    config: SimulationConfig,
    stats: TickStatsAccumulator,
}

impl GameLoop {
    /// Creates a loop over a world with room for `capacity` entities.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn new(config: SimulationConfig, capacity: usize) -> CoreResult<Self> {
        config.validate()?;
        let world = World::new(capacity);
        let activity = ActivityTracker::new(config.activity.clone(), &world);
        let systems = SystemManager::new(config.dispatch.clone());
        let slow_tick_us = config.dispatch.slow_tick_warn_ms.saturating_mul(1000);

        tracing::info!(
            capacity,
            idle_after_frames = config.activity.idle_after_frames,
            parallel_phases = config.dispatch.parallel_phases,
            "game loop created"
        );

        Ok(Self {
            world,
            activity,
            systems,
            config,
            stats: TickStatsAccumulator::new(slow_tick_us),
        })
    }

    /// Adds a system. Entities that already match are registered with it.
    pub fn add_system(&mut self, system: Box<dyn GameSystem>) {
        self.systems.add_system(&self.world, system);
    }

    /// Runs `f` as one bulk operation, then publishes the post-load hook.
    ///
    /// Registries defer removals until the operation ends and re-validate
    /// everything on the hook.
    pub fn load<R>(&mut self, f: impl FnOnce(&mut World) -> R) -> R {
        let result = self.world.bulk_operation(f);
        self.world.finish_loading();
        tracing::info!(entities = self.world.alive_count(), "world loaded");
        result
    }

    /// Runs one tick.
    pub fn tick(&mut self) -> TickStats {
        let started = Instant::now();
        let dispatch = self.systems.tick(&mut self.world, &mut self.activity);
        let stats = TickStats {
            total_us: elapsed_us(started),
            dispatch,
        };

        if self.stats.record(&stats) {
            tracing::warn!(
                frame = dispatch.frame,
                total_ms = stats.total_us / 1000,
                budget_ms = self.config.dispatch.slow_tick_warn_ms,
                "tick exceeded budget"
            );
        }
        stats
    }

    /// Runs `ticks` ticks back to back and returns the last tick's stats.
    pub fn run_ticks(&mut self, ticks: u64) -> TickStats {
        let mut last = TickStats::default();
        for _ in 0..ticks {
            last = self.tick();
        }
        last
    }

    /// Runs at the configured tick rate for roughly `duration`.
    ///
    /// Returns the number of ticks executed.
    pub fn run_for(&mut self, duration: Duration) -> u64 {
        let mut clock = TickClock::new(self.config.dispatch.tick_rate);
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            while clock.should_tick() {
                let start = clock.begin_tick();
                self.tick();
                clock.end_tick(start);
            }
            clock.wait_for_next_tick();
        }

        let timings = clock.stats();
        tracing::debug!(
            ticks = clock.tick_count(),
            late = timings.late_ticks,
            avg_us = timings.avg_tick_us,
            "paced run finished"
        );
        clock.tick_count()
    }

    /// The world.
    #[inline]
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The world, mutably. Edits are seen by systems on the next tick.
    #[inline]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The activity tracker.
    #[inline]
    #[must_use]
    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    /// The activity tracker, mutably.
    #[inline]
    pub fn activity_mut(&mut self) -> &mut ActivityTracker {
        &mut self.activity
    }

    /// The system dispatcher.
    #[inline]
    #[must_use]
    pub fn systems(&self) -> &SystemManager {
        &self.systems
    }

    /// The configuration in use.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Accumulated tick statistics.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> &TickStatsAccumulator {
        &self.stats
    }
}

impl std::fmt::Debug for GameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameLoop")
            .field("frame", &self.world.frame())
            .field("entities", &self.world.alive_count())
            .field("systems", &self.systems.system_count())
            .finish_non_exhaustive()
    }
}

/// Running totals over recorded ticks.
#[derive(Clone, Debug)]
pub struct TickStatsAccumulator {
    /// Ticks recorded.
    pub ticks_recorded: u64,
    /// Sum of total tick times.
    pub total_us_sum: u64,
    /// Sum of bookkeeping times.
    pub bookkeeping_us_sum: u64,
    /// Sum of system update times.
    pub systems_us_sum: u64,
    /// Shortest tick.
    pub min_tick_us: u64,
    /// Longest tick.
    pub max_tick_us: u64,
    /// Ticks over the slow-tick budget.
    pub ticks_over_budget: u64,
    /// System failures across all ticks.
    pub failures: u64,
    /// Subjects idled across all ticks.
    pub idled: u64,
    slow_tick_us: u64,
}

impl TickStatsAccumulator {
    /// Creates an accumulator with a slow-tick budget in microseconds.
    #[must_use]
    pub fn new(slow_tick_us: u64) -> Self {
        Self {
            ticks_recorded: 0,
            total_us_sum: 0,
            bookkeeping_us_sum: 0,
            systems_us_sum: 0,
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            ticks_over_budget: 0,
            failures: 0,
            idled: 0,
            slow_tick_us,
        }
    }

    /// Records a tick. Returns true if it was over budget.
    pub fn record(&mut self, stats: &TickStats) -> bool {
        self.ticks_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.bookkeeping_us_sum += stats.dispatch.bookkeeping_us;
        self.systems_us_sum += stats.dispatch.systems_us;
        self.min_tick_us = self.min_tick_us.min(stats.total_us);
        self.max_tick_us = self.max_tick_us.max(stats.total_us);
        self.failures += stats.dispatch.failures as u64;
        self.idled += stats.dispatch.activity.newly_idled as u64;

        let over = stats.total_us > self.slow_tick_us;
        if over {
            self.ticks_over_budget += 1;
        }
        over
    }

    /// Average tick time in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_tick_ms(&self) -> f64 {
        if self.ticks_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.ticks_recorded as f64) / 1000.0
    }

    /// Fraction of ticks over budget.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.ticks_recorded == 0 {
            return 0.0;
        }
        self.ticks_over_budget as f64 / self.ticks_recorded as f64
    }

    /// Logs a summary at info level.
    #[allow(clippy::cast_precision_loss)]
    pub fn log_summary(&self) {
        let (bookkeeping_ms, systems_ms) = if self.ticks_recorded == 0 {
            (0.0, 0.0)
        } else {
            let n = self.ticks_recorded as f64;
            (
                self.bookkeeping_us_sum as f64 / n / 1000.0,
                self.systems_us_sum as f64 / n / 1000.0,
            )
        };
        tracing::info!(
            ticks = self.ticks_recorded,
            avg_ms = format_args!("{:.3}", self.avg_tick_ms()),
            min_us = if self.ticks_recorded == 0 { 0 } else { self.min_tick_us },
            max_us = self.max_tick_us,
            bookkeeping_ms = format_args!("{bookkeeping_ms:.3}"),
            systems_ms = format_args!("{systems_ms:.3}"),
            over_budget = self.ticks_over_budget,
            failures = self.failures,
            idled = self.idled,
            "tick summary"
        );
    }
}

impl Default for TickStatsAccumulator {
    fn default() -> Self {
        Self::new(33_000)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_us(since: Instant) -> u64 {
    since.elapsed().as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use beltline_core::{ComponentKind, CoreError};

    #[test]
    fn test_game_loop_creation() {
        let game = GameLoop::new(SimulationConfig::default(), 64).unwrap();
        assert_eq!(game.world().frame(), 0);
        assert_eq!(game.systems().system_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SimulationConfig::default();
        config.dispatch.tick_rate = 0;
        assert!(matches!(
            GameLoop::new(config, 64),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_run_ticks_advances_frames() {
        let mut game = GameLoop::new(SimulationConfig::default(), 64).unwrap();
        let stats = game.run_ticks(5);
        assert_eq!(stats.dispatch.frame, 5);
        assert_eq!(game.stats().ticks_recorded, 5);
    }

    #[test]
    fn test_load_activates_entities() {
        let mut game = GameLoop::new(SimulationConfig::default(), 64).unwrap();
        let miners = game.load(|world| {
            (0..3)
                .map(|_| world.spawn(&[ComponentKind::Miner]))
                .collect::<Vec<_>>()
        });
        game.tick();
        assert_eq!(game.activity().active_entities(ComponentKind::Miner), miners.as_slice());
    }

    #[test]
    fn test_stats_accumulator() {
        let mut acc = TickStatsAccumulator::new(10_000);
        for i in 0..100u64 {
            acc.record(&TickStats {
                total_us: 5_000 + i * 100,
                dispatch: DispatchStats::default(),
            });
        }
        assert_eq!(acc.ticks_recorded, 100);
        assert_eq!(acc.ticks_over_budget, 49);
        assert!(acc.avg_tick_ms() > 5.0 && acc.avg_tick_ms() < 10.0);
    }
}
