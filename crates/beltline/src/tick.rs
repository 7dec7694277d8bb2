//! # Tick Clock
//!
//! Fixed-timestep pacing for the simulation loop.
//!
//! The clock accumulates wall time and hands out ticks in fixed steps, so
//! a slow tick is followed by catch-up ticks instead of a longer step.

use std::time::{Duration, Instant};

/// Upper bound on queued catch-up time. Anything beyond is dropped.
const MAX_ACCUMULATED_TICKS: u32 = 8;

/// Fixed-timestep tick controller.
pub struct TickClock {
    tick_duration: Duration,
    last_poll: Instant,
    accumulator: Duration,
    tick_count: u64,
    stats: TickTimings,
}

/// Tick duration statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickTimings {
    /// Shortest tick observed.
    pub min_tick_us: u64,
    /// Longest tick observed.
    pub max_tick_us: u64,
    /// Rolling average over roughly the last 16 ticks.
    pub avg_tick_us: u64,
    /// Ticks that took longer than one step.
    pub late_ticks: u64,
    /// Ticks measured.
    pub total_ticks: u64,
}

impl TickTimings {
    fn fresh(step: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: duration_us(step),
            late_ticks: 0,
            total_ticks: 0,
        }
    }
}

impl TickClock {
    /// Creates a clock running at `tick_rate` ticks per second.
    ///
    /// # Panics
    ///
    /// Panics if `tick_rate` is zero. Validated configs never carry zero.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        assert!(tick_rate > 0, "tick rate must be positive");
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate));
        Self {
            tick_duration,
            last_poll: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: TickTimings::fresh(tick_duration),
        }
    }

    /// Returns true while a tick is due. Call in a loop until false.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_poll);
        self.last_poll = now;

        let cap = self.tick_duration * MAX_ACCUMULATED_TICKS;
        if self.accumulator > cap {
            tracing::warn!(
                dropped_us = duration_us(self.accumulator - cap),
                "simulation fell behind, dropping catch-up time"
            );
            self.accumulator = cap;
        }
        self.accumulator >= self.tick_duration
    }

    /// Consumes one step and returns the tick start time.
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.accumulator = self.accumulator.saturating_sub(self.tick_duration);
        self.tick_count += 1;
        Instant::now()
    }

    /// Records the duration of the tick started at `start`.
    pub fn end_tick(&mut self, start: Instant) {
        let elapsed = start.elapsed();
        let us = duration_us(elapsed);

        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(us);
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + us) / 16;
        if elapsed > self.tick_duration {
            self.stats.late_ticks += 1;
        }
    }

    /// Sleeps until the next step is due.
    pub fn wait_for_next_tick(&self) {
        let elapsed = self.last_poll.elapsed() + self.accumulator;
        if let Some(remaining) = self.tick_duration.checked_sub(elapsed) {
            std::thread::sleep(remaining);
        }
    }

    /// Ticks handed out so far.
    #[inline]
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing statistics.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &TickTimings {
        &self.stats
    }

    /// Length of one step.
    #[inline]
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Clears timing statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickTimings::fresh(self.tick_duration);
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(60)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_us(duration: Duration) -> u64 {
    duration.as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_creation() {
        let clock = TickClock::new(60);
        assert_eq!(clock.tick_count(), 0);
        assert_eq!(clock.tick_duration(), Duration::from_micros(16_666));
        assert_eq!(clock.stats().total_ticks, 0);
    }

    #[test]
    fn test_tick_due_after_step() {
        let mut clock = TickClock::new(1000);
        std::thread::sleep(Duration::from_millis(3));
        assert!(clock.should_tick());

        let start = clock.begin_tick();
        clock.end_tick(start);
        assert_eq!(clock.tick_count(), 1);
        assert_eq!(clock.stats().total_ticks, 1);
    }

    #[test]
    fn test_catch_up_is_capped() {
        let mut clock = TickClock::new(1000);
        std::thread::sleep(Duration::from_millis(30));

        let mut ticks = 0;
        while clock.should_tick() {
            let start = clock.begin_tick();
            clock.end_tick(start);
            ticks += 1;
        }
        assert!(ticks < 30, "ran {ticks} catch-up ticks, cap is {MAX_ACCUMULATED_TICKS}");
        assert!(ticks >= 1);
    }

    #[test]
    fn test_reset_stats() {
        let mut clock = TickClock::new(100);
        let start = clock.begin_tick();
        clock.end_tick(start);
        clock.reset_stats();
        assert_eq!(clock.stats().total_ticks, 0);
        assert_eq!(clock.stats().min_tick_us, u64::MAX);
    }
}
