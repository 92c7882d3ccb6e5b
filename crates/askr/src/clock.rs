//! Fixed-timestep clock.
//!
//! Real frame time is fed into an accumulator; the simulation then consumes
//! it in constant `fixed_dt` slices:
//!
//! ```text
//! clock.update(frame_dt);
//! while clock.consume_tick() {
//!     step(fixed_dt);
//! }
//! render(clock.alpha());   // leftover fraction of a tick
//! ```
//!
//! The accumulator is capped at `max_accumulator` so a long stall (debugger,
//! window drag) runs a bounded number of catch-up ticks instead of spiralling.

use crate::config::ClockConfig;

#[derive(Debug, Clone)]
pub struct GameClock {
    fixed_dt: f64,
    max_accumulator: f64,
    accumulator: f64,
    alpha: f64,
}

impl GameClock {
    /// # Panics
    ///
    /// Panics unless `fixed_dt` is positive and both values are finite. A
    /// zero step would make [`consume_tick`](Self::consume_tick) succeed forever.
    pub fn new(fixed_dt: f64, max_accumulator: f64) -> Self {
        assert!(
            fixed_dt.is_finite() && fixed_dt > 0.0,
            "GameClock fixed_dt must be positive and finite, got {fixed_dt}"
        );
        assert!(
            max_accumulator.is_finite(),
            "GameClock max_accumulator must be finite, got {max_accumulator}"
        );
        Self {
            fixed_dt,
            max_accumulator,
            accumulator: 0.0,
            alpha: 0.0,
        }
    }

    pub fn from_config(config: &ClockConfig) -> Self {
        Self::new(config.fixed_dt, config.max_accumulator)
    }

    /// Add a frame's real delta. Negative deltas count as zero.
    pub fn update(&mut self, dt: f64) {
        self.accumulator += dt.max(0.0);
        if self.accumulator > self.max_accumulator {
            log::debug!(
                "clock accumulator clamped from {:.4}s to {:.4}s",
                self.accumulator,
                self.max_accumulator
            );
            self.accumulator = self.max_accumulator;
        }
    }

    /// Consume one fixed step if enough time has accumulated.
    ///
    /// When it returns `false`, [`alpha`](Self::alpha) holds the leftover
    /// fraction of a step.
    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.fixed_dt {
            self.accumulator -= self.fixed_dt;
            true
        } else {
            self.alpha = self.accumulator / self.fixed_dt;
            false
        }
    }

    /// Drop any accumulated time.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.alpha = 0.0;
    }

    /// Seconds per simulation tick.
    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    /// Cap on accumulated time, in seconds.
    pub fn max_accumulator(&self) -> f64 {
        self.max_accumulator
    }

    /// Time banked but not yet consumed by a tick.
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Leftover fraction of a tick after the last drain, in `[0, 1)`.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::from_config(&ClockConfig::default())
    }
}
