//! Frame timing.
//!
//! The [`Time`] resource is updated by [`Application::frame`](crate::app::Application::frame)
//! once per frame. Systems read it for frame delta, elapsed time, how many
//! fixed ticks ran and the interpolation alpha for rendering.

use std::time::Duration;

/// Frame timing resource. Inserted by the application and updated each frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Time {
    /// Variable delta of the current frame, in seconds.
    delta: f64,
    /// Sum of all frame deltas.
    elapsed: f64,
    frame_count: u64,
    /// Fixed-step ticks run during the current frame.
    fixed_ticks: u32,
    fixed_dt: f64,
    /// Blend factor between the last two fixed states, in `[0, 1)`.
    alpha: f64,
}

impl Time {
    pub fn new(fixed_dt: f64) -> Self {
        Self {
            fixed_dt,
            ..Self::default()
        }
    }

    /// Called at the start of each frame with the real (wall-clock) delta.
    /// Non-finite and negative deltas count as zero.
    pub(crate) fn begin_frame(&mut self, dt: f64) {
        self.delta = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.elapsed += self.delta;
        self.frame_count += 1;
        self.fixed_ticks = 0;
    }

    pub(crate) fn record_fixed_tick(&mut self) {
        self.fixed_ticks += 1;
    }

    pub(crate) fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
    }

    /// Delta of the current frame.
    pub fn delta(&self) -> Duration {
        Duration::try_from_secs_f64(self.delta).unwrap_or(Duration::MAX)
    }

    pub fn delta_secs(&self) -> f64 {
        self.delta
    }

    /// Total elapsed time since the first frame.
    pub fn elapsed(&self) -> Duration {
        Duration::try_from_secs_f64(self.elapsed).unwrap_or(Duration::MAX)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed
    }

    /// Number of frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Fixed ticks run during the current frame.
    pub fn fixed_ticks(&self) -> u32 {
        self.fixed_ticks
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    /// Interpolation factor published before `PreRender`.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Estimated FPS based on the current frame's delta.
    pub fn fps(&self) -> f64 {
        if self.delta > 0.0 { 1.0 / self.delta } else { 0.0 }
    }
}
