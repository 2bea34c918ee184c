//! Time management utilities
//!
//! [`FrameClock`] is the single writer of frame timing. It is ticked exactly
//! once per frame by the engine before any phase runs; systems only ever see
//! the immutable [`FrameTime`] snapshot carried by the frame context.

use std::time::{Duration, Instant};

/// Immutable timing snapshot for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Scaled time since the previous frame, in seconds
    pub delta: f32,
    /// Real time since the previous frame, in seconds
    pub unscaled_delta: f32,
    /// Scaled time since the clock started
    pub elapsed: f64,
    /// Real time since the clock started
    pub unscaled_elapsed: f64,
    /// Scale applied to this frame
    pub time_scale: f32,
    /// Number of completed ticks, including this one
    pub frame_count: u64,
}

/// Frame clock with scaled and unscaled time
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_frame: Option<Instant>,
    time_scale: f32,
    current: FrameTime,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a clock with a time scale of 1.0
    pub fn new() -> Self {
        Self::with_time_scale(1.0)
    }

    /// Create a clock with a custom time scale
    pub fn with_time_scale(time_scale: f32) -> Self {
        Self {
            last_frame: None,
            time_scale,
            current: FrameTime {
                time_scale,
                ..FrameTime::default()
            },
        }
    }

    /// Advance the clock by an explicit real-time delta (seconds)
    ///
    /// Negative or non-finite deltas are clamped to zero.
    pub fn tick(&mut self, unscaled_delta: f32) -> FrameTime {
        let unscaled_delta = if unscaled_delta.is_finite() { unscaled_delta.max(0.0) } else { 0.0 };
        let delta = unscaled_delta * self.time_scale;

        self.current = FrameTime {
            delta,
            unscaled_delta,
            elapsed: self.current.elapsed + f64::from(delta),
            unscaled_elapsed: self.current.unscaled_elapsed + f64::from(unscaled_delta),
            time_scale: self.time_scale,
            frame_count: self.current.frame_count + 1,
        };
        self.current
    }

    /// Advance the clock using wall-clock time since the previous call
    pub fn tick_realtime(&mut self) -> FrameTime {
        let now = Instant::now();
        let delta = self
            .last_frame
            .map_or(0.0, |last| now.duration_since(last).as_secs_f32());
        self.last_frame = Some(now);
        self.tick(delta)
    }

    /// Change the time scale; applies from the next tick
    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.time_scale = time_scale.max(0.0);
    }

    /// Current time scale
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Snapshot of the most recent tick
    pub fn current(&self) -> FrameTime {
        self.current
    }
}

/// Simple stopwatch for measuring elapsed time
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a new stopped stopwatch
    pub fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a new stopwatch and start it immediately
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start the stopwatch
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Stop the stopwatch and accumulate elapsed time
    pub fn stop(&mut self) {
        if let Some(start) = self.start_time.take() {
            self.elapsed += start.elapsed();
        }
    }

    /// Get the elapsed time
    pub fn elapsed(&self) -> Duration {
        let running = self.start_time.map_or(Duration::ZERO, |start| start.elapsed());
        self.elapsed + running
    }

    /// Get the elapsed time in milliseconds
    pub fn elapsed_millis(&self) -> f32 {
        self.elapsed().as_secs_f32() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tick_applies_time_scale() {
        let mut clock = FrameClock::with_time_scale(0.5);
        let time = clock.tick(0.016);

        assert_relative_eq!(time.delta, 0.008);
        assert_relative_eq!(time.unscaled_delta, 0.016);
        assert_eq!(time.frame_count, 1);
    }

    #[test]
    fn test_elapsed_accumulates() {
        let mut clock = FrameClock::new();
        for _ in 0..10 {
            clock.tick(0.1);
        }
        let time = clock.current();

        assert_relative_eq!(time.elapsed, 1.0, epsilon = 1e-5);
        assert_eq!(time.frame_count, 10);
    }

    #[test]
    fn test_time_scale_change_applies_next_tick() {
        let mut clock = FrameClock::new();
        clock.tick(1.0);
        clock.set_time_scale(2.0);
        let time = clock.tick(1.0);

        assert_relative_eq!(time.delta, 2.0);
        assert_relative_eq!(time.elapsed, 3.0);
        assert_relative_eq!(time.unscaled_elapsed, 2.0);
    }

    #[test]
    fn test_invalid_delta_is_clamped() {
        let mut clock = FrameClock::new();
        assert_relative_eq!(clock.tick(-1.0).delta, 0.0);
        assert_relative_eq!(clock.tick(f32::NAN).delta, 0.0);
    }
}
