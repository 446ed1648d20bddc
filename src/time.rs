//! Frame clock for driving the simulation.
//!
//! The simulation takes frame time in whole milliseconds. [`FrameClock`]
//! measures real time between ticks, or hands out a fixed step when
//! deterministic runs are wanted.

use std::time::{Duration, Instant};

/// Measures time between frames and keeps a running FPS figure.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_frame: Instant,
    delta_ms: u64,
    frame_count: u64,
    /// Fixed step in milliseconds, if any.
    fixed_step: Option<u64>,
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            delta_ms: 0,
            frame_count: 0,
            fixed_step: None,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_secs(1),
        }
    }

    /// Always report `step_ms` as the frame time.
    pub fn with_fixed_step(mut self, step_ms: u64) -> Self {
        self.fixed_step = Some(step_ms);
        self
    }

    /// Advance one frame. Returns the frame time in milliseconds.
    pub fn tick(&mut self) -> u64 {
        let now = Instant::now();
        let raw = now.duration_since(self.last_frame).as_millis() as u64;
        self.delta_ms = self.fixed_step.unwrap_or(raw);
        self.last_frame = now;
        self.frame_count += 1;

        let since = now.duration_since(self.fps_update_time);
        if since >= self.fps_update_interval {
            let frames = self.frame_count - self.fps_frame_count;
            self.fps = frames as f32 / since.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        self.delta_ms
    }

    /// Whether the FPS figure was refreshed on the last tick.
    pub fn fps_updated(&self) -> bool {
        self.fps_frame_count == self.frame_count && self.frame_count > 0
    }

    #[inline]
    pub fn delta_ms(&self) -> u64 {
        self.delta_ms
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.delta_ms(), 0);
        assert!(!clock.fps_updated());
    }

    #[test]
    fn test_tick_measures_time() {
        let mut clock = FrameClock::new();
        thread::sleep(Duration::from_millis(15));
        let dt = clock.tick();
        assert!(dt >= 15);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn test_fixed_step() {
        let mut clock = FrameClock::new().with_fixed_step(16);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(clock.tick(), 16);
        assert_eq!(clock.tick(), 16);
        assert_eq!(clock.frame(), 2);
    }
}
