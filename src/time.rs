//! Millisecond clock driving the lightning scheduler.
//!
//! Every timing value in the crate (`initial_delay_ms`, `hop_delay_ms`, the
//! phase envelope) is compared against a monotonic millisecond timestamp.
//! [`Clock`] produces those timestamps either from the wall clock or from a
//! fixed frame step, which keeps headless renders deterministic.
//!
//! # Example
//!
//! ```ignore
//! use sparkfield::time::Clock;
//!
//! let mut clock = Clock::fixed(1000.0 / 60.0);
//! let t0 = clock.tick();
//! let t1 = clock.tick();
//! assert!(t1 > t0);
//! ```

use std::time::Instant;

#[derive(Debug, Clone, Copy)]
enum Source {
    Wall(Instant),
    Fixed { step_ms: f64 },
}

/// Monotonic millisecond timestamps.
#[derive(Debug, Clone)]
pub struct Clock {
    source: Source,
    /// Last timestamp handed out.
    now_ms: f64,
    /// Time between the last two ticks.
    delta_ms: f64,
    frame_count: u64,
}

impl Clock {
    /// A clock following real time, starting at zero.
    pub fn wall() -> Self {
        Self {
            source: Source::Wall(Instant::now()),
            now_ms: 0.0,
            delta_ms: 0.0,
            frame_count: 0,
        }
    }

    /// A clock that advances by exactly `step_ms` per tick.
    ///
    /// The first tick returns `0.0`.
    pub fn fixed(step_ms: f64) -> Self {
        Self {
            source: Source::Fixed {
                step_ms: step_ms.max(0.0),
            },
            now_ms: 0.0,
            delta_ms: 0.0,
            frame_count: 0,
        }
    }

    /// Advance to the current frame and return its timestamp.
    pub fn tick(&mut self) -> f64 {
        let next = match self.source {
            Source::Wall(start) => start.elapsed().as_secs_f64() * 1000.0,
            Source::Fixed { step_ms } if self.frame_count > 0 => self.now_ms + step_ms,
            Source::Fixed { .. } => 0.0,
        };
        // Never run backwards, even if the platform clock stutters
        let next = next.max(self.now_ms);
        self.delta_ms = next - self.now_ms;
        self.now_ms = next;
        self.frame_count += 1;
        self.now_ms
    }

    /// Timestamp of the latest tick.
    #[inline]
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Current time without advancing a frame.
    ///
    /// A wall clock reads real time; a fixed clock stays on its last tick.
    pub fn peek_ms(&self) -> f64 {
        match self.source {
            Source::Wall(start) => (start.elapsed().as_secs_f64() * 1000.0).max(self.now_ms),
            Source::Fixed { .. } => self.now_ms,
        }
    }

    /// Milliseconds between the last two ticks.
    #[inline]
    pub fn delta_ms(&self) -> f64 {
        self.delta_ms
    }

    /// Number of ticks so far.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Start over from zero.
    pub fn reset(&mut self) {
        if let Source::Wall(_) = self.source {
            self.source = Source::Wall(Instant::now());
        }
        self.now_ms = 0.0;
        self.delta_ms = 0.0;
        self.frame_count = 0;
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::wall()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fixed_steps() {
        let mut clock = Clock::fixed(16.0);
        assert_eq!(clock.tick(), 0.0);
        assert_eq!(clock.tick(), 16.0);
        assert_eq!(clock.tick(), 32.0);
        assert_eq!(clock.delta_ms(), 16.0);
        assert_eq!(clock.frame(), 3);
    }

    #[test]
    fn test_wall_is_monotonic() {
        let mut clock = Clock::wall();
        let a = clock.tick();
        thread::sleep(Duration::from_millis(5));
        let b = clock.tick();
        assert!(b >= a + 4.0);
        assert_eq!(clock.now_ms(), b);
    }

    #[test]
    fn test_reset() {
        let mut clock = Clock::fixed(10.0);
        clock.tick();
        clock.tick();
        clock.reset();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.tick(), 0.0);
    }

    #[test]
    fn test_peek_does_not_tick() {
        let mut fixed = Clock::fixed(10.0);
        fixed.tick();
        fixed.tick();
        assert_eq!(fixed.peek_ms(), 10.0);
        assert_eq!(fixed.frame(), 2);

        let mut wall = Clock::wall();
        let a = wall.tick();
        thread::sleep(Duration::from_millis(5));
        assert!(wall.peek_ms() >= a + 4.0);
        assert_eq!(wall.now_ms(), a);
        assert_eq!(wall.frame(), 1);
    }

    #[test]
    fn test_negative_step_clamped() {
        let mut clock = Clock::fixed(-5.0);
        clock.tick();
        assert_eq!(clock.tick(), 0.0);
    }
}
