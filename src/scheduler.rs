//! Spawn cadence and the per-frame driver.
//!
//! [`Scheduler`] only does timestamp bookkeeping: when the next bolt may
//! spawn and how long to back off after a failed attempt. [`Lightning`] is
//! the facade a host calls once per frame; it owns the configuration, the
//! active bolt and the random source, and wires growth and rendering
//! together.
//!
//! Within one [`Lightning::update_at`] call at most one of these happens,
//! followed by exactly one render pass:
//!
//! - a spawn attempt (no bolt is active and the spawn time has come)
//! - one growth step (the active bolt is still growing and its hop delay passed)

use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;

use crate::bolt::Bolt;
use crate::config::LightningConfig;
use crate::error::ConfigError;
use crate::growth::{grow_step, spawn_bolt};
use crate::render::{draw_bolt, RenderStats};
use crate::surface::Surface;
use crate::time::Clock;
use crate::torus::Torus;

/// Shortest back-off after a failed spawn.
pub const MIN_RETRY_MS: f64 = 200.0;

/// Read access to the externally owned particles.
///
/// Indices must stay stable for the lifetime of a bolt; the positions
/// themselves may change every frame.
pub trait ParticleSource {
    /// Current live positions.
    fn positions(&self) -> &[Vec2];

    /// Current world size, if the source knows it.
    ///
    /// When `Some`, it replaces the size given to [`Lightning::set_size`].
    fn world_size(&self) -> Option<Vec2> {
        None
    }
}

impl ParticleSource for [Vec2] {
    fn positions(&self) -> &[Vec2] {
        self
    }
}

impl ParticleSource for Vec<Vec2> {
    fn positions(&self) -> &[Vec2] {
        self
    }
}

/// Delay before retrying a spawn that produced no bolt.
pub fn retry_delay(cfg: &LightningConfig) -> f64 {
    cfg.initial_delay_ms.max(MIN_RETRY_MS)
}

/// Spawn-time bookkeeping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scheduler {
    next_spawn: Option<f64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Earliest time the next spawn may be attempted, once armed.
    pub fn next_spawn(&self) -> Option<f64> {
        self.next_spawn
    }

    /// Schedule the very first spawn `initial_delay_ms` after `now`.
    ///
    /// Does nothing if a spawn is already scheduled.
    pub fn arm(&mut self, now: f64, cfg: &LightningConfig) {
        if self.next_spawn.is_none() {
            self.next_spawn = Some(now + cfg.initial_delay_ms);
        }
    }

    /// Whether a spawn attempt is allowed at `now`.
    pub fn is_due(&self, now: f64) -> bool {
        self.next_spawn.is_some_and(|t| now >= t)
    }

    /// A bolt started (or ended); wait a full interval.
    pub fn defer_interval(&mut self, now: f64, cfg: &LightningConfig) {
        self.next_spawn = Some(now + cfg.interval_ms);
    }

    /// A spawn attempt produced nothing; back off.
    pub fn defer_retry(&mut self, now: f64, cfg: &LightningConfig) {
        self.next_spawn = Some(now + retry_delay(cfg));
    }

    pub fn reset(&mut self) {
        self.next_spawn = None;
    }
}

/// Lightning over a particle field: configuration, cadence, the active bolt
/// and its random source.
///
/// # Example
///
/// ```ignore
/// use sparkfield::prelude::*;
///
/// let mut lightning = Lightning::with_seed(LightningConfig::default(), 7);
/// lightning.set_size(800.0, 600.0);
///
/// let mut surface = Raster::new(800, 600);
/// let particles: Vec<Vec2> = load_particles();
/// for frame in 0..600 {
///     lightning.update_at(frame as f64 * 16.0, &particles, &mut surface);
/// }
/// ```
#[derive(Debug)]
pub struct Lightning {
    config: LightningConfig,
    scheduler: Scheduler,
    bolt: Option<Bolt>,
    torus: Torus,
    rng: StdRng,
    clock: Clock,
    last_stats: RenderStats,
    /// Set by [`Lightning::config_mut`]; the next update normalizes.
    config_dirty: bool,
}

impl Lightning {
    /// A driver seeded from OS entropy.
    pub fn new(config: LightningConfig) -> Self {
        Self::from_rng(config, StdRng::from_entropy())
    }

    /// A driver with a reproducible random sequence.
    pub fn with_seed(config: LightningConfig, seed: u64) -> Self {
        Self::from_rng(config, StdRng::seed_from_u64(seed))
    }

    fn from_rng(mut config: LightningConfig, rng: StdRng) -> Self {
        config.normalize();
        Self {
            config,
            scheduler: Scheduler::new(),
            bolt: None,
            torus: Torus::new(0.0, 0.0),
            rng,
            clock: Clock::wall(),
            last_stats: RenderStats::default(),
            config_dirty: false,
        }
    }

    pub fn config(&self) -> &LightningConfig {
        &self.config
    }

    /// Direct access to the configuration.
    ///
    /// Changes take effect on the next update, which clamps them into range
    /// before anything else reads them.
    pub fn config_mut(&mut self) -> &mut LightningConfig {
        self.config_dirty = true;
        &mut self.config
    }

    /// Replace the configuration, normalizing it first.
    pub fn set_config(&mut self, mut config: LightningConfig) {
        config.normalize();
        self.config = config;
        self.config_dirty = false;
    }

    /// Merge a JSON object of options into the configuration.
    pub fn apply_patch(&mut self, patch: &Value) -> Result<(), ConfigError> {
        self.settle_config();
        self.config.apply_patch(patch)
    }

    /// Set the torus dimensions used for spawning and drawing.
    pub fn set_size(&mut self, width: f32, height: f32) {
        self.torus = Torus::new(width, height);
    }

    pub fn torus(&self) -> Torus {
        self.torus
    }

    /// The active bolt, if any.
    pub fn bolt(&self) -> Option<&Bolt> {
        self.bolt.as_ref()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Statistics of the most recent render pass.
    pub fn last_stats(&self) -> RenderStats {
        self.last_stats
    }

    /// Replace the clock used by [`Lightning::update`].
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    /// Advance and render one frame at the clock's current time.
    pub fn update<S>(&mut self, source: &S, surface: &mut dyn Surface) -> RenderStats
    where
        S: ParticleSource + ?Sized,
    {
        let now = self.clock.tick();
        self.update_at(now, source, surface)
    }

    /// Advance and render one frame at `now` milliseconds.
    ///
    /// A no-op while the configuration is disabled.
    pub fn update_at<S>(&mut self, now: f64, source: &S, surface: &mut dyn Surface) -> RenderStats
    where
        S: ParticleSource + ?Sized,
    {
        self.settle_config();
        if !self.config.enabled {
            return RenderStats::default();
        }
        self.refresh_size(source);
        self.scheduler.arm(now, &self.config);

        match self.bolt.as_mut() {
            None => {
                if self.scheduler.is_due(now) && !self.try_spawn(now, source.positions()) {
                    self.scheduler.defer_retry(now, &self.config);
                }
            }
            Some(bolt) => {
                if bolt.event_time.is_none() && now >= bolt.next_grow_at {
                    grow_step(bolt, &self.config, &mut self.rng, now);
                }
            }
        }

        self.draw(now, source.positions(), surface)
    }

    /// Start a bolt right away, ignoring the cadence.
    ///
    /// Does nothing and returns `false` while a bolt is already active or
    /// when no bolt could be created; in the latter case the next attempt is
    /// pushed back by the retry delay.
    ///
    /// The bolt is stamped with the clock's current reading; the clock does
    /// not advance a frame.
    pub fn spawn_now<S>(&mut self, source: &S) -> bool
    where
        S: ParticleSource + ?Sized,
    {
        let now = self.clock.peek_ms();
        self.spawn_now_at(now, source)
    }

    /// [`Lightning::spawn_now`] at an explicit time.
    pub fn spawn_now_at<S>(&mut self, now: f64, source: &S) -> bool
    where
        S: ParticleSource + ?Sized,
    {
        if self.bolt.is_some() {
            return false;
        }
        self.settle_config();
        self.refresh_size(source);
        if self.try_spawn(now, source.positions()) {
            self.scheduler.defer_interval(now, &self.config);
            true
        } else {
            self.scheduler.defer_retry(now, &self.config);
            false
        }
    }

    /// Drop the active bolt and forget the cadence.
    pub fn dispose(&mut self) {
        if self.bolt.take().is_some() {
            log::debug!("disposed active bolt");
        }
        self.scheduler.reset();
        self.last_stats = RenderStats::default();
    }

    /// Clamp values edited through [`Lightning::config_mut`].
    fn settle_config(&mut self) {
        if std::mem::take(&mut self.config_dirty) {
            self.config.normalize();
        }
    }

    fn refresh_size<S>(&mut self, source: &S)
    where
        S: ParticleSource + ?Sized,
    {
        if let Some(size) = source.world_size() {
            self.torus = Torus::new(size.x, size.y);
        }
    }

    fn try_spawn(&mut self, now: f64, positions: &[Vec2]) -> bool {
        self.bolt = spawn_bolt(positions, self.torus, &self.config, &mut self.rng, now);
        self.bolt.is_some()
    }

    fn draw(&mut self, now: f64, positions: &[Vec2], surface: &mut dyn Surface) -> RenderStats {
        let Some(bolt) = self.bolt.as_mut() else {
            self.last_stats = RenderStats::default();
            return self.last_stats;
        };

        let stats = draw_bolt(surface, bolt, positions, self.torus, &self.config, now);
        if stats.skipped {
            log::trace!("nothing to draw at {now}");
        }
        // Ending follows the bolt's own timing, never what reached the surface
        if bolt.faded_out(&self.config, now) {
            bolt.ended = true;
        }
        if bolt.ended {
            log::debug!("bolt ended with {} edges", bolt.edges.len());
            self.bolt = None;
            self.scheduler.defer_interval(now, &self.config);
        }
        self.last_stats = stats;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Recorder;

    fn line() -> Vec<Vec2> {
        (0..8).map(|i| Vec2::new(10.0 + i as f32 * 110.0, 300.0)).collect()
    }

    fn lightning() -> Lightning {
        let cfg = LightningConfig {
            split_chance: 0.0,
            left_col_width: 20.0,
            ..LightningConfig::default()
        };
        let mut l = Lightning::with_seed(cfg, 9);
        l.set_size(800.0, 600.0);
        l
    }

    #[test]
    fn test_scheduler_arm_is_sticky() {
        let cfg = LightningConfig::default();
        let mut s = Scheduler::new();
        assert!(!s.is_due(1e9));
        s.arm(100.0, &cfg);
        s.arm(900.0, &cfg);
        assert_eq!(s.next_spawn(), Some(500.0));
        assert!(!s.is_due(499.0));
        assert!(s.is_due(500.0));
    }

    #[test]
    fn test_retry_delay_floor() {
        let mut cfg = LightningConfig::default();
        cfg.initial_delay_ms = 50.0;
        assert_eq!(retry_delay(&cfg), MIN_RETRY_MS);
        cfg.initial_delay_ms = 400.0;
        assert_eq!(retry_delay(&cfg), 400.0);
    }

    #[test]
    fn test_disabled_is_noop() {
        let mut l = lightning();
        l.config_mut().enabled = false;
        let mut rec = Recorder::new();
        for t in [0.0, 500.0, 1000.0] {
            l.update_at(t, &line(), &mut rec);
        }
        assert!(l.bolt().is_none());
        assert!(l.scheduler().next_spawn().is_none());
        assert!(rec.commands.is_empty());
    }

    #[test]
    fn test_first_spawn_waits_initial_delay() {
        let mut l = lightning();
        let mut rec = Recorder::new();
        l.update_at(0.0, &line(), &mut rec);
        assert!(l.bolt().is_none());
        l.update_at(399.0, &line(), &mut rec);
        assert!(l.bolt().is_none());
        l.update_at(400.0, &line(), &mut rec);
        assert!(l.bolt().is_some());
        // Spawning and growing never share a call
        assert!(l.bolt().unwrap().edges.is_empty());
        l.update_at(400.0, &line(), &mut rec);
        assert_eq!(l.bolt().unwrap().edges.len(), 1);
    }

    #[test]
    fn test_failed_spawn_backs_off() {
        let mut l = lightning();
        let mut rec = Recorder::new();
        let far = vec![Vec2::new(400.0, 300.0)];
        l.update_at(0.0, &far, &mut rec);
        l.update_at(400.0, &far, &mut rec);
        assert!(l.bolt().is_none());
        assert_eq!(l.scheduler().next_spawn(), Some(800.0));
    }

    #[test]
    fn test_spawn_now() {
        let mut l = lightning();
        let empty: Vec<Vec2> = Vec::new();
        assert!(!l.spawn_now_at(10.0, &empty));
        assert_eq!(l.scheduler().next_spawn(), Some(410.0));

        assert!(l.spawn_now_at(20.0, &line()));
        assert_eq!(l.scheduler().next_spawn(), Some(1020.0));
        assert!(!l.spawn_now_at(30.0, &line()));
    }

    #[test]
    fn test_bolt_lifecycle_ends_and_rearms() {
        let mut l = lightning();
        let mut rec = Recorder::new();
        let pts = line();
        let mut now = 0.0;
        let mut saw_bolt = false;
        let mut ended_at = None;
        while now < 5000.0 {
            l.update_at(now, &pts, &mut rec);
            match (saw_bolt, l.bolt().is_some()) {
                (false, true) => saw_bolt = true,
                (true, false) => {
                    ended_at = Some(now);
                    break;
                }
                _ => {}
            }
            now += 16.0;
        }
        let ended_at = ended_at.expect("bolt never ended");
        assert_eq!(l.scheduler().next_spawn(), Some(ended_at + 1000.0));
    }

    #[test]
    fn test_empty_frame_keeps_sparking_bolt() {
        let mut l = lightning();
        let mut rec = Recorder::new();
        let pts = line();
        let mut now = 0.0;
        let event = loop {
            l.update_at(now, &pts, &mut rec);
            if let Some(t) = l.bolt().and_then(|b| b.event_time) {
                break t;
            }
            assert!(now < 2000.0, "bolt never sparked");
            now += 10.0;
        };

        // One frame with no particles in the middle of the spark hold
        let empty: Vec<Vec2> = Vec::new();
        let stats = l.update_at(event + 150.0, &empty, &mut rec);
        assert!(stats.skipped);
        assert!(l.bolt().is_some());

        let stats = l.update_at(event + 160.0, &pts, &mut rec);
        assert!(stats.alive);
        assert!(l.bolt().is_some());
    }

    #[test]
    fn test_first_hop_win_plays_full_spark() {
        let cfg = LightningConfig {
            split_chance: 0.0,
            ..LightningConfig::default()
        };
        let mut l = Lightning::with_seed(cfg.clone(), 4);
        l.set_size(200.0, 200.0);
        let pts = vec![Vec2::new(60.0, 100.0), Vec2::new(160.0, 100.0)];
        let mut rec = Recorder::new();

        assert!(l.spawn_now_at(0.0, &pts));
        l.update_at(10.0, &pts, &mut rec);
        let bolt = l.bolt().expect("bolt dropped on the frame it won");
        assert_eq!(bolt.winner, Some(0));
        assert_eq!(bolt.event_time, Some(10.0));

        let stats = l.update_at(10.0 + cfg.spark_rise_ms + 100.0, &pts, &mut rec);
        assert!(stats.alive);
        assert!(l.bolt().is_some());

        let end = 10.0 + cfg.spark_rise_ms + cfg.spark_hold_ms + cfg.fade_ms;
        l.update_at(end + 1.0, &pts, &mut rec);
        assert!(l.bolt().is_none());
    }

    #[test]
    fn test_config_mut_is_clamped_on_update() {
        let mut l = lightning();
        l.config_mut().split_chance = 5.0;
        l.config_mut().max_step_dist = 1.0;
        let mut rec = Recorder::new();
        l.update_at(0.0, &line(), &mut rec);
        assert_eq!(l.config().split_chance, 1.0);
        assert_eq!(l.config().max_step_dist, 8.0);
    }

    #[test]
    fn test_spawn_now_stamps_clock_time() {
        let mut l = lightning();
        l.set_clock(Clock::fixed(100.0));
        let mut rec = Recorder::new();
        for _ in 0..3 {
            l.update(&line(), &mut rec);
        }
        assert!(l.spawn_now(&line()));
        assert_eq!(l.bolt().unwrap().next_grow_at, 200.0);
        assert_eq!(l.scheduler().next_spawn(), Some(1200.0));
    }

    #[test]
    fn test_world_size_from_source() {
        struct Bounded(Vec<Vec2>);
        impl ParticleSource for Bounded {
            fn positions(&self) -> &[Vec2] {
                &self.0
            }
            fn world_size(&self) -> Option<Vec2> {
                Some(Vec2::new(320.0, 240.0))
            }
        }
        let mut l = Lightning::with_seed(LightningConfig::default(), 1);
        let mut rec = Recorder::new();
        l.update_at(0.0, &Bounded(vec![Vec2::ZERO]), &mut rec);
        assert_eq!(l.torus(), Torus::new(320.0, 240.0));
    }

    #[test]
    fn test_update_follows_clock() {
        let mut l = lightning();
        l.set_clock(Clock::fixed(100.0));
        let mut rec = Recorder::new();
        for _ in 0..4 {
            l.update(&line(), &mut rec);
        }
        // Ticks at 0, 100, 200, 300: still inside the initial delay
        assert!(l.bolt().is_none());
        l.update(&line(), &mut rec);
        assert!(l.bolt().is_some());
    }

    #[test]
    fn test_dispose_clears() {
        let mut l = lightning();
        assert!(l.spawn_now_at(0.0, &line()));
        l.dispose();
        assert!(l.bolt().is_none());
        assert!(l.scheduler().next_spawn().is_none());
    }
}
