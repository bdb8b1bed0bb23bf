//! Unique directed links between particles within one bolt.
//!
//! Several branches may traverse the same `from → to` hop (a forked child
//! shares its parent's prefix). The [`EdgeRegistry`] makes sure each hop is
//! created, timed and drawn exactly once per bolt.

use std::collections::HashMap;

use rand::Rng;

use crate::color::{rand_sym, Rgb};
use crate::config::LightningConfig;

/// Identity of an edge: ordered pair of particle indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub from: usize,
    pub to: usize,
}

impl EdgeKey {
    pub const fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }
}

/// Peak values assigned when the bolt finalizes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    pub width: f32,
    pub alpha: f32,
}

/// One link of the bolt.
///
/// Stores timing and style only; geometry is re-read from live particle
/// positions every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub key: EdgeKey,
    /// Creation time in milliseconds.
    pub t0: f64,
    pub base_width: f32,
    pub base_alpha: f32,
    /// `None` until the bolt finalizes.
    pub peak: Option<Peak>,
    pub is_winner: bool,
    pub color_base: Rgb,
    pub color_spark_win: Rgb,
    pub color_spark_lose: Rgb,
}

impl Edge {
    /// Create an edge with style jittered from the current config.
    pub fn new(
        key: EdgeKey,
        now: f64,
        base_alpha: f32,
        cfg: &LightningConfig,
        rng: &mut impl Rng,
    ) -> Self {
        Self {
            key,
            t0: now,
            base_width: jitter_width(cfg, rng),
            base_alpha,
            peak: None,
            is_winner: false,
            color_base: cfg.hsv_base.jittered(cfg.color_noise_base, rng).to_rgb(),
            color_spark_win: cfg
                .hsv_spark_win
                .jittered(cfg.color_noise_spark, rng)
                .to_rgb(),
            color_spark_lose: cfg
                .hsv_spark_lose
                .jittered(cfg.color_noise_spark, rng)
                .to_rgb(),
        }
    }

    /// Assign peak style for the spark phase.
    pub fn finalize(&mut self, is_winner: bool, cfg: &LightningConfig) {
        let (width_mult, alpha_mult) = if is_winner {
            (cfg.spark_width_mult, cfg.spark_alpha_mult)
        } else {
            (cfg.loser_width_mult, cfg.loser_alpha_mult)
        };
        self.is_winner = is_winner;
        self.peak = Some(Peak {
            width: self.base_width * width_mult,
            alpha: self.base_alpha * alpha_mult,
        });
    }
}

/// `line_width` scaled by `1 ± width_noise_pct`, never thinner than 0.1.
fn jitter_width(cfg: &LightningConfig, rng: &mut impl Rng) -> f32 {
    let pct = cfg.width_noise_pct.abs().clamp(0.0, 1.0);
    let mult = 1.0 + rand_sym(rng, pct);
    (cfg.line_width * mult).max(0.1)
}

/// Deduplicated edge set of one bolt, in creation order.
#[derive(Clone, Debug, Default)]
pub struct EdgeRegistry {
    edges: Vec<Edge>,
    lookup: HashMap<EdgeKey, usize>,
}

impl EdgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `from → to`, creating the edge on first sight.
    ///
    /// Returns the key either way; repeated calls never create a second edge
    /// or touch the existing one's timing.
    pub fn add_edge(
        &mut self,
        from: usize,
        to: usize,
        now: f64,
        base_alpha: f32,
        cfg: &LightningConfig,
        rng: &mut impl Rng,
    ) -> EdgeKey {
        let key = EdgeKey::new(from, to);
        if !self.lookup.contains_key(&key) {
            self.lookup.insert(key, self.edges.len());
            self.edges.push(Edge::new(key, now, base_alpha, cfg, rng));
        }
        key
    }

    pub fn get(&self, key: EdgeKey) -> Option<&Edge> {
        self.lookup.get(&key).map(|&i| &self.edges[i])
    }

    pub fn contains(&self, key: EdgeKey) -> bool {
        self.lookup.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.edges.iter_mut()
    }
}
