//! Time-based visual phases of an edge.
//!
//! Nothing here is stored: every frame the renderer asks [`evaluate`] for an
//! edge's current look, given its own creation time and the bolt's spark
//! event time.
//!
//! | Phase | Clock | Alpha | Width |
//! |---|---|---|---|
//! | Rise | edge age `0..rise_ms` | `0 → base` | `0.5 → base` |
//! | Steady | until the spark event | base | base |
//! | SparkRise | `0..spark_rise_ms` after event | `base → peak` | `base → peak` |
//! | SparkHold | next `spark_hold_ms` | peak | peak |
//! | Fade | next `fade_ms` | `peak → 0` | `peak → 0` |
//! | Gone | afterwards | 0 | 0 |
//!
//! Color, render mode and line cap switch from the base set to the winner or
//! loser spark set exactly at the event.

use crate::color::Rgb;
use crate::config::{LightningConfig, RenderMode};
use crate::edges::{Edge, Peak};
use crate::surface::LineCap;

/// Alpha at or below which an edge counts as invisible.
pub const ALPHA_EPSILON: f32 = 0.001;

/// Width an edge starts from during its rise.
pub const RISE_START_WIDTH: f32 = 0.5;

/// Which segment of the envelope an edge is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgePhase {
    Rise,
    Steady,
    SparkRise,
    SparkHold,
    Fade,
    Gone,
}

/// Resolved look of an edge at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeVisual {
    pub phase: EdgePhase,
    pub alpha: f32,
    pub width: f32,
    pub color: Rgb,
    pub mode: RenderMode,
    pub cap: LineCap,
}

impl EdgeVisual {
    /// Whether the edge should be drawn at all.
    pub fn is_visible(&self) -> bool {
        self.alpha > ALPHA_EPSILON
    }
}

#[inline]
fn clamp01(x: f64) -> f32 {
    x.clamp(0.0, 1.0) as f32
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Progress through a phase of length `duration`; empty phases are complete.
#[inline]
fn progress(elapsed: f64, duration: f64) -> f32 {
    if duration <= 0.0 {
        1.0
    } else {
        clamp01(elapsed / duration)
    }
}

/// Resolve `edge` at time `now`.
///
/// Returns `None` for an edge created in the future relative to `now`.
pub fn evaluate(
    edge: &Edge,
    event_time: Option<f64>,
    cfg: &LightningConfig,
    now: f64,
) -> Option<EdgeVisual> {
    let age = now - edge.t0;
    if age < 0.0 {
        return None;
    }

    let base = EdgeVisual {
        phase: EdgePhase::Steady,
        alpha: edge.base_alpha,
        width: edge.base_width,
        color: edge.color_base,
        mode: cfg.render_mode_base,
        cap: cfg.line_cap_base,
    };

    if age < cfg.rise_ms {
        let k = progress(age, cfg.rise_ms);
        return Some(EdgeVisual {
            phase: EdgePhase::Rise,
            alpha: edge.base_alpha * k,
            width: lerp(RISE_START_WIDTH, edge.base_width, k),
            ..base
        });
    }

    let event = match event_time {
        Some(t) if now >= t => t,
        _ => return Some(base),
    };

    // Peaks are assigned at finalization; an unfinalized edge holds its base
    let peak = edge.peak.unwrap_or(Peak {
        width: edge.base_width,
        alpha: edge.base_alpha,
    });
    let since = now - event;
    let hold_end = cfg.spark_rise_ms + cfg.spark_hold_ms;
    let fade_end = hold_end + cfg.fade_ms;

    let (phase, alpha, width) = if since < cfg.spark_rise_ms {
        let k = progress(since, cfg.spark_rise_ms);
        (
            EdgePhase::SparkRise,
            lerp(edge.base_alpha, peak.alpha, k),
            lerp(edge.base_width, peak.width, k),
        )
    } else if since < hold_end {
        (EdgePhase::SparkHold, peak.alpha, peak.width)
    } else if since < fade_end {
        let k = progress(since - hold_end, cfg.fade_ms);
        (
            EdgePhase::Fade,
            lerp(peak.alpha, 0.0, k),
            lerp(peak.width, 0.0, k),
        )
    } else {
        (EdgePhase::Gone, 0.0, 0.0)
    };

    let (color, mode) = if edge.is_winner {
        (edge.color_spark_win, cfg.render_mode_spark_win)
    } else {
        (edge.color_spark_lose, cfg.render_mode_spark_lose)
    };

    Some(EdgeVisual {
        phase,
        alpha,
        width,
        color,
        mode,
        cap: cfg.line_cap_spark,
    })
}
