//! Drawing a bolt from live particle positions.
//!
//! Growth works on a frozen snapshot, but drawing always re-reads the
//! *current* particle positions, so a bolt sways with the field it grew on.
//! Each frame:
//!
//! 1. Every edge is resolved through [`phase::evaluate`].
//! 2. Losers are drawn first and winners last so the winning path sits on
//!    top, all with additive blending.
//! 3. Segments take the shortest route across the wrap seam and are drawn a
//!    second time on the far side when they straddle it.
//! 4. Interior joints of each branch get a small "corner diamond" that closes
//!    the wedge-shaped gap between two adjoining rectangles.

use std::collections::HashSet;
use std::f32::consts::FRAC_PI_2;

use glam::Vec2;

use crate::bolt::Bolt;
use crate::color::Rgba;
use crate::config::{LightningConfig, RenderMode};
use crate::edges::EdgeKey;
use crate::phase::{self, EdgeVisual, ALPHA_EPSILON};
use crate::surface::{CompositeOp, LineCap, LineJoin, Surface};
use crate::torus::Torus;

/// Summary of one render pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// At least one edge was actually drawn.
    pub alive: bool,
    /// Nothing was drawn because there were no particles or the world had
    /// no area. Says nothing about the bolt's own progress.
    pub skipped: bool,
    /// Edges drawn (seam copies not counted).
    pub edges_drawn: usize,
    /// Corner diamonds drawn (seam copies not counted).
    pub corners_drawn: usize,
    /// Edges or corners skipped because a particle index was out of range.
    pub missing: usize,
}

/// Draw a straight segment in the given mode. Endpoints are used as given.
pub fn draw_segment(
    surface: &mut dyn Surface,
    a: Vec2,
    b: Vec2,
    width: f32,
    style: Rgba,
    mode: RenderMode,
    cap: LineCap,
) {
    match mode {
        RenderMode::Stroke => {
            surface.set_line_cap(cap);
            surface.set_line_width(width);
            surface.set_stroke_style(style);
            surface.begin_path();
            surface.move_to(a);
            surface.line_to(b);
            surface.stroke();
        }
        RenderMode::Rect | RenderMode::Capsule => {
            let d = b - a;
            let len = d.length().max(0.0001);
            let angle = d.y.atan2(d.x);
            let r = width * 0.5;

            surface.save();
            surface.translate((a + b) * 0.5);
            surface.rotate(angle);
            surface.set_fill_style(style);
            surface.fill_rect(Vec2::new(-len * 0.5, -r), Vec2::new(len, width));
            if mode == RenderMode::Capsule {
                surface.begin_path();
                surface.arc(Vec2::new(-len * 0.5, 0.0), r, FRAC_PI_2, -FRAC_PI_2, false);
                surface.close_path();
                surface.arc(Vec2::new(len * 0.5, 0.0), r, -FRAC_PI_2, FRAC_PI_2, false);
                surface.close_path();
                surface.fill();
            }
            surface.restore();
        }
    }
}

/// Fill a closed polygon.
fn fill_polygon(surface: &mut dyn Surface, points: &[Vec2], style: Rgba) {
    let Some((first, rest)) = points.split_first() else {
        return;
    };
    surface.set_fill_style(style);
    surface.begin_path();
    surface.move_to(*first);
    for p in rest {
        surface.line_to(*p);
    }
    surface.close_path();
    surface.fill();
}

/// Quad closing the outer gap where two rectangles of `width` meet at
/// `joint`. `prev` and `next` must already be unwrapped around `joint`.
///
/// Returns `None` for straight or degenerate joints.
pub fn corner_quad(
    prev: Vec2,
    joint: Vec2,
    next: Vec2,
    width: f32,
    miter_limit: f32,
) -> Option<[Vec2; 4]> {
    let d1 = (joint - prev).normalize_or_zero();
    let d2 = (next - joint).normalize_or_zero();
    if d1 == Vec2::ZERO || d2 == Vec2::ZERO {
        return None;
    }
    let cross = d1.perp_dot(d2);
    if cross.abs() < 1e-4 {
        return None;
    }

    // The gap opens on the side away from the turn
    let outward = -cross.signum();
    let half = width * 0.5;
    let n1 = d1.perp() * outward;
    let n2 = d2.perp() * outward;
    let p1 = joint + n1 * half;
    let p2 = joint + n2 * half;

    let bisector = (n1 + n2).normalize_or_zero();
    let cos_half = bisector.dot(n1);
    let tip = if cos_half > 1e-4 && half / cos_half <= miter_limit * half {
        joint + bisector * (half / cos_half)
    } else {
        (p1 + p2) * 0.5
    };
    Some([joint, p1, tip, p2])
}

/// Per-frame drawing state shared by the edge and corner passes.
struct Frame<'a> {
    surface: &'a mut dyn Surface,
    particles: &'a [Vec2],
    torus: Torus,
    stats: RenderStats,
}

impl Frame<'_> {
    /// Draw `points` once, then again across each seam it straddles.
    fn with_seam_copies(&mut self, points: &[Vec2], margin: f32, draw: impl Fn(&mut dyn Surface, Vec2)) {
        draw(&mut *self.surface, Vec2::ZERO);
        let (min, max) = points.iter().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(lo, hi), p| (lo.min(*p), hi.max(*p)),
        );
        for offset in self
            .torus
            .seam_offsets(min - Vec2::splat(margin), max + Vec2::splat(margin))
        {
            draw(&mut *self.surface, offset);
        }
    }

    fn draw_edge(&mut self, key: EdgeKey, visual: &EdgeVisual) {
        let (Some(&a), Some(&b)) = (self.particles.get(key.from), self.particles.get(key.to)) else {
            self.stats.missing += 1;
            return;
        };
        let b = self.torus.wrap(b);
        let a = self.torus.unwrap_toward(a, b);
        let style = visual.color.with_alpha(visual.alpha);
        let (width, mode, cap) = (visual.width, visual.mode, visual.cap);

        self.with_seam_copies(&[a, b], width * 0.5, |s, off| {
            draw_segment(s, a + off, b + off, width, style, mode, cap);
        });
        self.stats.edges_drawn += 1;
    }

    fn draw_corner(&mut self, nodes: [usize; 3], visual: &EdgeVisual, miter_limit: f32) {
        let particles = self.particles;
        let [Some(&p), Some(&j), Some(&n)] = nodes.map(|i| particles.get(i)) else {
            self.stats.missing += 1;
            return;
        };
        let joint = self.torus.wrap(j);
        let prev = self.torus.unwrap_toward(p, joint);
        let next = joint + self.torus.delta(joint, n);
        let Some(quad) = corner_quad(prev, joint, next, visual.width, miter_limit) else {
            return;
        };
        let style = visual.color.with_alpha(visual.alpha);

        self.with_seam_copies(&quad, 0.0, |s, off| {
            fill_polygon(s, &quad.map(|q| q + off), style);
        });
        self.stats.corners_drawn += 1;
    }
}

/// A joint between two consecutive edges of one branch.
struct Corner {
    nodes: [usize; 3],
    visual: EdgeVisual,
    winner: bool,
}

/// Resolve every interior joint of every branch, once per edge pair.
fn collect_corners(bolt: &Bolt, cfg: &LightningConfig, now: f64) -> Vec<Corner> {
    let mut seen = HashSet::new();
    let mut corners = Vec::new();

    for branch in &bolt.branches {
        for i in 1..branch.nodes.len().saturating_sub(1) {
            let (k_in, k_out) = (branch.edges[i - 1], branch.edges[i]);
            if !seen.insert((k_in, k_out)) {
                continue;
            }
            let (Some(e_in), Some(e_out)) = (bolt.edges.get(k_in), bolt.edges.get(k_out)) else {
                continue;
            };
            let (Some(v_in), Some(v_out)) = (
                phase::evaluate(e_in, bolt.event_time, cfg, now),
                phase::evaluate(e_out, bolt.event_time, cfg, now),
            ) else {
                continue;
            };

            let brighter = if v_in.alpha >= v_out.alpha { v_in } else { v_out };
            let visual = EdgeVisual {
                alpha: v_in.alpha.max(v_out.alpha),
                width: v_in.width.min(v_out.width),
                ..brighter
            };
            if visual.alpha <= ALPHA_EPSILON || visual.width <= 0.0 {
                continue;
            }
            corners.push(Corner {
                nodes: [branch.nodes[i - 1], branch.nodes[i], branch.nodes[i + 1]],
                visual,
                winner: e_in.is_winner && e_out.is_winner,
            });
        }
    }
    corners
}

/// Draw `bolt` at time `now` from the live `particles`.
///
/// The surface state is saved and restored around the pass. The bolt is only
/// read; whether it has ended is decided from its timing, see
/// [`Bolt::faded_out`].
pub fn draw_bolt(
    surface: &mut dyn Surface,
    bolt: &Bolt,
    particles: &[Vec2],
    torus: Torus,
    cfg: &LightningConfig,
    now: f64,
) -> RenderStats {
    if particles.is_empty() || !torus.is_valid() {
        return RenderStats {
            skipped: true,
            ..RenderStats::default()
        };
    }

    let mut losers = Vec::new();
    let mut winners = Vec::new();
    for edge in bolt.edges.iter() {
        let Some(visual) = phase::evaluate(edge, bolt.event_time, cfg, now) else {
            continue;
        };
        if !visual.is_visible() {
            continue;
        }
        if edge.is_winner {
            winners.push((edge.key, visual));
        } else {
            losers.push((edge.key, visual));
        }
    }
    let corners = if cfg.corner_enabled {
        collect_corners(bolt, cfg, now)
    } else {
        Vec::new()
    };

    surface.save();
    surface.set_composite(CompositeOp::Lighter);
    surface.set_line_join(LineJoin::Miter);

    let mut frame = Frame {
        surface: &mut *surface,
        particles,
        torus,
        stats: RenderStats::default(),
    };
    for winner_pass in [false, true] {
        let edges = if winner_pass { &winners } else { &losers };
        for (key, visual) in edges {
            frame.draw_edge(*key, visual);
        }
        for corner in corners.iter().filter(|c| c.winner == winner_pass) {
            frame.draw_corner(corner.nodes, &corner.visual, cfg.corner_miter_limit);
        }
    }
    let mut stats = frame.stats;
    surface.restore();

    stats.alive = stats.edges_drawn > 0;
    stats
}
