//! Software implementation of [`Surface`].
//!
//! [`Raster`] keeps a premultiplied RGBA `f32` accumulation buffer. Paths are
//! flattened into polygons in device space and filled with an anti-aliased
//! scanline pass (vertical supersampling with exact horizontal span
//! coverage) using the nonzero winding rule. Strokes are turned into
//! polygons first and then filled the same way.
//!
//! Besides the drawing contract it offers the pieces a trail renderer needs:
//! [`Raster::fade`] darkens the whole buffer, [`Raster::plot_point`] adds a
//! soft particle sprite, and [`Raster::save_png`] exports a frame.

use std::f32::consts::TAU;
use std::path::Path;

use glam::{Affine2, Vec2, Vec4};
use image::{ImageBuffer, Rgba as ImageRgba};

use crate::color::Rgba;
use crate::error::ExportError;
use crate::surface::{CompositeOp, LineCap, LineJoin, Surface};

/// Sub-scanlines sampled per pixel row.
const SUBSAMPLES: usize = 4;

/// Maximum device-space length of one flattened arc step.
const ARC_STEP: f32 = 1.5;

#[derive(Clone, Copy, Debug)]
struct State {
    transform: Affine2,
    composite: CompositeOp,
    line_cap: LineCap,
    line_join: LineJoin,
    line_width: f32,
    stroke: Rgba,
    fill: Rgba,
}

impl Default for State {
    fn default() -> Self {
        Self {
            transform: Affine2::IDENTITY,
            composite: CompositeOp::SourceOver,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            line_width: 1.0,
            stroke: Rgba::default(),
            fill: Rgba::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Subpath {
    points: Vec<Vec2>,
    closed: bool,
}

/// CPU frame buffer that can be drawn on like a canvas.
#[derive(Clone, Debug)]
pub struct Raster {
    width: u32,
    height: u32,
    /// Premultiplied RGBA, row-major.
    pixels: Vec<Vec4>,
    state: State,
    stack: Vec<State>,
    path: Vec<Subpath>,
    /// Scratch coverage row reused by every fill.
    coverage: Vec<f32>,
}

impl Raster {
    /// A transparent black raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vec4::ZERO; width as usize * height as usize],
            state: State::default(),
            stack: Vec::new(),
            path: Vec::new(),
            coverage: vec![0.0; width as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resize, discarding the contents.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            *self = Self::new(width, height);
        }
    }

    /// Premultiplied pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Vec4> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[(y * self.width + x) as usize])
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        self.pixels.fill(Vec4::ZERO);
    }

    /// Multiply the whole buffer by `1 - amount`.
    ///
    /// Called once per frame this leaves fading trails behind moving
    /// content.
    pub fn fade(&mut self, amount: f32) {
        let keep = 1.0 - amount.clamp(0.0, 1.0);
        for p in &mut self.pixels {
            *p *= keep;
        }
    }

    /// Add a soft round sprite of `radius` device pixels at `center`.
    ///
    /// Intensity falls off smoothly from the center to the rim; blending is
    /// always additive, regardless of the current composite mode.
    pub fn plot_point(&mut self, center: Vec2, radius: f32, color: Rgba) {
        if radius <= 0.0 || color.a <= 0.0 {
            return;
        }
        let rgb = color.rgb.to_vec3();
        let x0 = (center.x - radius).floor().max(0.0) as i64;
        let y0 = (center.y - radius).floor().max(0.0) as i64;
        let x1 = ((center.x + radius).ceil() as i64).min(self.width as i64 - 1);
        let y1 = ((center.y + radius).ceil() as i64).min(self.height as i64 - 1);

        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - center;
                let r2 = d.length_squared() / (radius * radius);
                let falloff = smoothstep(1.0, 0.0, r2);
                if falloff <= 0.0 {
                    continue;
                }
                let a = color.a * falloff;
                let idx = (y as u32 * self.width + x as u32) as usize;
                let src = (rgb * a).extend(a);
                self.pixels[idx] = (self.pixels[idx] + src).min(Vec4::ONE);
            }
        }
    }

    /// 8-bit RGBA image of the buffer composited over opaque black.
    pub fn to_image(&self) -> Result<ImageBuffer<ImageRgba<u8>, Vec<u8>>, ExportError> {
        if self.width == 0 || self.height == 0 {
            return Err(ExportError::EmptyFrame {
                width: self.width,
                height: self.height,
            });
        }
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        let texels: Vec<[u8; 4]> = self
            .pixels
            .iter()
            .map(|p| [to_byte(p.x), to_byte(p.y), to_byte(p.z), 255])
            .collect();
        let raw: Vec<u8> = bytemuck::cast_slice(&texels).to_vec();
        ImageBuffer::from_raw(self.width, self.height, raw).ok_or(ExportError::EmptyFrame {
            width: self.width,
            height: self.height,
        })
    }

    /// Write the buffer as a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let image = self.to_image()?;
        image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    fn current(&mut self) -> &mut Subpath {
        if self.path.is_empty() {
            self.path.push(Subpath::default());
        }
        let last = self.path.len() - 1;
        &mut self.path[last]
    }

    fn device(&self, p: Vec2) -> Vec2 {
        self.state.transform.transform_point2(p)
    }

    /// Uniform scale of the current transform, used for line widths.
    fn scale(&self) -> f32 {
        self.state.transform.matrix2.determinant().abs().sqrt()
    }

    fn blend(&mut self, idx: usize, color: Rgba, coverage: f32) {
        let a = color.a * coverage;
        if a <= 0.0 {
            return;
        }
        let src = (color.rgb.to_vec3() * a).extend(a);
        let dst = self.pixels[idx];
        self.pixels[idx] = match self.state.composite {
            CompositeOp::SourceOver => src + dst * (1.0 - a),
            CompositeOp::Lighter => (dst + src).min(Vec4::ONE),
        };
    }

    /// Fill device-space polygons with the nonzero rule.
    fn fill_polygons(&mut self, polygons: &[Vec<Vec2>], color: Rgba) {
        if color.a <= 0.0 || self.width == 0 || self.height == 0 {
            return;
        }

        let mut edges = Vec::new();
        let (mut ymin, mut ymax) = (f32::INFINITY, f32::NEG_INFINITY);
        for poly in polygons.iter().filter(|p| p.len() >= 3) {
            for (i, &a) in poly.iter().enumerate() {
                let b = poly[(i + 1) % poly.len()];
                if a.y == b.y || !a.is_finite() || !b.is_finite() {
                    continue;
                }
                ymin = ymin.min(a.y.min(b.y));
                ymax = ymax.max(a.y.max(b.y));
                edges.push(if a.y < b.y { (a, b, 1) } else { (b, a, -1) });
            }
        }
        if edges.is_empty() {
            return;
        }

        let row_start = ymin.floor().max(0.0) as u32;
        let row_end = (ymax.ceil().max(0.0) as u32).min(self.height);
        let weight = 1.0 / SUBSAMPLES as f32;
        let mut coverage = std::mem::take(&mut self.coverage);
        coverage.resize(self.width as usize, 0.0);
        let mut crossings: Vec<(f32, i32)> = Vec::new();

        for py in row_start..row_end {
            coverage.fill(0.0);
            let mut touched = false;
            for s in 0..SUBSAMPLES {
                let sy = py as f32 + (s as f32 + 0.5) * weight;
                crossings.clear();
                for &(top, bottom, dir) in &edges {
                    if sy >= top.y && sy < bottom.y {
                        let x = top.x + (sy - top.y) * (bottom.x - top.x) / (bottom.y - top.y);
                        crossings.push((x, dir));
                    }
                }
                crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut winding = 0;
                for pair in crossings.windows(2) {
                    winding += pair[0].1;
                    if winding != 0 {
                        add_span(&mut coverage, pair[0].0, pair[1].0, weight);
                        touched = true;
                    }
                }
            }
            if !touched {
                continue;
            }
            for (px, &c) in coverage.iter().enumerate() {
                if c > 0.0 {
                    let idx = (py * self.width) as usize + px;
                    self.blend(idx, color, c.min(1.0));
                }
            }
        }
        self.coverage = coverage;
    }

    /// Outline polygons for stroking every subpath of the current path.
    fn stroke_polygons(&self) -> Vec<Vec<Vec2>> {
        let half = self.state.line_width * self.scale() * 0.5;
        let mut polys = Vec::new();
        if half <= 0.0 {
            return polys;
        }

        for sub in &self.path {
            let mut pts = sub.points.clone();
            pts.dedup();
            if sub.closed && pts.len() > 2 {
                pts.push(pts[0]);
            }
            if pts.len() < 2 {
                continue;
            }
            let last = pts.len() - 2;
            for (i, seg) in pts.windows(2).enumerate() {
                let (mut a, mut b) = (seg[0], seg[1]);
                let dir = (b - a).normalize_or_zero();
                if !sub.closed && self.state.line_cap == LineCap::Square {
                    if i == 0 {
                        a -= dir * half;
                    }
                    if i == last {
                        b += dir * half;
                    }
                }
                let n = dir.perp() * half;
                polys.push(oriented(vec![a + n, b + n, b - n, a - n]));
            }

            let round_cap = !sub.closed && self.state.line_cap == LineCap::Round;
            let round_join = self.state.line_join == LineJoin::Round;
            for (i, &p) in pts.iter().enumerate() {
                let endpoint = i == 0 || i == pts.len() - 1;
                if (endpoint && round_cap) || (!endpoint && round_join) {
                    polys.push(circle(p, half));
                }
            }
        }
        polys
    }
}

/// Hermite interpolation between `edge0` and `edge1`.
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Add `weight` times the covered fraction of each pixel in `[xa, xb)`.
fn add_span(row: &mut [f32], xa: f32, xb: f32, weight: f32) {
    let width = row.len() as f32;
    let (xa, xb) = (xa.clamp(0.0, width), xb.clamp(0.0, width));
    if xb <= xa {
        return;
    }
    let ia = xa.floor() as usize;
    let ib = xb.floor() as usize;
    if ia == ib {
        row[ia] += (xb - xa) * weight;
        return;
    }
    row[ia] += (ia as f32 + 1.0 - xa) * weight;
    for c in &mut row[ia + 1..ib] {
        *c += weight;
    }
    if ib < row.len() {
        row[ib] += (xb - ib as f32) * weight;
    }
}

/// Counter-clockwise copy of `poly` so overlapping pieces never cancel.
fn oriented(mut poly: Vec<Vec2>) -> Vec<Vec2> {
    let area: f32 = poly
        .iter()
        .zip(poly.iter().cycle().skip(1))
        .map(|(a, b)| a.perp_dot(*b))
        .sum();
    if area < 0.0 {
        poly.reverse();
    }
    poly
}

fn circle(center: Vec2, radius: f32) -> Vec<Vec2> {
    let steps = ((TAU * radius / ARC_STEP).ceil() as usize).clamp(8, 256);
    (0..steps)
        .map(|i| center + Vec2::from_angle(TAU * i as f32 / steps as f32) * radius)
        .collect()
}

/// Signed sweep of a canvas-style arc.
fn arc_sweep(start: f32, end: f32, counter_clockwise: bool) -> f32 {
    let raw = end - start;
    if counter_clockwise {
        if raw <= -TAU {
            -TAU
        } else {
            let mut s = raw;
            while s > 0.0 {
                s -= TAU;
            }
            s
        }
    } else if raw >= TAU {
        TAU
    } else {
        let mut s = raw;
        while s < 0.0 {
            s += TAU;
        }
        s
    }
}

impl Surface for Raster {
    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn translate(&mut self, offset: Vec2) {
        self.state.transform = self.state.transform * Affine2::from_translation(offset);
    }

    fn rotate(&mut self, radians: f32) {
        self.state.transform = self.state.transform * Affine2::from_angle(radians);
    }

    fn set_composite(&mut self, op: CompositeOp) {
        self.state.composite = op;
    }

    fn set_line_cap(&mut self, cap: LineCap) {
        self.state.line_cap = cap;
    }

    fn set_line_join(&mut self, join: LineJoin) {
        self.state.line_join = join;
    }

    fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.state.line_width = width;
        }
    }

    fn set_stroke_style(&mut self, style: Rgba) {
        self.state.stroke = style;
    }

    fn set_fill_style(&mut self, style: Rgba) {
        self.state.fill = style;
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, p: Vec2) {
        let p = self.device(p);
        self.path.push(Subpath {
            points: vec![p],
            closed: false,
        });
    }

    fn line_to(&mut self, p: Vec2) {
        let p = self.device(p);
        self.current().points.push(p);
    }

    fn arc(&mut self, center: Vec2, radius: f32, start: f32, end: f32, counter_clockwise: bool) {
        if radius <= 0.0 {
            return;
        }
        let sweep = arc_sweep(start, end, counter_clockwise);
        let device_len = sweep.abs() * radius * self.scale();
        let steps = ((device_len / ARC_STEP).ceil() as usize).clamp(1, 512);

        let points: Vec<Vec2> = (0..=steps)
            .map(|i| {
                let angle = start + sweep * i as f32 / steps as f32;
                self.device(center + Vec2::from_angle(angle) * radius)
            })
            .collect();
        self.current().points.extend(points);
    }

    fn close_path(&mut self) {
        let sub = self.current();
        if sub.points.is_empty() {
            return;
        }
        sub.closed = true;
        // Following commands start a fresh subpath
        self.path.push(Subpath::default());
    }

    fn stroke(&mut self) {
        let polys = self.stroke_polygons();
        let color = self.state.stroke;
        self.fill_polygons(&polys, color);
    }

    fn fill(&mut self) {
        let polys: Vec<Vec<Vec2>> = self.path.iter().map(|s| s.points.clone()).collect();
        let color = self.state.fill;
        self.fill_polygons(&polys, color);
    }
}
