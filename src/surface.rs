//! The drawing-context contract the renderer draws through.
//!
//! [`Surface`] mirrors the small subset of a 2D canvas API the lightning
//! renderer needs: path building, stroke/fill with a color, a transform
//! stack, and blend/cap/join selectors. The crate ships two implementations:
//! the software [`Raster`](crate::raster::Raster) and the [`Recorder`], which
//! logs every call for inspection.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::color::Rgba;

/// How drawn pixels combine with what is already on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeOp {
    /// Standard alpha blending (default).
    #[default]
    SourceOver,
    /// Additive blending: overlapping strokes brighten each other.
    Lighter,
}

/// Shape at the open ends of stroked lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    /// Flat end exactly at the endpoint.
    #[default]
    Butt,
    /// Semicircle centered on the endpoint.
    Round,
    /// Flat end extended by half the line width.
    Square,
}

/// Shape where two stroked segments meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Minimal 2D drawing context.
///
/// Paths are built in the current transform's coordinate space. `fill` uses
/// the nonzero winding rule.
pub trait Surface {
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, offset: Vec2);
    fn rotate(&mut self, radians: f32);

    fn set_composite(&mut self, op: CompositeOp);
    fn set_line_cap(&mut self, cap: LineCap);
    fn set_line_join(&mut self, join: LineJoin);
    fn set_line_width(&mut self, width: f32);
    fn set_stroke_style(&mut self, style: Rgba);
    fn set_fill_style(&mut self, style: Rgba);

    fn begin_path(&mut self);
    fn move_to(&mut self, p: Vec2);
    fn line_to(&mut self, p: Vec2);
    /// Circular arc around `center` from `start` to `end` angle.
    fn arc(&mut self, center: Vec2, radius: f32, start: f32, end: f32, counter_clockwise: bool);
    fn close_path(&mut self);

    fn stroke(&mut self);
    fn fill(&mut self);

    /// Add an axis-aligned rectangle as a closed subpath.
    fn rect(&mut self, origin: Vec2, size: Vec2) {
        self.move_to(origin);
        self.line_to(origin + Vec2::new(size.x, 0.0));
        self.line_to(origin + size);
        self.line_to(origin + Vec2::new(0.0, size.y));
        self.close_path();
    }

    /// Fill an axis-aligned rectangle without disturbing the current path
    /// semantics beyond replacing it.
    fn fill_rect(&mut self, origin: Vec2, size: Vec2) {
        self.begin_path();
        self.rect(origin, size);
        self.fill();
    }
}

/// One recorded [`Surface`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Save,
    Restore,
    Translate(Vec2),
    Rotate(f32),
    Composite(CompositeOp),
    LineCap(LineCap),
    LineJoin(LineJoin),
    LineWidth(f32),
    StrokeStyle(Rgba),
    FillStyle(Rgba),
    BeginPath,
    MoveTo(Vec2),
    LineTo(Vec2),
    Arc {
        center: Vec2,
        radius: f32,
        start: f32,
        end: f32,
        counter_clockwise: bool,
    },
    ClosePath,
    Stroke,
    Fill,
}

/// A surface that records commands instead of drawing.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub commands: Vec<DrawCommand>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Number of `fill()` calls recorded.
    pub fn fill_count(&self) -> usize {
        self.count(|c| matches!(c, DrawCommand::Fill))
    }

    /// Number of `stroke()` calls recorded.
    pub fn stroke_count(&self) -> usize {
        self.count(|c| matches!(c, DrawCommand::Stroke))
    }

    pub fn count(&self, pred: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    /// Fill styles in the order they were set.
    pub fn fill_styles(&self) -> Vec<Rgba> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillStyle(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    /// Translations in the order they were applied.
    pub fn translations(&self) -> Vec<Vec2> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Translate(t) => Some(*t),
                _ => None,
            })
            .collect()
    }
}

impl Surface for Recorder {
    fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }
    fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }
    fn translate(&mut self, offset: Vec2) {
        self.commands.push(DrawCommand::Translate(offset));
    }
    fn rotate(&mut self, radians: f32) {
        self.commands.push(DrawCommand::Rotate(radians));
    }
    fn set_composite(&mut self, op: CompositeOp) {
        self.commands.push(DrawCommand::Composite(op));
    }
    fn set_line_cap(&mut self, cap: LineCap) {
        self.commands.push(DrawCommand::LineCap(cap));
    }
    fn set_line_join(&mut self, join: LineJoin) {
        self.commands.push(DrawCommand::LineJoin(join));
    }
    fn set_line_width(&mut self, width: f32) {
        self.commands.push(DrawCommand::LineWidth(width));
    }
    fn set_stroke_style(&mut self, style: Rgba) {
        self.commands.push(DrawCommand::StrokeStyle(style));
    }
    fn set_fill_style(&mut self, style: Rgba) {
        self.commands.push(DrawCommand::FillStyle(style));
    }
    fn begin_path(&mut self) {
        self.commands.push(DrawCommand::BeginPath);
    }
    fn move_to(&mut self, p: Vec2) {
        self.commands.push(DrawCommand::MoveTo(p));
    }
    fn line_to(&mut self, p: Vec2) {
        self.commands.push(DrawCommand::LineTo(p));
    }
    fn arc(&mut self, center: Vec2, radius: f32, start: f32, end: f32, counter_clockwise: bool) {
        self.commands.push(DrawCommand::Arc {
            center,
            radius,
            start,
            end,
            counter_clockwise,
        });
    }
    fn close_path(&mut self) {
        self.commands.push(DrawCommand::ClosePath);
    }
    fn stroke(&mut self) {
        self.commands.push(DrawCommand::Stroke);
    }
    fn fill(&mut self) {
        self.commands.push(DrawCommand::Fill);
    }
}
