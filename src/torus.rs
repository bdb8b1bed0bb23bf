//! Wrap-around geometry for the particle plane.
//!
//! The world is a torus of size `W × H`: leaving one edge re-enters on the
//! opposite edge. Every distance the lightning engine measures, and every
//! segment it draws, goes through these helpers so the shorter path across
//! the seam is always preferred.

use glam::Vec2;

/// Wrap a single-axis delta onto `[-size/2, size/2]`.
///
/// A non-positive `size` disables wrapping and returns `delta` unchanged.
#[inline]
pub fn wrap_delta(delta: f32, size: f32) -> f32 {
    if size <= 0.0 {
        return delta;
    }
    let half = size * 0.5;
    let mut d = delta;
    if d > half || d < -half {
        // Bring far-off deltas into one period before the final fold
        d = d.rem_euclid(size);
    }
    if d > half {
        d -= size;
    }
    if d < -half {
        d += size;
    }
    d
}

/// Wrap a position into `[0, size)` on one axis.
#[inline]
pub fn wrap_coord(v: f32, size: f32) -> f32 {
    if size <= 0.0 {
        return v;
    }
    let w = v.rem_euclid(size);
    // rem_euclid can round up to exactly `size` for tiny negatives
    if w >= size {
        0.0
    } else {
        w
    }
}

/// The world dimensions of the torus.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Torus {
    pub size: Vec2,
}

impl Torus {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            size: Vec2::new(width, height),
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    /// True when both dimensions are positive.
    pub fn is_valid(&self) -> bool {
        self.size.x > 0.0 && self.size.y > 0.0
    }

    /// Shortest displacement from `from` to `to`.
    #[inline]
    pub fn delta(&self, from: Vec2, to: Vec2) -> Vec2 {
        Vec2::new(
            wrap_delta(to.x - from.x, self.size.x),
            wrap_delta(to.y - from.y, self.size.y),
        )
    }

    /// Squared toroidal distance.
    #[inline]
    pub fn distance_squared(&self, a: Vec2, b: Vec2) -> f32 {
        self.delta(a, b).length_squared()
    }

    /// Wrap a point into `[0,W) × [0,H)`.
    #[inline]
    pub fn wrap(&self, p: Vec2) -> Vec2 {
        Vec2::new(wrap_coord(p.x, self.size.x), wrap_coord(p.y, self.size.y))
    }

    /// Move `start` by whole multiples of the world size so the straight line
    /// to `end` is the shortest path across the seam.
    #[inline]
    pub fn unwrap_toward(&self, start: Vec2, end: Vec2) -> Vec2 {
        end - self.delta(start, end)
    }

    /// Offsets at which a shape with the given bounding box must be drawn
    /// again so it shows up on both sides of the seam.
    ///
    /// The zero offset is not included; a box fully inside the world yields
    /// an empty list.
    pub fn seam_offsets(&self, min: Vec2, max: Vec2) -> Vec<Vec2> {
        let (w, h) = (self.size.x, self.size.y);
        let sx = if min.x < 0.0 {
            w
        } else if max.x > w {
            -w
        } else {
            0.0
        };
        let sy = if min.y < 0.0 {
            h
        } else if max.y > h {
            -h
        } else {
            0.0
        };

        let mut offsets = Vec::with_capacity(3);
        if sx != 0.0 {
            offsets.push(Vec2::new(sx, 0.0));
        }
        if sy != 0.0 {
            offsets.push(Vec2::new(0.0, sy));
        }
        if sx != 0.0 && sy != 0.0 {
            offsets.push(Vec2::new(sx, sy));
        }
        offsets
    }
}
