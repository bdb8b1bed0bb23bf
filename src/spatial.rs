//! Uniform-grid nearest-neighbor index over a particle snapshot.
//!
//! Each bolt freezes the particle positions it sees at spawn time into a
//! [`SpatialIndex`]. Growth picks every hop from this snapshot; live positions
//! are only consulted when drawing. The index is immutable after construction
//! and never follows particle motion.
//!
//! # Query strategy
//!
//! [`SpatialIndex::k_nearest`] visits grid cells in square rings around the
//! query cell and stops once at least `count` candidates are in hand. The last
//! ring can overshoot the truly nearest set slightly; callers treat the result
//! as approximate.
//!
//! ```ignore
//! let index = SpatialIndex::build(&positions, torus, SpatialConfig::for_step(140.0));
//! for n in index.k_nearest(tip, 128, 140.0) {
//!     println!("{} at {}", n.index, n.dist_sq.sqrt());
//! }
//! ```

use glam::Vec2;

use crate::torus::Torus;

/// Smallest cell edge the grid will use, in world units.
pub const MIN_CELL_SIZE: f32 = 32.0;

/// Configuration for the spatial grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialConfig {
    /// Size of each cell in world units
    pub cell_size: f32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            cell_size: MIN_CELL_SIZE,
        }
    }
}

impl SpatialConfig {
    /// Cell size tuned for a maximum hop distance: `max(32, step)`.
    pub fn for_step(max_step_dist: f32) -> Self {
        Self {
            cell_size: max_step_dist.max(MIN_CELL_SIZE),
        }
    }
}

/// One query result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// Index into the snapshot (and the external particle array).
    pub index: usize,
    /// Squared toroidal distance from the query point.
    pub dist_sq: f32,
}

/// Frozen grid of particle indices.
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    positions: Vec<Vec2>,
    torus: Torus,
    cell_size: f32,
    cols: i32,
    rows: i32,
    /// Bucket start offsets into `entries`, one per cell plus a sentinel.
    cell_start: Vec<u32>,
    entries: Vec<u32>,
}

impl SpatialIndex {
    /// Bucket a copy of `positions` into a grid covering the torus.
    ///
    /// Positions outside the world are wrapped before bucketing.
    pub fn build(positions: &[Vec2], torus: Torus, config: SpatialConfig) -> Self {
        let cell_size = config.cell_size.max(1.0);
        let cols = ((torus.width() / cell_size).ceil() as i32).max(1);
        let rows = ((torus.height() / cell_size).ceil() as i32).max(1);
        let cell_count = (cols * rows) as usize;

        let cells: Vec<u32> = positions
            .iter()
            .map(|&p| {
                let w = torus.wrap(p);
                let (cx, cy) = Self::cell_coords(w, cell_size, cols, rows);
                (cy * cols + cx) as u32
            })
            .collect();

        // Counting sort into contiguous buckets
        let mut cell_start = vec![0u32; cell_count + 1];
        for &c in &cells {
            cell_start[c as usize + 1] += 1;
        }
        for i in 0..cell_count {
            cell_start[i + 1] += cell_start[i];
        }
        let mut cursor = cell_start.clone();
        let mut entries = vec![0u32; positions.len()];
        for (i, &c) in cells.iter().enumerate() {
            let slot = &mut cursor[c as usize];
            entries[*slot as usize] = i as u32;
            *slot += 1;
        }

        Self {
            positions: positions.to_vec(),
            torus,
            cell_size,
            cols,
            rows,
            cell_start,
            entries,
        }
    }

    fn cell_coords(p: Vec2, cell_size: f32, cols: i32, rows: i32) -> (i32, i32) {
        let cx = ((p.x / cell_size).floor() as i32).clamp(0, cols - 1);
        let cy = ((p.y / cell_size).floor() as i32).clamp(0, rows - 1);
        (cx, cy)
    }

    /// Number of particles in the snapshot.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Snapshot position of a particle.
    pub fn position(&self, index: usize) -> Option<Vec2> {
        self.positions.get(index).copied()
    }

    pub fn torus(&self) -> Torus {
        self.torus
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Grid dimensions as `(cols, rows)`.
    pub fn grid_size(&self) -> (usize, usize) {
        (self.cols as usize, self.rows as usize)
    }

    /// Up to `count` particles within `max_dist` of `(x, y)`, nearest first.
    ///
    /// `count == 0` returns every candidate gathered by the ring walk.
    pub fn k_nearest(&self, query: Vec2, count: usize, max_dist: f32) -> Vec<Neighbor> {
        let mut candidates = Vec::new();
        if self.positions.is_empty() || max_dist < 0.0 {
            return candidates;
        }

        let max_dist_sq = max_dist * max_dist;
        let q = self.torus.wrap(query);
        let (gx, gy) = Self::cell_coords(q, self.cell_size, self.cols, self.rows);
        let max_ring = (max_dist / self.cell_size).ceil() as i32 + 1;
        // Past this ring every cell has already been visited
        let full_ring = self.cols.max(self.rows) / 2 + 1;
        let last_ring = max_ring.min(full_ring);

        let mut visited = vec![false; (self.cols * self.rows) as usize];
        let mut push_cell = |cx: i32, cy: i32, out: &mut Vec<Neighbor>| {
            let cx = cx.rem_euclid(self.cols);
            let cy = cy.rem_euclid(self.rows);
            let cell = (cy * self.cols + cx) as usize;
            if std::mem::replace(&mut visited[cell], true) {
                return;
            }
            let start = self.cell_start[cell] as usize;
            let end = self.cell_start[cell + 1] as usize;
            for &idx in &self.entries[start..end] {
                let idx = idx as usize;
                let dist_sq = self.torus.distance_squared(q, self.positions[idx]);
                if dist_sq <= max_dist_sq {
                    out.push(Neighbor { index: idx, dist_sq });
                }
            }
        };

        for ring in 0..=last_ring {
            for ox in -ring..=ring {
                push_cell(gx + ox, gy - ring, &mut candidates);
                push_cell(gx + ox, gy + ring, &mut candidates);
            }
            for oy in (-ring + 1)..ring {
                push_cell(gx - ring, gy + oy, &mut candidates);
                push_cell(gx + ring, gy + oy, &mut candidates);
            }
            if count > 0 && candidates.len() >= count {
                break;
            }
        }

        candidates.sort_by(|a, b| {
            a.dist_sq
                .total_cmp(&b.dist_sq)
                .then_with(|| a.index.cmp(&b.index))
        });
        if count > 0 {
            candidates.truncate(count);
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torus() -> Torus {
        Torus::new(800.0, 600.0)
    }

    #[test]
    fn test_config_for_step_has_floor() {
        assert_eq!(SpatialConfig::for_step(8.0).cell_size, MIN_CELL_SIZE);
        assert_eq!(SpatialConfig::for_step(140.0).cell_size, 140.0);
    }

    #[test]
    fn test_grid_covers_world() {
        let index = SpatialIndex::build(&[], torus(), SpatialConfig::for_step(140.0));
        assert_eq!(index.grid_size(), (6, 5));
        assert!(index.is_empty());
        assert!(index.k_nearest(Vec2::ZERO, 4, 100.0).is_empty());
    }

    #[test]
    fn test_k_nearest_sorted_and_bounded() {
        let positions = vec![
            Vec2::new(100.0, 100.0),
            Vec2::new(130.0, 100.0),
            Vec2::new(110.0, 100.0),
            Vec2::new(400.0, 400.0),
        ];
        let index = SpatialIndex::build(&positions, torus(), SpatialConfig::for_step(64.0));
        let found = index.k_nearest(Vec2::new(100.0, 100.0), 0, 50.0);
        let order: Vec<usize> = found.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![0, 2, 1]);
        assert!(found.windows(2).all(|w| w[0].dist_sq <= w[1].dist_sq));
    }

    #[test]
    fn test_k_nearest_respects_count() {
        let positions: Vec<Vec2> = (0..20).map(|i| Vec2::new(200.0 + i as f32, 200.0)).collect();
        let index = SpatialIndex::build(&positions, torus(), SpatialConfig::default());
        let found = index.k_nearest(Vec2::new(200.0, 200.0), 5, 100.0);
        assert_eq!(found.len(), 5);
        assert_eq!(found[0].index, 0);
    }

    #[test]
    fn test_k_nearest_wraps_across_seam() {
        let positions = vec![Vec2::new(795.0, 300.0), Vec2::new(700.0, 300.0)];
        let index = SpatialIndex::build(&positions, torus(), SpatialConfig::for_step(140.0));
        let found = index.k_nearest(Vec2::new(5.0, 300.0), 0, 50.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 0);
        assert!((found[0].dist_sq - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_small_world_visits_each_cell_once() {
        let small = Torus::new(64.0, 64.0);
        let positions = vec![Vec2::new(10.0, 10.0), Vec2::new(50.0, 50.0)];
        let index = SpatialIndex::build(&positions, small, SpatialConfig::for_step(140.0));
        let found = index.k_nearest(Vec2::new(10.0, 10.0), 0, 140.0);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut positions = vec![Vec2::new(10.0, 10.0)];
        let index = SpatialIndex::build(&positions, torus(), SpatialConfig::default());
        positions[0] = Vec2::new(500.0, 500.0);
        assert_eq!(index.position(0), Some(Vec2::new(10.0, 10.0)));
    }
}
