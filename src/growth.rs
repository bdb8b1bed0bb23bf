//! Incremental growth of a bolt across the particle field.
//!
//! A bolt starts on a random particle in the left spawn column and advances
//! one step at a time. Each step, every live branch hops greedily to its
//! nearest unclaimed particle that lies strictly to the right (toroidally) of
//! its tip, and may fork a sibling from the same point. The first branch to
//! land in the right goal column wins; the bolt then finalizes and every edge
//! switches to its spark phase.
//!
//! All hop targets come from the bolt's frozen [`SpatialIndex`]. Particles
//! keep moving while the bolt grows, so late hops are chosen from positions
//! that may be noticeably stale. That is deliberate: the snapshot is built
//! once per bolt and never refreshed.

use glam::Vec2;
use rand::Rng;

use crate::bolt::{Bolt, BranchId};
use crate::config::LightningConfig;
use crate::spatial::{SpatialConfig, SpatialIndex};
use crate::torus::{wrap_delta, Torus};

/// What a single growth step achieved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// At least one branch hopped; no winner yet.
    Grew,
    /// A branch reached the goal column and the bolt finalized.
    Won(BranchId),
    /// No branch could move; the bolt finalized without a winner.
    Exhausted,
    /// The bolt had already finalized; nothing happened.
    Finished,
}

/// Pick a random start particle inside the spawn column.
pub fn find_start(
    positions: &[Vec2],
    torus: Torus,
    cfg: &LightningConfig,
    rng: &mut impl Rng,
) -> Option<usize> {
    let starters: Vec<usize> = positions
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            let x = torus.wrap(**p).x;
            x <= cfg.left_col_width
        })
        .map(|(i, _)| i)
        .collect();
    if starters.is_empty() {
        return None;
    }
    Some(starters[rng.gen_range(0..starters.len())])
}

/// Start a new bolt over a snapshot of `positions`.
///
/// Returns `None` when there is nothing to grow on: no particles, a
/// zero-sized world, or no particle in the spawn column.
pub fn spawn_bolt(
    positions: &[Vec2],
    torus: Torus,
    cfg: &LightningConfig,
    rng: &mut impl Rng,
    now: f64,
) -> Option<Bolt> {
    if positions.is_empty() || !torus.is_valid() {
        log::debug!(
            "no bolt: {} particles in a {}x{} world",
            positions.len(),
            torus.width(),
            torus.height()
        );
        return None;
    }
    let Some(start) = find_start(positions, torus, cfg, rng) else {
        log::debug!("no bolt: spawn column is empty");
        return None;
    };

    let index = SpatialIndex::build(positions, torus, SpatialConfig::for_step(cfg.max_step_dist));
    log::debug!(
        "spawned bolt at particle {start} over {} particles",
        positions.len()
    );
    Some(Bolt::new(start, index, cfg.pre_alpha, now))
}

/// Whether a snapshot position lies in the goal column.
pub fn in_goal(p: Vec2, torus: Torus, cfg: &LightningConfig) -> bool {
    torus.wrap(p).x >= torus.width() - cfg.right_col_width
}

/// Nearest candidate strictly to the right of `tip` that `avoid` does not
/// reject.
pub fn closest_right(
    index: &SpatialIndex,
    tip: usize,
    cfg: &LightningConfig,
    avoid: impl Fn(usize) -> bool,
) -> Option<usize> {
    let tip_pos = index.position(tip)?;
    let width = index.torus().width();
    index
        .k_nearest(tip_pos, cfg.k_nearest_budget, cfg.max_step_dist)
        .into_iter()
        .map(|n| n.index)
        .filter(|&idx| idx != tip && !avoid(idx))
        .find(|&idx| {
            index
                .position(idx)
                .is_some_and(|p| wrap_delta(p.x - tip_pos.x, width) > 0.0)
        })
}

/// Advance every live branch by at most one hop.
///
/// Does nothing once the bolt has finalized. Forked children join the bolt
/// immediately but take their first own hop on the following step.
pub fn grow_step(
    bolt: &mut Bolt,
    cfg: &LightningConfig,
    rng: &mut impl Rng,
    now: f64,
) -> StepOutcome {
    if bolt.event_time.is_some() {
        return StepOutcome::Finished;
    }

    let torus = bolt.index.torus();
    let max_steps = cfg.max_steps_per_branch as usize;
    let mut progressed = false;
    let mut children = Vec::new();

    for bi in 0..bolt.branches.len() {
        if bolt.branches[bi].dead {
            continue;
        }
        if bolt.branches[bi].hops() >= max_steps {
            bolt.branches[bi].dead = true;
            continue;
        }

        let fork_at = bolt.branches[bi].tip;

        // Main hop
        let claimed = &bolt.claimed;
        let Some(next) = closest_right(&bolt.index, fork_at, cfg, |i| claimed.contains(&i)) else {
            log::trace!("branch {bi} died at particle {fork_at}");
            bolt.branches[bi].dead = true;
            continue;
        };
        progressed = true;
        let key = bolt
            .edges
            .add_edge(fork_at, next, now, bolt.pre_alpha, cfg, rng);
        bolt.branches[bi].extend(key, next);
        bolt.claimed.insert(next);
        log::trace!("branch {bi} hopped {fork_at} -> {next}");

        if bolt.winner.is_none() && bolt.index.position(next).is_some_and(|p| in_goal(p, torus, cfg)) {
            bolt.winner = Some(bi);
        }

        // Fork from the same point
        let branch = &bolt.branches[bi];
        let wants_split = rng.gen::<f64>() < cfg.split_chance;
        if wants_split && branch.nodes.len() >= 2 && branch.hops() < max_steps {
            let claimed = &bolt.claimed;
            let split = closest_right(&bolt.index, fork_at, cfg, |i| {
                claimed.contains(&i) || i == next
            });
            if let Some(split) = split {
                progressed = true;
                let id = bolt.branches.len() + children.len();
                let key = bolt
                    .edges
                    .add_edge(fork_at, split, now, bolt.pre_alpha, cfg, rng);
                children.push(bolt.branches[bi].fork(id, key, split));
                bolt.claimed.insert(split);
                log::trace!("branch {bi} forked {id} at {fork_at} -> {split}");

                if bolt.winner.is_none()
                    && bolt.index.position(split).is_some_and(|p| in_goal(p, torus, cfg))
                {
                    bolt.winner = Some(id);
                }
            }
        }
    }
    bolt.branches.extend(children);

    if !progressed {
        for branch in &mut bolt.branches {
            branch.dead = true;
        }
    }

    let outcome = if let Some(winner) = bolt.winner {
        finalize(bolt, cfg, now);
        StepOutcome::Won(winner)
    } else if bolt.all_dead() {
        finalize(bolt, cfg, now);
        StepOutcome::Exhausted
    } else {
        StepOutcome::Grew
    };

    if bolt.event_time.is_none() {
        bolt.next_grow_at = now + cfg.hop_delay_ms;
    }
    outcome
}

/// Assign spark parameters to every edge and stop growth.
///
/// With a winner, exactly the edges on the winning branch's path are marked
/// winners and the spark fires now. Without one, every edge is a loser and
/// the spark fires after `no_win_delay_ms`.
pub fn finalize(bolt: &mut Bolt, cfg: &LightningConfig, now: f64) {
    if bolt.event_time.is_some() {
        return;
    }

    match bolt.winner {
        Some(winner) => {
            let path = &bolt.branches[winner].edges;
            for edge in bolt.edges.iter_mut() {
                let on_path = path.contains(&edge.key);
                edge.finalize(on_path, cfg);
            }
            bolt.event_time = Some(now);
            log::debug!(
                "bolt won by branch {winner}: {} of {} edges on the winning path",
                path.len(),
                bolt.edges.len()
            );
        }
        None => {
            for edge in bolt.edges.iter_mut() {
                edge.finalize(false, cfg);
            }
            bolt.event_time = Some(now + cfg.no_win_delay_ms);
            log::debug!("bolt exhausted with {} edges", bolt.edges.len());
        }
    }

    for branch in &mut bolt.branches {
        branch.dead = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges::EdgeKey;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn cfg() -> LightningConfig {
        LightningConfig {
            split_chance: 0.0,
            ..LightningConfig::default()
        }
    }

    fn torus() -> Torus {
        Torus::new(800.0, 600.0)
    }

    #[test]
    fn test_spawn_requires_particles_and_world() {
        let cfg = cfg();
        assert!(spawn_bolt(&[], torus(), &cfg, &mut rng(), 0.0).is_none());
        let pts = [Vec2::new(10.0, 10.0)];
        assert!(spawn_bolt(&pts, Torus::new(0.0, 600.0), &cfg, &mut rng(), 0.0).is_none());
    }

    #[test]
    fn test_spawn_requires_start_in_left_column() {
        let cfg = cfg();
        let pts = [Vec2::new(300.0, 10.0), Vec2::new(500.0, 10.0)];
        assert!(spawn_bolt(&pts, torus(), &cfg, &mut rng(), 0.0).is_none());

        let pts = [Vec2::new(300.0, 10.0), Vec2::new(50.0, 10.0)];
        let bolt = spawn_bolt(&pts, torus(), &cfg, &mut rng(), 5.0).unwrap();
        assert_eq!(bolt.start(), 1);
        assert!(bolt.claimed.contains(&1));
        assert_eq!(bolt.next_grow_at, 5.0);
    }

    #[test]
    fn test_closest_right_skips_left_and_avoided() {
        let cfg = cfg();
        let pts = [
            Vec2::new(100.0, 100.0), // tip
            Vec2::new(95.0, 100.0),  // nearest but to the left
            Vec2::new(110.0, 100.0), // avoided
            Vec2::new(130.0, 100.0),
        ];
        let index = SpatialIndex::build(&pts, torus(), SpatialConfig::for_step(140.0));
        assert_eq!(closest_right(&index, 0, &cfg, |i| i == 2), Some(3));
        assert_eq!(closest_right(&index, 0, &cfg, |_| false), Some(2));
        assert_eq!(closest_right(&index, 0, &cfg, |i| i >= 2), None);
    }

    #[test]
    fn test_closest_right_across_seam() {
        let cfg = cfg();
        let pts = [Vec2::new(790.0, 300.0), Vec2::new(20.0, 300.0)];
        let index = SpatialIndex::build(&pts, torus(), SpatialConfig::for_step(140.0));
        assert_eq!(closest_right(&index, 0, &cfg, |_| false), Some(1));
        assert_eq!(closest_right(&index, 1, &cfg, |_| false), None);
    }

    #[test]
    fn test_straight_line_wins() {
        let cfg = cfg();
        // x = 10, 120, ..., 780; the last one sits in the goal column
        let pts: Vec<Vec2> = (0..8).map(|i| Vec2::new(10.0 + i as f32 * 110.0, 300.0)).collect();
        let mut bolt = spawn_bolt(&pts, torus(), &cfg, &mut rng(), 0.0).unwrap();
        assert_eq!(bolt.start(), 0);

        let mut outcome = StepOutcome::Grew;
        let mut now = 0.0;
        while outcome == StepOutcome::Grew {
            outcome = grow_step(&mut bolt, &cfg, &mut rng(), now);
            now += cfg.hop_delay_ms;
        }
        assert_eq!(outcome, StepOutcome::Won(0));
        assert_eq!(bolt.branches[0].nodes, (0..8).collect::<Vec<_>>());
        assert_eq!(bolt.event_time, Some(now - cfg.hop_delay_ms));
        assert!(bolt.edges.iter().all(|e| e.is_winner));
        assert!(bolt.all_dead());
    }

    #[test]
    fn test_exhaustion_delays_event() {
        let cfg = cfg();
        let pts = [Vec2::new(10.0, 300.0), Vec2::new(60.0, 300.0)];
        let mut bolt = spawn_bolt(&pts, torus(), &cfg, &mut rng(), 0.0).unwrap();
        let start = bolt.start();

        let first = grow_step(&mut bolt, &cfg, &mut rng(), 0.0);
        if start == 0 {
            assert_eq!(first, StepOutcome::Grew);
            assert_eq!(bolt.next_grow_at, cfg.hop_delay_ms);
            let second = grow_step(&mut bolt, &cfg, &mut rng(), 10.0);
            assert_eq!(second, StepOutcome::Exhausted);
            assert_eq!(bolt.event_time, Some(10.0 + cfg.no_win_delay_ms));
        } else {
            assert_eq!(first, StepOutcome::Exhausted);
        }
        assert!(bolt.all_dead());
        assert!(bolt.edges.iter().all(|e| !e.is_winner && e.peak.is_some()));
        assert_eq!(grow_step(&mut bolt, &cfg, &mut rng(), 20.0), StepOutcome::Finished);
    }

    #[test]
    fn test_max_steps_kills_branch() {
        let cfg = LightningConfig {
            max_steps_per_branch: 2,
            left_col_width: 20.0,
            ..cfg()
        };
        let pts: Vec<Vec2> = (0..6).map(|i| Vec2::new(10.0 + i as f32 * 50.0, 300.0)).collect();
        let mut bolt = spawn_bolt(&pts, torus(), &cfg, &mut rng(), 0.0).unwrap();
        assert_eq!(bolt.start(), 0);
        let mut now = 0.0;
        let mut steps = 0;
        while bolt.event_time.is_none() {
            grow_step(&mut bolt, &cfg, &mut rng(), now);
            now += 10.0;
            steps += 1;
            assert!(steps < 10);
        }
        assert_eq!(bolt.branches[0].hops(), 2);
        assert!(bolt.winner.is_none());
    }

    #[test]
    fn test_fork_avoids_main_hop_and_claims() {
        let cfg = LightningConfig {
            split_chance: 1.0,
            ..cfg()
        };
        let pts = [
            Vec2::new(10.0, 300.0),
            Vec2::new(60.0, 300.0),
            Vec2::new(60.0, 340.0),
            Vec2::new(60.0, 260.0),
        ];
        let mut bolt = spawn_bolt(&pts[..1], torus(), &cfg, &mut rng(), 0.0).unwrap();
        // Rebuild over all points so the start is deterministic
        bolt.index = SpatialIndex::build(&pts, torus(), SpatialConfig::for_step(140.0));

        assert_eq!(grow_step(&mut bolt, &cfg, &mut rng(), 0.0), StepOutcome::Grew);
        assert_eq!(bolt.branches.len(), 2);
        let parent = &bolt.branches[0];
        let child = &bolt.branches[1];
        assert_eq!(parent.tip, 1);
        assert_ne!(child.tip, parent.tip);
        assert_eq!(child.nodes[0], 0);
        assert_eq!(child.edges, vec![EdgeKey::new(0, child.tip)]);
        assert_eq!(bolt.claimed.len(), 3);
    }
}
