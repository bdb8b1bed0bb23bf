//! The bolt aggregate: one lightning episode from spawn to full fade.
//!
//! A [`Bolt`] owns everything a single episode mutates: the deduplicated edge
//! set, its branches, the global claimed set and the frozen spatial snapshot
//! used for growth. It is created by [`spawn_bolt`](crate::growth::spawn_bolt),
//! grown by [`grow_step`](crate::growth::grow_step) and only read by the
//! renderer.

use std::collections::HashSet;

use crate::config::LightningConfig;
use crate::edges::{EdgeKey, EdgeRegistry};
use crate::phase::{self, EdgePhase};
use crate::spatial::SpatialIndex;

/// Identifier of a branch within its bolt (its index in `Bolt::branches`).
pub type BranchId = usize;

/// A single growing path.
#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    pub id: BranchId,
    /// Current tip particle.
    pub tip: usize,
    /// Visited particles, shared prefix included.
    pub nodes: Vec<usize>,
    /// Edges along `nodes`; always one fewer than `nodes`.
    pub edges: Vec<EdgeKey>,
    pub dead: bool,
}

impl Branch {
    /// A fresh branch sitting on `start`.
    pub fn root(id: BranchId, start: usize) -> Self {
        Self {
            id,
            tip: start,
            nodes: vec![start],
            edges: Vec::new(),
            dead: false,
        }
    }

    /// Number of hops taken, prefix included.
    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    /// Append a hop to `to` along `edge`.
    pub fn extend(&mut self, edge: EdgeKey, to: usize) {
        self.edges.push(edge);
        self.nodes.push(to);
        self.tip = to;
    }

    /// A child diverging at the second-to-last node.
    ///
    /// The child keeps every node up to and including the fork point, plus
    /// the edges between them, then hops along `edge` to `to`.
    pub fn fork(&self, id: BranchId, edge: EdgeKey, to: usize) -> Self {
        let keep = self.nodes.len().saturating_sub(1).max(1);
        let mut nodes = self.nodes[..keep].to_vec();
        let mut edges = self.edges[..keep - 1].to_vec();
        nodes.push(to);
        edges.push(edge);
        Self {
            id,
            tip: to,
            nodes,
            edges,
            dead: false,
        }
    }
}

/// Lifecycle of a bolt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoltState {
    /// Branches are still hopping; no winner known.
    Growing,
    /// Finalized (winner found or exhausted); edges run their spark/fade phases.
    Sparking,
    /// Every edge has faded out; the bolt can be discarded.
    Ended,
}

/// Aggregate root of one growth episode.
#[derive(Clone, Debug)]
pub struct Bolt {
    pub edges: EdgeRegistry,
    pub branches: Vec<Branch>,
    /// Particles already used as a destination (or start) by any branch.
    pub claimed: HashSet<usize>,
    pub winner: Option<BranchId>,
    /// Spark event time in ms; `None` while growing.
    pub event_time: Option<f64>,
    pub ended: bool,
    /// Earliest time the next growth step may run.
    pub next_grow_at: f64,
    /// Positions frozen at spawn; drives every hop of this bolt.
    pub index: SpatialIndex,
    /// Alpha given to every edge of this bolt at creation.
    pub pre_alpha: f32,
}

impl Bolt {
    /// A bolt with a single root branch on `start`.
    pub fn new(start: usize, index: SpatialIndex, pre_alpha: f32, now: f64) -> Self {
        let mut claimed = HashSet::new();
        claimed.insert(start);
        Self {
            edges: EdgeRegistry::new(),
            branches: vec![Branch::root(0, start)],
            claimed,
            winner: None,
            event_time: None,
            ended: false,
            next_grow_at: now,
            index,
            pre_alpha,
        }
    }

    pub fn state(&self) -> BoltState {
        if self.ended {
            BoltState::Ended
        } else if self.event_time.is_some() {
            BoltState::Sparking
        } else {
            BoltState::Growing
        }
    }

    /// True when no branch can grow any further.
    pub fn all_dead(&self) -> bool {
        self.branches.iter().all(|b| b.dead)
    }

    pub fn live_branches(&self) -> usize {
        self.branches.iter().filter(|b| !b.dead).count()
    }

    /// The root particle every branch started from.
    pub fn start(&self) -> usize {
        self.branches[0].nodes[0]
    }

    /// True once the spark event has passed and every edge is [`EdgePhase::Gone`].
    ///
    /// Edges still rising or not yet created never count as faded, so a bolt
    /// that wins on its very first hop still plays its full spark.
    pub fn faded_out(&self, cfg: &LightningConfig, now: f64) -> bool {
        let Some(event) = self.event_time else {
            return false;
        };
        now >= event
            && self.edges.iter().all(|edge| {
                phase::evaluate(edge, self.event_time, cfg, now)
                    .is_some_and(|v| v.phase == EdgePhase::Gone)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(nodes: &[usize]) -> Branch {
        let mut b = Branch::root(0, nodes[0]);
        for w in nodes.windows(2) {
            b.extend(EdgeKey::new(w[0], w[1]), w[1]);
        }
        b
    }

    #[test]
    fn test_extend_keeps_counts() {
        let b = path(&[1, 2, 3, 4]);
        assert_eq!(b.nodes.len(), b.edges.len() + 1);
        assert_eq!(b.tip, 4);
        assert_eq!(b.hops(), 3);
    }

    #[test]
    fn test_fork_shares_prefix() {
        // Parent just hopped 3 -> 4; the child forks at 3 towards 7
        let parent = path(&[1, 2, 3, 4]);
        let child = parent.fork(5, EdgeKey::new(3, 7), 7);

        assert_eq!(child.id, 5);
        assert_eq!(child.nodes, vec![1, 2, 3, 7]);
        assert_eq!(
            child.edges,
            vec![EdgeKey::new(1, 2), EdgeKey::new(2, 3), EdgeKey::new(3, 7)]
        );
        assert_eq!(child.nodes.len(), child.edges.len() + 1);
        assert_eq!(child.tip, 7);
    }

    #[test]
    fn test_faded_out_waits_for_every_edge() {
        use crate::spatial::SpatialConfig;
        use crate::torus::Torus;
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let cfg = LightningConfig::default();
        let positions = [glam::Vec2::new(10.0, 10.0), glam::Vec2::new(60.0, 10.0)];
        let index = SpatialIndex::build(&positions, Torus::new(200.0, 200.0), SpatialConfig::default());
        let mut bolt = Bolt::new(0, index, cfg.pre_alpha, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let key = bolt.edges.add_edge(0, 1, 50.0, cfg.pre_alpha, &cfg, &mut rng);
        bolt.branches[0].extend(key, 1);
        assert!(!bolt.faded_out(&cfg, 1e9));

        // Event at the edge's own creation: it is still rising
        bolt.event_time = Some(50.0);
        bolt.edges.iter_mut().for_each(|e| e.finalize(true, &cfg));
        assert!(!bolt.faded_out(&cfg, 50.0));
        assert!(!bolt.faded_out(&cfg, 49.0));

        let end = 50.0 + cfg.spark_rise_ms + cfg.spark_hold_ms + cfg.fade_ms;
        assert!(!bolt.faded_out(&cfg, end - 1.0));
        assert!(bolt.faded_out(&cfg, end + 1.0));
    }

    #[test]
    fn test_faded_out_without_edges() {
        use crate::spatial::SpatialConfig;
        use crate::torus::Torus;

        let cfg = LightningConfig::default();
        let index = SpatialIndex::build(&[glam::Vec2::ZERO], Torus::new(100.0, 100.0), SpatialConfig::default());
        let mut bolt = Bolt::new(0, index, cfg.pre_alpha, 0.0);
        bolt.event_time = Some(180.0);
        assert!(!bolt.faded_out(&cfg, 100.0));
        assert!(bolt.faded_out(&cfg, 180.0));
    }

    #[test]
    fn test_fork_after_first_hop() {
        let parent = path(&[1, 2]);
        let child = parent.fork(1, EdgeKey::new(1, 9), 9);
        assert_eq!(child.nodes, vec![1, 9]);
        assert_eq!(child.edges, vec![EdgeKey::new(1, 9)]);
    }
}
