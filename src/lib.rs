//! # Sparkfield - lightning over a particle field
//!
//! Procedural lightning that grows across a moving 2D particle field on a
//! wrap-around world, then flashes and fades.
//!
//! Sparkfield never owns the particles. A host hands it the current
//! positions every frame (anything implementing [`ParticleSource`]) plus a
//! drawing surface, and the [`Lightning`] driver takes care of the rest:
//! when to start a bolt, how far it grows each step, and what every edge
//! looks like right now.
//!
//! ## Quick Start
//!
//! ```ignore
//! use sparkfield::prelude::*;
//!
//! fn main() {
//!     let world = Vec2::new(800.0, 600.0);
//!     let mut flow = FlowParticles::with_seed(FlowConfig::default(), world, 1);
//!     let mut lightning = Lightning::with_seed(LightningConfig::default(), 1);
//!     let mut frame = Raster::new(800, 600);
//!
//!     for i in 0..600 {
//!         let now_ms = i as f64 * 1000.0 / 60.0;
//!         flow.step(now_ms / 1000.0);
//!         flow.draw(&mut frame);
//!         lightning.update_at(now_ms, &flow, &mut frame);
//!     }
//!     frame.save_png("last.png").unwrap();
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Bolts
//!
//! A [`Bolt`] is one lightning episode. It starts on a random particle in
//! the left spawn column and hops, one step every `hop_delay_ms`, to the
//! nearest unclaimed particle strictly to its right. Branches occasionally
//! fork. The first branch to land in the right goal column wins.
//!
//! ### Edges and phases
//!
//! Every hop is an [`Edge`], registered once per bolt no matter how many
//! branches share it. An edge stores timing and style only; its look at any
//! instant comes from [`phase::evaluate`]:
//!
//! | Phase | Starts |
//! |-------|--------|
//! | Rise | when the edge is created |
//! | Steady | after `rise_ms` |
//! | Spark rise / hold / fade | at the bolt's spark event |
//! | Gone | after the fade |
//!
//! ### The torus
//!
//! The world wraps at its edges. Neighbor search, the rightward test and
//! every drawn segment use the shorter path across the seam (see [`torus`]).
//!
//! ### Surfaces
//!
//! Drawing goes through the small canvas-like [`Surface`] trait. [`Raster`]
//! is a software implementation with PNG export; [`Recorder`] captures
//! commands for tests.
//!
//! ## Configuration
//!
//! [`LightningConfig`] is plain serde data. Load it from JSON, patch it at
//! runtime with [`Lightning::apply_patch`], and every value is clamped to a
//! sane range on the way in.
//!
//! ```ignore
//! lightning.apply_patch(&serde_json::json!({
//!     "split_chance": 0.1,
//!     "render_mode": "capsule",
//! }))?;
//! ```

pub mod bolt;
pub mod color;
pub mod config;
pub mod edges;
pub mod error;
pub mod flow;
pub mod growth;
pub mod phase;
pub mod raster;
pub mod render;
pub mod scheduler;
pub mod spatial;
pub mod surface;
pub mod time;
pub mod torus;

pub use bolt::{Bolt, BoltState, Branch, BranchId};
pub use color::{Hsv, Rgb, Rgba};
pub use config::{LightningConfig, RenderMode};
pub use edges::{Edge, EdgeKey, EdgeRegistry};
pub use error::{ConfigError, ExportError, UnknownField};
pub use flow::{FlowConfig, FlowField, FlowParticles};
pub use glam::{Vec2, Vec3, Vec4};
pub use growth::StepOutcome;
pub use phase::{EdgePhase, EdgeVisual};
pub use raster::Raster;
pub use render::RenderStats;
pub use scheduler::{Lightning, ParticleSource, Scheduler};
pub use spatial::{SpatialConfig, SpatialIndex};
pub use surface::{CompositeOp, LineCap, LineJoin, Recorder, Surface};
pub use time::Clock;
pub use torus::Torus;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use sparkfield::prelude::*;
/// ```
///
/// This imports:
/// - [`Lightning`] and [`LightningConfig`] - the driver and its settings
/// - [`ParticleSource`] - the contract particle hosts implement
/// - [`FlowParticles`], [`FlowConfig`], [`FlowField`] - the built-in particle field
/// - [`Raster`], [`Surface`] - drawing targets
/// - [`Vec2`] - glam vector type
pub mod prelude {
    pub use crate::config::{LightningConfig, RenderMode};
    pub use crate::flow::{FlowConfig, FlowField, FlowParticles};
    pub use crate::raster::Raster;
    pub use crate::scheduler::{Lightning, ParticleSource};
    pub use crate::surface::{LineCap, Surface};
    pub use crate::time::Clock;
    pub use crate::Vec2;
}
