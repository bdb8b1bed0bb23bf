//! Headless renderer: drift a particle field, grow lightning on it and write
//! every frame as a PNG.

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use glam::Vec2;

use sparkfield::flow::{FlowConfig, FlowField, FlowParticles};
use sparkfield::time::Clock;
use sparkfield::{Lightning, LightningConfig, Raster};

#[derive(Debug, Parser)]
#[command(name = "sparkfield", version, about = "Render particle lightning to PNG frames")]
struct Cli {
    /// Number of frames to render
    #[arg(short = 'n', long, default_value_t = 240)]
    frames: u32,

    /// Output directory for frame_XXXXX.png files
    #[arg(short, long, default_value = "frames")]
    out: PathBuf,

    /// Lightning configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for particles and lightning
    #[arg(short, long, default_value_t = 1)]
    seed: u64,

    /// Vector field driving the particles
    #[arg(short, long, default_value_t = FlowField::Sineflow)]
    field: FlowField,

    /// Number of particles
    #[arg(long, default_value_t = 1000)]
    particles: usize,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Frames per second of simulated time
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Log level forced by `-v` flags; `None` leaves `RUST_LOG` in charge.
fn verbosity_level(verbose: u8) -> Option<log::LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = verbosity_level(cli.verbose) {
        logger.filter_level(level);
    }
    logger.init();

    let config = match &cli.config {
        Some(path) => LightningConfig::load(path)?,
        None => LightningConfig::default(),
    };
    fs::create_dir_all(&cli.out)?;

    let world = Vec2::new(cli.width as f32, cli.height as f32);
    let flow_config = FlowConfig {
        count: cli.particles,
        field: cli.field,
        ..FlowConfig::default()
    };
    let mut flow = FlowParticles::with_seed(flow_config, world, cli.seed);
    let mut lightning = Lightning::with_seed(config, cli.seed.wrapping_add(1));
    let mut clock = Clock::fixed(1000.0 / cli.fps.max(1.0));
    // Particle trails accumulate; lightning is drawn fresh on a copy each frame
    let mut trails = Raster::new(cli.width, cli.height);
    let mut frame = trails.clone();

    log::info!(
        "rendering {} frames of {}x{} with {} particles on {}",
        cli.frames,
        cli.width,
        cli.height,
        cli.particles,
        cli.field
    );

    let mut bolts = 0;
    let mut had_bolt = false;
    for i in 0..cli.frames {
        let now_ms = clock.tick();
        flow.step(now_ms / 1000.0);
        flow.draw(&mut trails);

        frame.clone_from(&trails);
        let stats = lightning.update_at(now_ms, &flow, &mut frame);
        log::trace!("frame {i}: {stats:?}");

        let has_bolt = lightning.bolt().is_some();
        if has_bolt && !had_bolt {
            bolts += 1;
        }
        had_bolt = has_bolt;

        frame.save_png(cli.out.join(format!("frame_{i:05}.png")))?;
    }

    log::info!("wrote {} frames with {bolts} bolts to {}", cli.frames, cli.out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(verbosity_level(0), None);
        assert_eq!(verbosity_level(1), Some(log::LevelFilter::Debug));
        assert_eq!(verbosity_level(2), Some(log::LevelFilter::Trace));
        assert_eq!(verbosity_level(7), Some(log::LevelFilter::Trace));
    }

    #[test]
    fn test_cli_counts_verbose_flags() {
        let cli = Cli::try_parse_from(["sparkfield", "-vv", "--frames", "3"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.frames, 3);
        assert_eq!(cli.field, FlowField::Sineflow);
    }
}
