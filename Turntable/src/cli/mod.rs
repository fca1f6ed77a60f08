//! Turntable CLI - render a 3D model into a looping turntable GIF

pub mod generate;
pub mod progress;

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

use crate::config::{GenerationOptions, Rgb, TurntableConfig};

#[derive(Parser, Debug)]
#[command(name = "turntable")]
#[command(version, about = "Turn GLTF/GLB/OBJ models into looping turntable GIFs", long_about = None)]
pub struct Cli {
    /// Model file (.gltf, .glb or .obj)
    #[arg(short, long)]
    pub model: PathBuf,

    /// Output GIF path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Rotation frames per turn [default: 36]
    #[arg(short, long)]
    pub frames: Option<u32>,

    /// Width and height of the GIF in pixels [default: 400]
    #[arg(short, long)]
    pub size: Option<u32>,

    /// Background color as #rrggbb or #rgb [default: #ffffff]
    #[arg(short, long)]
    pub bg: Option<Rgb>,

    /// Side files the model references (.bin, .mtl, textures)
    #[arg(long, num_args = 1..)]
    pub with: Vec<PathBuf>,

    /// Also select every file in the model's directory
    #[arg(long)]
    pub siblings: bool,

    /// Scale multiplier applied on top of the fitted size [default: 1.0]
    #[arg(long)]
    pub scale: Option<f32>,

    /// Per-frame delay in milliseconds [default: 80]
    #[arg(long)]
    pub delay: Option<u16>,

    /// Quantizer quality, 1 (best) to 30 (fastest) [default: 10]
    #[arg(long)]
    pub quality: Option<i32>,

    /// Color quantization threads [default: 2]
    #[arg(long)]
    pub workers: Option<usize>,

    /// Disable supersampled edges
    #[arg(long)]
    pub no_antialias: bool,

    /// Also write the three-quarter preview render as PNG
    #[arg(long)]
    pub preview: Option<PathBuf>,

    /// TOML option file; flags given on the command line take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print per-resource and per-frame detail
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply command-line flags over `config`.
    #[must_use]
    pub fn resolve(&self, config: TurntableConfig) -> (GenerationOptions, f32) {
        let defaults = config.generation;
        let options = GenerationOptions {
            frame_count: self.frames.unwrap_or(defaults.frame_count),
            image_size: self.size.unwrap_or(defaults.image_size),
            background: self.bg.unwrap_or(defaults.background),
            delay_ms: self.delay.unwrap_or(defaults.delay_ms),
            quality: self.quality.unwrap_or(defaults.quality),
            workers: self.workers.unwrap_or(defaults.workers),
            antialias: defaults.antialias && !self.no_antialias,
        };
        (options, self.scale.unwrap_or(config.scale))
    }

    fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        }
    }
}

/// Run the Turntable CLI
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    generate::execute(&cli)?;
    Ok(())
}
