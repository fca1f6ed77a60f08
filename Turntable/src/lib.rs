//! # Turntable
//!
//! A pure-Rust library for turning 3D models into seamlessly looping
//! turntable GIFs.
//!
//! ## Supported Formats
//!
//! - **glTF** - `.gltf` with side `.bin` buffers and textures, or data URIs
//! - **GLB** - binary glTF with embedded buffers
//! - **OBJ** - Wavefront OBJ with optional `.mtl` and textures
//!
//! ## Quick Start
//!
//! ```no_run
//! use turntable::prelude::*;
//!
//! let selection = FileSelection::with_siblings("models/chair.gltf")?;
//! let mut pipeline = Pipeline::default();
//! pipeline.load(&selection)?;
//!
//! let options = GenerationOptions {
//!     frame_count: 24,
//!     background: "#202020".parse()?,
//!     ..GenerationOptions::default()
//! };
//! let output = pipeline.generate(&options, &mut |progress| {
//!     println!("{}%", progress.percent);
//! })?;
//! std::fs::write("chair.gif", &output.blob.bytes)?;
//! # Ok::<(), turntable::Error>(())
//! ```
//!
//! ## Stepping a Job
//!
//! A UI that must stay responsive can drive a [`pipeline::GenerationJob`]
//! one frame at a time instead of calling `generate`:
//!
//! ```no_run
//! # use turntable::prelude::*;
//! # fn demo(pipeline: &Pipeline) -> turntable::Result<()> {
//! let mut job = pipeline.start_generation(&GenerationOptions::default())?;
//! while !job.step(&mut |_| {})?.is_terminal() {
//!     // repaint here
//! }
//! let _output = job.into_output()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `turntable` command-line binary
//!
//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: MIT

pub mod error;
pub mod config;
pub mod scene;
pub mod normalize;
pub mod camera;
pub mod framing;
pub mod loader;
pub mod render;
pub mod encode;
pub mod turntable;
pub mod assemble;
pub mod pipeline;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::config::{GenerationOptions, Rgb, TurntableConfig};
    pub use crate::loader::{
        FileSelection, LoadReport, ModelFormat, ResourceWarning, SelectedFile, load_model,
    };
    pub use crate::pipeline::{
        GenerationJob, GenerationOutput, GenerationPhase, GenerationProgress, JobPhase,
        Pipeline, PipelineState, PreviewContext,
    };
    pub use crate::encode::{FrameEncoder, GifBlob, GifFrameEncoder};
    pub use crate::render::{CapturedFrame, Renderer, SoftwareRenderer};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
