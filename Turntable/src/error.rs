//! Error types for `Turntable`

use thiserror::Error;

use crate::loader::ModelFormat;

/// The error type for `Turntable` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Load Errors ====================
    /// The primary file's extension is not one of gltf, glb or obj.
    #[error("unsupported file format: {extension} (expected GLTF, GLB, or OBJ)")]
    UnsupportedFormat {
        /// The offending extension (lowercased, may be empty).
        extension: String,
    },

    /// The model parser rejected the file.
    #[error("error loading {format} model: {message}")]
    ModelLoad {
        /// Format the loader was dispatched on.
        format: ModelFormat,
        /// The parser's message.
        message: String,
    },

    /// A buffer or nested model file referenced by the model could not be resolved.
    #[error("failed to load critical resource: {name}")]
    CriticalResourceMissing {
        /// Basename of the missing resource.
        name: String,
    },

    /// The file selection given to the loader was empty.
    #[error("no files selected")]
    EmptySelection,

    // ==================== Generation Errors ====================
    /// Generation was requested before a model was loaded.
    #[error("no model loaded: please load a model first")]
    NoModelLoaded,

    /// A generation job is already active on this pipeline.
    #[error("a GIF generation job is already running")]
    JobInProgress,

    /// Generation options were rejected before any rendering.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The assembler received no frames.
    #[error("frame sequence is empty")]
    EmptyFrameSequence,

    /// The GIF encoder aborted.
    #[error("GIF generation failed: {reason}")]
    EncoderAborted {
        /// The encoder's abort reason.
        reason: String,
    },

    /// The renderer could not produce or capture a frame.
    #[error("render error: {0}")]
    Render(String),

    // ==================== Parsing Errors ====================
    /// Image decode or encode error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// TOML config parsing error.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// A color string was not `#rgb` or `#rrggbb`.
    #[error("invalid color '{0}': expected #rgb or #rrggbb")]
    InvalidColor(String),
}

/// A specialized Result type for `Turntable` operations.
pub type Result<T> = std::result::Result<T, Error>;
