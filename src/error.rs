//! Error types for sparkfield.
//!
//! The lightning core never fails: missing particles or an empty world simply
//! mean "nothing to spawn" or "nothing to draw". Errors only surface at the
//! I/O edges: reading and writing configuration, and exporting frames.

use std::io;

use thiserror::Error;

/// Errors that can occur while loading, saving or patching configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write the configuration file.
    #[error("failed to access config file: {0}")]
    Io(#[from] io::Error),
    /// The document is not valid configuration JSON.
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Patches must be JSON objects mapping option names to values.
    #[error("config patch must be a JSON object, got {0}")]
    PatchNotObject(&'static str),
}

/// Errors that can occur when exporting a rendered frame.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Failed to create the output file or directory.
    #[error("failed to write frame: {0}")]
    Io(#[from] io::Error),
    /// The image encoder rejected the frame.
    #[error("failed to encode frame: {0}")]
    Image(#[from] image::ImageError),
    /// The raster has no pixels.
    #[error("cannot export an empty {width}x{height} frame")]
    EmptyFrame { width: u32, height: u32 },
}

/// A flow field name that matches none of the built-in fields.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown flow field `{0}`")]
pub struct UnknownField(pub String);
