//! Error types for the warp pipeline
//!
//! Numerical trouble inside the mapping (parallel lines, vertical edges,
//! non-convergence) is absorbed by fallbacks. Only invalid configuration and
//! I/O failures surface here, and they are raised before any pixel work.

use thiserror::Error;

/// Errors produced by configuration, geometry setup and image I/O
#[derive(Debug, Error)]
pub enum PiranesiError {
    /// Canvas width or height is zero
    #[error("invalid canvas size {width}x{height}: both dimensions must be positive")]
    InvalidCanvas { width: u32, height: u32 },

    /// The four corners enclose (almost) no area
    #[error("degenerate quadrilateral: enclosed area {area} is too small")]
    DegenerateQuad { area: f64 },

    /// A corner coordinate is NaN or infinite
    #[error("corner {name} has non-finite coordinates ({x}, {y})")]
    InvalidCorner { name: &'static str, x: f64, y: f64 },

    /// A solver tunable is out of range
    #[error("invalid solver setting {name} = {value}")]
    InvalidTunable { name: &'static str, value: f64 },

    /// Sampling grid with no cells
    #[error("sampling grid size must be at least 1")]
    InvalidGrid,

    /// Source image with no pixels
    #[error("source image is empty ({width}x{height})")]
    EmptySource { width: u32, height: u32 },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, PiranesiError>;
