//! Piranesi - perspective warp of an image onto a quadrilateral
//!
//! Positions along each edge of the target quadrilateral follow a geometric
//! progression derived from the vanishing points of its opposite edges,
//! rather than the rational-linear spacing of a homography.
//!
//! ```no_run
//! use piranesi::{Config, render};
//!
//! let source = piranesi::image_io::load_rgba("input.png".as_ref())?;
//! let output = render(&source, &Config::default())?;
//! piranesi::image_io::save(&output, "output.png".as_ref())?;
//! # Ok::<(), piranesi::PiranesiError>(())
//! ```

pub mod config;
pub mod error;
pub mod geometry;
pub mod image_io;
pub mod quad;
pub mod resample;
pub mod transform;

use image::RgbaImage;
use serde::Serialize;

pub use config::Config;
pub use error::{PiranesiError, Result};
pub use geometry::{Line, Point};
pub use quad::{EdgeScaleFactors, Quad, VanishingPoints};
pub use resample::{warp, SamplingGrid};
pub use transform::{PiranesiTransform, SolverTunables};

/// Solved geometry of a configured quadrilateral
#[derive(Debug, Clone, Serialize)]
pub struct GeometryReport {
    pub width: u32,
    pub height: u32,
    pub quad: Quad,
    pub vanishing_points: VanishingPoints,
    pub scale_factors: EdgeScaleFactors,
}

impl GeometryReport {
    pub fn new(transform: &PiranesiTransform) -> Self {
        Self {
            width: transform.width(),
            height: transform.height(),
            quad: *transform.quad(),
            vanishing_points: *transform.vanishing_points(),
            scale_factors: *transform.factors(),
        }
    }
}

/// Validate `config` and warp `source` onto its quadrilateral
pub fn render(source: &RgbaImage, config: &Config) -> Result<RgbaImage> {
    config.validate()?;
    let transform = PiranesiTransform::from_config(config)?;
    warp(source, &transform, config.grid.size)
}
