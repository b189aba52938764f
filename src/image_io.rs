//! Image file input and output
//!
//! Sources of any pixel format are converted to 8-bit RGBA before warping.
//! On output, formats that cannot carry an alpha channel get an opaque RGB
//! buffer instead.

use image::{DynamicImage, RgbaImage};
use std::path::Path;
use tracing::debug;

use crate::error::Result;

/// Extensions (lowercase) whose formats have no alpha channel
const NO_ALPHA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jfif", "bmp", "pcx", "pbm", "pgm", "ppm", "eps", "pdf", "dcx",
];

/// Decode an image file and convert it to RGBA
pub fn load_rgba(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path)?;
    debug!(
        "Loaded {:?}: {}x{} {:?}",
        path,
        image.width(),
        image.height(),
        image.color()
    );
    Ok(image.to_rgba8())
}

/// Whether the output path names a format without alpha support
pub fn needs_flatten(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            NO_ALPHA_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Encode an RGBA buffer, choosing the format from the file extension
///
/// Alpha is dropped (not composited) for formats without an alpha channel.
pub fn save(image: &RgbaImage, path: &Path) -> Result<()> {
    if needs_flatten(path) {
        debug!("Dropping alpha channel for {:?}", path);
        let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        rgb.save(path)?;
    } else {
        image.save(path)?;
    }
    Ok(())
}
