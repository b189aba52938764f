//! Grid-accelerated resampling of the source image into the quadrilateral
//!
//! The inverse solve is too expensive to run per pixel, so it runs only on a
//! coarse lattice of destination pixels. Every destination pixel then
//! interpolates its source coordinate from the four surrounding lattice
//! nodes and samples the source bilinearly.

use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::error::{PiranesiError, Result};
use crate::geometry::Point;
use crate::transform::PiranesiTransform;

/// Number of cells along each axis of the sampling grid
pub const DEFAULT_GRID_SIZE: u32 = 64;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Precomputed source coordinates on a `(size+1) x (size+1)` lattice
#[derive(Debug, Clone)]
pub struct SamplingGrid {
    size: u32,
    /// Destination canvas the lattice spans
    width: u32,
    height: u32,
    /// Source pixel coordinates, row-major
    nodes: Vec<Point>,
}

/// Solver outcomes over all grid nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridStats {
    pub nodes: usize,
    pub converged: usize,
    /// Nodes that stopped on the iteration cap or a vanishing derivative
    pub unconverged: usize,
    pub max_iterations: u32,
}

impl SamplingGrid {
    /// Run the inverse solver at every lattice node
    ///
    /// Node `(gx, gy)` sits on destination pixel
    /// `(gx * (width - 1) / size, gy * (height - 1) / size)`, rounded down.
    /// The solved unit-square point is scaled to source pixels.
    pub fn build(
        transform: &PiranesiTransform,
        src_width: u32,
        src_height: u32,
        size: u32,
    ) -> Result<(Self, GridStats)> {
        if size == 0 {
            return Err(PiranesiError::InvalidGrid);
        }

        let width = transform.width();
        let height = transform.height();
        let side = size as usize + 1;
        let mut nodes = Vec::with_capacity(side * side);
        let mut stats = GridStats::default();

        for gy in 0..=size {
            for gx in 0..=size {
                let x_pix = node_pixel(gx, width, size);
                let y_pix = node_pixel(gy, height, size);

                let (unit, solve) =
                    transform.inverse_with_stats(Point::new(x_pix as f64, y_pix as f64));
                nodes.push(Point::new(unit.x * src_width as f64, unit.y * src_height as f64));

                stats.nodes += 1;
                if solve.converged {
                    stats.converged += 1;
                } else {
                    stats.unconverged += 1;
                }
                stats.max_iterations = stats.max_iterations.max(solve.iterations);
            }
        }

        debug!(
            "Sampling grid {}x{}: {} converged, {} unconverged, max {} iterations",
            side, side, stats.converged, stats.unconverged, stats.max_iterations
        );

        Ok((
            Self {
                size,
                width,
                height,
                nodes,
            },
            stats,
        ))
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Source coordinate stored at a lattice node
    #[inline]
    pub fn node(&self, gx: u32, gy: u32) -> Point {
        self.nodes[gy as usize * (self.size as usize + 1) + gx as usize]
    }

    /// Interpolated source coordinate for a destination pixel
    pub fn source_coordinate(&self, x_pix: u32, y_pix: u32) -> Point {
        let (gx, dx) = cell(x_pix, self.width, self.size);
        let (gy, dy) = cell(y_pix, self.height, self.size);

        let p00 = self.node(gx, gy);
        let p10 = self.node(gx + 1, gy);
        let p01 = self.node(gx, gy + 1);
        let p11 = self.node(gx + 1, gy + 1);

        Point::new(
            bilerp(p00.x, p10.x, p01.x, p11.x, dx, dy),
            bilerp(p00.y, p10.y, p01.y, p11.y, dx, dy),
        )
    }
}

/// Warp `source` onto the transform's quadrilateral
///
/// Pixels outside the quadrilateral, or whose interpolated source coordinate
/// falls outside the source image, are fully transparent.
pub fn warp(source: &RgbaImage, transform: &PiranesiTransform, grid_size: u32) -> Result<RgbaImage> {
    let (src_width, src_height) = source.dimensions();
    if src_width == 0 || src_height == 0 {
        return Err(PiranesiError::EmptySource {
            width: src_width,
            height: src_height,
        });
    }

    let width = transform.width();
    let height = transform.height();
    let quad = transform.quad();

    let (grid, _) = SamplingGrid::build(transform, src_width, src_height, grid_size)?;
    let mut output = RgbaImage::from_pixel(width, height, TRANSPARENT);

    let mut covered = 0usize;
    for y_pix in 0..height {
        for x_pix in 0..width {
            if !quad.contains_pixel(Point::new(x_pix as f64, y_pix as f64), width, height) {
                continue;
            }

            let src = grid.source_coordinate(x_pix, y_pix);
            if let Some(pixel) = sample_source(source, src.x, src.y) {
                output.put_pixel(x_pix, y_pix, pixel);
                covered += 1;
            }
        }
    }

    debug!(
        "Warped {}x{} source into {}x{} canvas, {} pixels covered",
        src_width, src_height, width, height, covered
    );
    Ok(output)
}

/// Bilinear sample of the source, or `None` outside `[0, w) x [0, h)`
///
/// Each channel, alpha included, is interpolated independently and
/// truncated toward zero.
#[inline]
pub fn sample_source(src: &RgbaImage, x: f64, y: f64) -> Option<Rgba<u8>> {
    let (width, height) = src.dimensions();
    if !(x >= 0.0 && x < width as f64 && y >= 0.0 && y < height as f64) {
        return None;
    }

    let x0 = x as u32;
    let y0 = y as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = src.get_pixel(x0, y0);
    let p10 = src.get_pixel(x1, y0);
    let p01 = src.get_pixel(x0, y1);
    let p11 = src.get_pixel(x1, y1);

    let mut result = [0u8; 4];
    for c in 0..4 {
        let value = bilerp(
            p00[c] as f64,
            p10[c] as f64,
            p01[c] as f64,
            p11[c] as f64,
            fx,
            fy,
        );
        result[c] = value as u8;
    }
    Some(Rgba(result))
}

/// Destination pixel under lattice node `g` along an axis of `extent` pixels
#[inline]
fn node_pixel(g: u32, extent: u32, size: u32) -> u32 {
    (g as u64 * (extent as u64 - 1) / size as u64) as u32
}

/// Lattice cell index (at most `size - 1`) and offset within it for a pixel
#[inline]
fn cell(pix: u32, extent: u32, size: u32) -> (u32, f64) {
    // A one-pixel axis has every pixel on node 0
    if extent <= 1 {
        return (0, 0.0);
    }
    let g = pix as f64 * size as f64 / (extent - 1) as f64;
    let index = (g as u32).min(size - 1);
    (index, g - index as f64)
}

#[inline]
fn bilerp(v00: f64, v10: f64, v01: f64, v11: f64, dx: f64, dy: f64) -> f64 {
    let top = v00 + (v10 - v00) * dx;
    let bottom = v01 + (v11 - v01) * dx;
    top + (bottom - top) * dy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quad::Quad;
    use crate::transform::SolverTunables;

    const COLOR: Rgba<u8> = Rgba([200, 120, 40, 255]);

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 19) as u8, (y * 17) as u8, ((x + y) * 7) as u8, 255 - (x * 3) as u8])
        })
    }

    fn scaled_quad(scale: f64) -> Quad {
        let q = Quad::default();
        Quad::new(q.a * scale, q.b * scale, q.c * scale, q.d * scale)
    }

    #[test]
    fn test_solid_source_fills_quad() {
        let source = RgbaImage::from_pixel(100, 100, COLOR);
        let transform =
            PiranesiTransform::new(Quad::default(), 1600, 1600, SolverTunables::default()).unwrap();
        let output = warp(&source, &transform, DEFAULT_GRID_SIZE).unwrap();
        assert_eq!(output.dimensions(), (1600, 1600));

        let quad = transform.quad();
        let mut inside = 0usize;
        for (x, y, pixel) in output.enumerate_pixels() {
            if quad.contains_pixel(Point::new(x as f64, y as f64), 1600, 1600) {
                inside += 1;
                assert_eq!(*pixel, COLOR, "({}, {})", x, y);
            } else {
                assert_eq!(*pixel, TRANSPARENT, "({}, {})", x, y);
            }
        }

        assert!(inside > 0);
        assert_eq!(*output.get_pixel(800, 800), COLOR);
    }

    #[test]
    fn test_outside_pixels_transparent() {
        let source = gradient(13, 11);
        let transform =
            PiranesiTransform::new(scaled_quad(0.125), 200, 200, SolverTunables::default())
                .unwrap();
        let output = warp(&source, &transform, DEFAULT_GRID_SIZE).unwrap();

        for (x, y, pixel) in output.enumerate_pixels() {
            if !transform.quad().contains_pixel(Point::new(x as f64, y as f64), 200, 200) {
                assert_eq!(pixel[3], 0, "({}, {})", x, y);
            }
        }
        // Top-left corner of the canvas lies outside the quad
        assert_eq!(*output.get_pixel(0, 0), TRANSPARENT);
    }

    #[test]
    fn test_warp_is_deterministic() {
        let source = gradient(13, 11);
        let transform =
            PiranesiTransform::new(scaled_quad(0.25), 400, 400, SolverTunables::default())
                .unwrap();
        let first = warp(&source, &transform, DEFAULT_GRID_SIZE).unwrap();
        let second = warp(&source, &transform, DEFAULT_GRID_SIZE).unwrap();
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn test_rectangle_matches_direct_bilinear() {
        // 65 pixels put every lattice node on a whole pixel
        let size = 65u32;
        let side = size as f64;
        let quad = Quad::new(
            Point::new(0.0, side),
            Point::new(side, side),
            Point::new(side, 0.0),
            Point::new(0.0, 0.0),
        );
        let tunables = SolverTunables {
            damping: 1.0,
            max_iterations: 50,
            ..SolverTunables::default()
        };
        let transform = PiranesiTransform::new(quad, size, size, tunables).unwrap();
        let source = gradient(13, 13);
        let output = warp(&source, &transform, DEFAULT_GRID_SIZE).unwrap();

        for (x, y, pixel) in output.enumerate_pixels() {
            let expected = sample_source(
                &source,
                x as f64 * 13.0 / side,
                y as f64 * 13.0 / side,
            )
            .unwrap();
            for c in 0..4 {
                let diff = (pixel[c] as i32 - expected[c] as i32).abs();
                assert!(diff <= 1, "({}, {}) channel {}: {:?} vs {:?}", x, y, c, pixel, expected);
            }
        }
    }

    #[test]
    fn test_grid_nodes_follow_inverse() {
        let transform =
            PiranesiTransform::new(Quad::default(), 1600, 1600, SolverTunables::default()).unwrap();
        let (grid, stats) = SamplingGrid::build(&transform, 100, 50, 8).unwrap();
        assert_eq!(grid.size(), 8);
        assert_eq!(stats.nodes, 81);
        assert_eq!(stats.converged + stats.unconverged, 81);

        // Node (8, 8) sits on the last pixel, node (4, 2) on (799, 399)
        for (gx, gy, px, py) in [(8, 8, 1599.0, 1599.0), (4, 2, 799.0, 399.0)] {
            let unit = transform.inverse(Point::new(px, py));
            assert_eq!(grid.node(gx, gy), Point::new(unit.x * 100.0, unit.y * 50.0));
        }
    }

    #[test]
    fn test_grid_interpolates_between_nodes() {
        let transform =
            PiranesiTransform::new(Quad::default(), 1600, 1600, SolverTunables::default()).unwrap();
        let (grid, _) = SamplingGrid::build(&transform, 100, 100, 1).unwrap();

        // A single cell spanning the canvas: corners reproduce the nodes
        assert_eq!(grid.source_coordinate(0, 0), grid.node(0, 0));
        for (x, y, gx, gy) in [(1599, 1599, 1, 1), (1599, 0, 1, 0), (0, 1599, 0, 1)] {
            let p = grid.source_coordinate(x, y);
            let node = grid.node(gx, gy);
            assert!((p.x - node.x).abs() < 1e-9 && (p.y - node.y).abs() < 1e-9);
        }

        // Interior pixels blend all four nodes
        let centre = grid.source_coordinate(799, 799);
        let g = 799.0 / 1599.0;
        let expected_x = bilerp(
            grid.node(0, 0).x,
            grid.node(1, 0).x,
            grid.node(0, 1).x,
            grid.node(1, 1).x,
            g,
            g,
        );
        assert!((centre.x - expected_x).abs() < 1e-9);
    }

    #[test]
    fn test_sample_source_bounds() {
        let source = gradient(4, 3);
        assert!(sample_source(&source, -0.01, 1.0).is_none());
        assert!(sample_source(&source, 4.0, 1.0).is_none());
        assert!(sample_source(&source, 1.0, 3.0).is_none());
        assert!(sample_source(&source, f64::NAN, 1.0).is_none());
        // Last column clamps its right neighbour
        assert_eq!(sample_source(&source, 3.5, 2.5), Some(*source.get_pixel(3, 2)));
    }

    #[test]
    fn test_sample_source_truncates() {
        let source = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        assert_eq!(sample_source(&source, 0.5, 0.0), Some(Rgba([127, 127, 127, 127])));
        assert_eq!(sample_source(&source, 0.999, 0.0), Some(Rgba([254, 254, 254, 254])));
    }

    #[test]
    fn test_single_pixel_canvas() {
        let quad = Quad::new(
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 0.0),
        );
        let transform = PiranesiTransform::new(quad, 1, 1, SolverTunables::default()).unwrap();
        let source = RgbaImage::from_pixel(4, 4, COLOR);
        let output = warp(&source, &transform, DEFAULT_GRID_SIZE).unwrap();
        assert_eq!(*output.get_pixel(0, 0), COLOR);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let transform =
            PiranesiTransform::new(Quad::default(), 1600, 1600, SolverTunables::default()).unwrap();
        assert!(matches!(
            warp(&RgbaImage::new(0, 10), &transform, DEFAULT_GRID_SIZE),
            Err(PiranesiError::EmptySource { .. })
        ));
        assert!(matches!(
            warp(&RgbaImage::new(4, 4), &transform, 0),
            Err(PiranesiError::InvalidGrid)
        ));
    }
}
