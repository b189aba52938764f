//! Quadrilateral geometry: vanishing points, edge scale factors and
//! point-in-quad testing
//!
//! Corners are read in edge order a→b→c→d→a. The reference layout is
//! bottom-left, bottom-right, top-right, top-left in destination pixels,
//! which places the source image's top row along edge d→c and its bottom
//! row along edge a→b.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PiranesiError, Result};
use crate::geometry::{Line, Point};

/// Smallest enclosed area (in square pixels) accepted for a quadrilateral
pub const MIN_AREA: f64 = 1e-9;

/// Relative cross product below which two edges count as parallel
const PARALLEL_EPSILON: f64 = 1e-12;

/// Four corners in destination pixel space
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Quad {
    pub a: Point,
    pub b: Point,
    pub c: Point,
    pub d: Point,
}

/// Where the extended opposite edges meet
///
/// `None` means the two edges are parallel and the vanishing point is at
/// infinity.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct VanishingPoints {
    /// Intersection of edges b→c and d→a
    pub point_cd: Option<Point>,
    /// Intersection of edges a→b and c→d
    pub point_da: Option<Point>,
}

/// Per-edge foreshortening ratios
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct EdgeScaleFactors {
    pub k_ab: f64,
    pub k_bc: f64,
    pub k_cd: f64,
    pub k_da: f64,
}

impl EdgeScaleFactors {
    /// No foreshortening on any edge
    pub const LINEAR: EdgeScaleFactors = EdgeScaleFactors {
        k_ab: 1.0,
        k_bc: 1.0,
        k_cd: 1.0,
        k_da: 1.0,
    };
}

impl Quad {
    pub fn new(a: Point, b: Point, c: Point, d: Point) -> Self {
        Self { a, b, c, d }
    }

    /// Corners in edge order
    pub fn corners(&self) -> [Point; 4] {
        [self.a, self.b, self.c, self.d]
    }

    /// Signed shoelace area; the sign depends on winding
    pub fn signed_area(&self) -> f64 {
        let pts = self.corners();
        let mut sum = 0.0;
        for i in 0..4 {
            let p = pts[i];
            let q = pts[(i + 1) % 4];
            sum += p.x * q.y - q.x * p.y;
        }
        sum / 2.0
    }

    /// Reject non-finite corners and quads with no enclosed area
    pub fn validate(&self) -> Result<()> {
        for (name, p) in [("a", self.a), ("b", self.b), ("c", self.c), ("d", self.d)] {
            if !p.is_finite() {
                return Err(PiranesiError::InvalidCorner { name, x: p.x, y: p.y });
            }
        }

        let area = self.signed_area().abs();
        if area < MIN_AREA {
            return Err(PiranesiError::DegenerateQuad { area });
        }
        Ok(())
    }

    /// Vanishing points of both pairs of opposite edges
    pub fn vanishing_points(&self) -> VanishingPoints {
        let Quad { a, b, c, d } = *self;

        let line_ab = Line::through(a, b);
        let line_bc = Line::through(b, c);
        let line_cd = Line::through(c, d);
        let line_da = Line::through(d, a);

        let point_cd = if parallel(b, c, d, a) {
            None
        } else {
            Some(line_bc.intersect(&line_da))
        };
        let point_da = if parallel(a, b, c, d) {
            None
        } else {
            Some(line_ab.intersect(&line_cd))
        };

        VanishingPoints { point_cd, point_da }
    }

    /// Derive the vanishing points and the four edge scale factors
    ///
    /// A pair of parallel edges has its vanishing point at infinity, where
    /// the distance ratio tends to 1 and the edges interpolate linearly.
    pub fn solve(&self) -> (VanishingPoints, EdgeScaleFactors) {
        let Quad { a, b, c, d } = *self;
        let vanishing = self.vanishing_points();

        let (k_ab, k_cd) = match vanishing.point_da {
            Some(vp) => (distance_ratio(vp, b, a), distance_ratio(vp, c, d)),
            None => (1.0, 1.0),
        };
        let (k_bc, k_da) = match vanishing.point_cd {
            Some(vp) => (distance_ratio(vp, b, c), distance_ratio(vp, a, d)),
            None => (1.0, 1.0),
        };

        let factors = EdgeScaleFactors {
            k_ab,
            k_bc,
            k_cd,
            k_da,
        };
        debug!(?vanishing, ?factors, "Solved quadrilateral");

        (vanishing, factors)
    }

    /// Even-odd ray cast of a destination pixel against the quad
    ///
    /// Pixel and corners are first normalised by the canvas size. Each edge
    /// is half-open in y, so horizontal edges never count and a vertex is
    /// inside only when the edges leaving it downward straddle the point.
    /// For an axis-aligned quad this makes the top and left sides inclusive
    /// and the bottom and right sides exclusive.
    pub fn contains_pixel(&self, pixel: Point, width: u32, height: u32) -> bool {
        let p = pixel.normalize(width, height);
        let quad = self.corners().map(|c| c.normalize(width, height));

        let mut inside = false;
        let mut j = quad.len() - 1;
        for i in 0..quad.len() {
            let (qi, qj) = (quad[i], quad[j]);
            if (qi.y > p.y) != (qj.y > p.y)
                && p.x < (qj.x - qi.x) * (p.y - qi.y) / (qj.y - qi.y) + qi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

impl Default for Quad {
    /// The four corners used when nothing else is configured
    fn default() -> Self {
        Self {
            a: Point::new(80.0, 990.0),   // Bottom-left
            b: Point::new(1400.0, 1350.0), // Bottom-right
            c: Point::new(1560.0, 250.0), // Top-right
            d: Point::new(40.0, 510.0),   // Top-left
        }
    }
}

/// `|vp - near| / |vp - far|`, or 1 when that is not a usable scale factor
fn distance_ratio(vp: Point, near: Point, far: Point) -> f64 {
    let k = vp.distance(near) / vp.distance(far);
    if k.is_finite() && k > 0.0 {
        k
    } else {
        warn!("Unusable scale factor {} from vanishing point {:?}, using 1", k, vp);
        1.0
    }
}

/// Whether segment p0→p1 is parallel to segment q0→q1
fn parallel(p0: Point, p1: Point, q0: Point, q1: Point) -> bool {
    let u = p1 - p0;
    let v = q1 - q0;
    let cross = u.x * v.y - u.y * v.x;
    let scale = (u.x * u.x + u.y * u.y).sqrt() * (v.x * v.x + v.y * v.y).sqrt();
    cross.abs() <= PARALLEL_EPSILON * scale
}
