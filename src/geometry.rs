//! 2D points and slope/intercept lines
//!
//! These are the primitives the quadrilateral solver and the forward mapper
//! are built from. Lines use the `y = a*x + b` form, so vertical lines are
//! approximated with a tiny run instead of being represented exactly.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Run substituted for a vertical direction vector in [`Line::through`]
pub const VERTICAL_DX: f64 = 1e-11;

/// Point returned by [`Line::intersect`] when the lines are parallel
pub const PARALLEL_FALLBACK: Point = Point { x: 0.5, y: 0.5 };

/// A 2D point, either in destination pixels or in the unit square
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Scale a vector by a factor
    #[inline]
    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Divide by canvas dimensions to get a point in [0,1] space
    #[inline]
    pub fn normalize(self, width: u32, height: u32) -> Self {
        Self::new(self.x / width as f64, self.y / height as f64)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;

    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    #[inline]
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    #[inline]
    fn mul(self, rhs: f64) -> Point {
        self.scale(rhs)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// An infinite line `y = a*x + b`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    /// Slope
    pub a: f64,
    /// Intercept
    pub b: f64,
}

impl Line {
    /// Line through two points
    ///
    /// A zero run is replaced by [`VERTICAL_DX`], giving a very steep but
    /// finite slope.
    pub fn through(p0: Point, p1: Point) -> Self {
        let mut vector = p1 - p0;
        if vector.x == 0.0 {
            vector.x = VERTICAL_DX;
        }

        let a = vector.y / vector.x;
        let b = p0.y - p0.x * a;
        Self { a, b }
    }

    /// Intersection with another line, or [`PARALLEL_FALLBACK`] when the
    /// slopes are identical
    pub fn intersect(&self, other: &Line) -> Point {
        if self.a == other.a {
            return PARALLEL_FALLBACK;
        }

        let x = (other.b - self.b) / (self.a - other.a);
        // Evaluate y on the flatter line; a near-vertical one amplifies the
        // rounding in x by its slope
        let flat = if self.a.abs() <= other.a.abs() { self } else { other };
        let y = flat.a * x + flat.b;
        Point::new(x, y)
    }

    /// Whether two lines hit the parallel fallback in [`Line::intersect`]
    pub fn is_parallel(&self, other: &Line) -> bool {
        self.a == other.a
    }
}
