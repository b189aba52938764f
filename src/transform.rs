//! Piranesi perspective mapping
//!
//! This module implements the forward mapping from the unit square onto a
//! quadrilateral and its numerical inverse. Unlike a homography, positions
//! along each edge follow a geometric progression `(k^t - 1) / (k - 1)`
//! driven by the edge's scale factor `k`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::{PiranesiError, Result};
use crate::geometry::{Line, Point};
use crate::quad::{EdgeScaleFactors, Quad, VanishingPoints};

/// Tunables for the inverse solver
///
/// The defaults are empirical; changing them changes the rendered output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SolverTunables {
    /// Finite-difference step in unit-square coordinates
    pub step: f64,
    /// Divisor applied to each correction step
    pub damping: f64,
    /// Iteration cap per solve
    pub max_iterations: u32,
    /// Per-axis movement below which the solve stops
    pub tolerance: f64,
    /// Derivative magnitude below which the solve gives up
    pub min_delta: f64,
}

impl Default for SolverTunables {
    fn default() -> Self {
        Self {
            step: 0.001,
            damping: 2.0,
            max_iterations: 11,
            tolerance: 1e-7,
            min_delta: 1e-10,
        }
    }
}

impl SolverTunables {
    pub fn validate(&self) -> Result<()> {
        let positive = [("step", self.step), ("damping", self.damping)];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PiranesiError::InvalidTunable { name, value });
            }
        }

        let non_negative = [("tolerance", self.tolerance), ("min_delta", self.min_delta)];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PiranesiError::InvalidTunable { name, value });
            }
        }

        if self.max_iterations == 0 {
            return Err(PiranesiError::InvalidTunable {
                name: "max_iterations",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Outcome of a single inverse solve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InverseStats {
    /// Correction steps taken
    pub iterations: u32,
    /// Whether the movement tolerance was reached
    pub converged: bool,
}

/// Position along an edge for parameter `t` and scale factor `k`
///
/// `k == 1` is the linear limit. Elsewhere this is `(k^t - 1) / (k - 1)`,
/// evaluated with `exp_m1` so that factors close to 1 stay accurate.
#[inline]
pub fn edge_position(t: f64, k: f64) -> f64 {
    if k == 1.0 {
        return t;
    }
    (t * (k - 1.0).ln_1p()).exp_m1() / (k - 1.0)
}

/// Piranesi mapping between the unit square and a quadrilateral on a canvas
#[derive(Debug, Clone)]
pub struct PiranesiTransform {
    quad: Quad,
    vanishing: VanishingPoints,
    factors: EdgeScaleFactors,
    /// Destination canvas dimensions
    width: u32,
    height: u32,
    tunables: SolverTunables,
}

impl PiranesiTransform {
    /// Create a transform from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.quad(),
            config.canvas.width,
            config.canvas.height,
            config.solver,
        )
    }

    /// Validate the inputs and solve the quadrilateral once
    pub fn new(quad: Quad, width: u32, height: u32, tunables: SolverTunables) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PiranesiError::InvalidCanvas { width, height });
        }
        quad.validate()?;
        tunables.validate()?;

        let (vanishing, factors) = quad.solve();
        if quad.signed_area() < 0.0 {
            debug!("Quadrilateral corners wind counter-clockwise in pixel space");
        }

        Ok(Self {
            quad,
            vanishing,
            factors,
            width,
            height,
            tunables,
        })
    }

    pub fn quad(&self) -> &Quad {
        &self.quad
    }

    pub fn vanishing_points(&self) -> &VanishingPoints {
        &self.vanishing
    }

    pub fn factors(&self) -> &EdgeScaleFactors {
        &self.factors
    }

    pub fn tunables(&self) -> &SolverTunables {
        &self.tunables
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Map a unit-square point to destination pixel coordinates
    ///
    /// `y = 0` runs along edge d→c and `y = 1` along edge a→b; `x = 0` runs
    /// along d→a and `x = 1` along c→b.
    pub fn forward(&self, unit: Point) -> Point {
        let Quad { a, b, c, d } = self.quad;
        let k = &self.factors;

        let x_ab = edge_position(unit.x, k.k_ab);
        let x_cd = edge_position(unit.x, k.k_cd);
        let y_bc = edge_position(unit.y, k.k_bc);
        let y_da = edge_position(unit.y, k.k_da);

        let point_x_ab = a + (b - a) * x_ab;
        let point_x_cd = d + (c - d) * x_cd;
        let point_y_bc = c + (b - c) * y_bc;
        let point_y_da = d + (a - d) * y_da;

        let line_x = Line::through(point_x_ab, point_x_cd);
        let line_y = Line::through(point_y_bc, point_y_da);
        line_x.intersect(&line_y)
    }

    /// Map a destination pixel back to the unit square
    pub fn inverse(&self, pixel: Point) -> Point {
        self.inverse_with_stats(pixel).0
    }

    /// Inverse mapping that also reports how the solve ended
    ///
    /// Each axis is corrected independently from a forward finite
    /// difference, scaled down by the damping factor and clamped to the
    /// unit square. The last guess is returned whether or not it converged.
    pub fn inverse_with_stats(&self, pixel: Point) -> (Point, InverseStats) {
        let t = &self.tunables;
        let target = pixel.normalize(self.width, self.height);

        let mut guess = Point::new(0.5, 0.5);
        let mut last = guess;

        for i in 0..t.max_iterations {
            let r0 = self.forward_normalized(guess);
            let r1 = self.forward_normalized(Point::new(guess.x + t.step, guess.y));
            let r2 = self.forward_normalized(Point::new(guess.x, guess.y + t.step));

            let dx = r1.x - r0.x;
            let dy = r2.y - r0.y;
            if dx.abs() < t.min_delta || dy.abs() < t.min_delta {
                return (
                    guess,
                    InverseStats {
                        iterations: i,
                        converged: false,
                    },
                );
            }

            let x_mult = (target.x - r0.x) / dx;
            let y_mult = (target.y - r0.y) / dy;

            guess = Point::new(
                (guess.x + x_mult * t.step / t.damping).clamp(0.0, 1.0),
                (guess.y + y_mult * t.step / t.damping).clamp(0.0, 1.0),
            );

            if (guess.x - last.x).abs() < t.tolerance && (guess.y - last.y).abs() < t.tolerance {
                return (
                    guess,
                    InverseStats {
                        iterations: i + 1,
                        converged: true,
                    },
                );
            }
            last = guess;
        }

        (
            guess,
            InverseStats {
                iterations: t.max_iterations,
                converged: false,
            },
        )
    }

    #[inline]
    fn forward_normalized(&self, unit: Point) -> Point {
        self.forward(unit).normalize(self.width, self.height)
    }
}
