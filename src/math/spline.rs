//! Natural cubic spline through a handful of samples, with linear
//! extrapolation outside the sampled range.
//!
//! The correction models are fit from a few (sigma, Δp) pairs and then
//! queried at arbitrary residual widths, often past the largest sampled sigma.
//! A cubic extrapolated far outside its knots runs away quickly, so outside
//! `[x_0, x_k]` we continue along the chord of the two outermost samples.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivatives at the knots (zero at both ends).
    m: Vec<f64>,
}

impl CubicSpline {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, AppError> {
        let k = x.len();
        if k < 2 {
            return Err(AppError::invalid("Spline requires at least 2 knots."));
        }
        if y.len() != k {
            return Err(AppError::invalid(format!(
                "Spline knot length mismatch: x has {k}, y has {}.",
                y.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(AppError::invalid("Spline knots must be finite."));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AppError::invalid("Spline abscissae must be strictly increasing."));
        }

        let m = second_derivatives(&x, &y)?;
        Ok(Self { x, y, m })
    }

    pub fn knots_x(&self) -> &[f64] {
        &self.x
    }

    pub fn knots_y(&self) -> &[f64] {
        &self.y
    }

    pub fn eval(&self, t: f64) -> f64 {
        let k = self.x.len();
        if t <= self.x[0] {
            return chord(self.x[0], self.y[0], self.x[1], self.y[1], t);
        }
        if t >= self.x[k - 1] {
            return chord(self.x[k - 2], self.y[k - 2], self.x[k - 1], self.y[k - 1], t);
        }

        let i = match self.x.partition_point(|&v| v <= t) {
            0 => 0,
            p => (p - 1).min(k - 2),
        };
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;
        let a = x1 - t;
        let b = t - x0;

        m0 * a * a * a / (6.0 * h)
            + m1 * b * b * b / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }
}

fn chord(x0: f64, y0: f64, x1: f64, y1: f64, t: f64) -> f64 {
    y1 + (t - x1) * (y1 - y0) / (x1 - x0)
}

fn second_derivatives(x: &[f64], y: &[f64]) -> Result<Vec<f64>, AppError> {
    let k = x.len();
    let mut a = DMatrix::<f64>::zeros(k, k);
    let mut rhs = DVector::<f64>::zeros(k);

    // Natural end conditions.
    a[(0, 0)] = 1.0;
    a[(k - 1, k - 1)] = 1.0;

    for i in 1..k - 1 {
        let h0 = x[i] - x[i - 1];
        let h1 = x[i + 1] - x[i];
        a[(i, i - 1)] = h0;
        a[(i, i)] = 2.0 * (h0 + h1);
        a[(i, i + 1)] = h1;
        rhs[i] = 6.0 * ((y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0);
    }

    let m = a
        .lu()
        .solve(&rhs)
        .ok_or_else(|| AppError::degenerate("Spline system is singular."))?;
    Ok(m.iter().copied().collect())
}
