//! De-normalization correction models.
//!
//! Convolving a density that is normalized over its ROI with a measurement
//! error kernel pushes some probability across the ROI boundary. How much
//! depends on the kernel width, so for each normalized axis we measure the
//! leakage for a sweep of widths and keep an interpolant `sigma -> Δp`.
//! At evaluation time the model density of a star is multiplied by
//! `1 / (1 + Δp)` for its residual error width.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::grid::density::Grid;
use crate::math::{CubicSpline, Kernel};

/// Number of trial kernel widths in a correction sweep.
pub const CORRECTION_SAMPLES: usize = 9;

/// Narrowest trial kernel, in grid steps.
pub const MIN_TRIAL_SIGMA: f64 = 0.5;

/// Interpolant from kernel standard deviation (observable units) to the
/// fractional change of mass inside the normalization region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CorrectionKnots", into = "CorrectionKnots")]
pub struct CorrectionModel {
    spline: CubicSpline,
}

/// Serialized form: just the sampled pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionKnots {
    pub sigma: Vec<f64>,
    pub delta_p: Vec<f64>,
}

impl CorrectionModel {
    pub fn new(sigma: Vec<f64>, delta_p: Vec<f64>) -> Result<Self, AppError> {
        Ok(Self {
            spline: CubicSpline::new(sigma, delta_p)?,
        })
    }

    /// Leakage at `sigma`; linear past either end of the sampled widths.
    pub fn delta_p(&self, sigma: f64) -> f64 {
        self.spline.eval(sigma)
    }

    /// Multiplicative re-normalization for a kernel of width `sigma`.
    pub fn factor(&self, sigma: f64) -> f64 {
        1.0 / (1.0 + self.delta_p(sigma))
    }

    pub fn sigma(&self) -> &[f64] {
        self.spline.knots_x()
    }

    pub fn samples(&self) -> &[f64] {
        self.spline.knots_y()
    }
}

impl TryFrom<CorrectionKnots> for CorrectionModel {
    type Error = AppError;

    fn try_from(k: CorrectionKnots) -> Result<Self, Self::Error> {
        Self::new(k.sigma, k.delta_p)
    }
}

impl From<CorrectionModel> for CorrectionKnots {
    fn from(m: CorrectionModel) -> Self {
        Self {
            sigma: m.sigma().to_vec(),
            delta_p: m.samples().to_vec(),
        }
    }
}

/// Leakage below this is indistinguishable from round-off.
fn noise_floor() -> f64 {
    10f64.powf(-(f64::DIGITS as f64) / 2.0)
}

/// `n` evenly spaced widths from [`MIN_TRIAL_SIGMA`] to `max`.
fn trial_widths(max: f64, n: usize) -> Vec<f64> {
    let h = (max - MIN_TRIAL_SIGMA) / (n as f64 - 1.0);
    (0..n).map(|i| MIN_TRIAL_SIGMA + h * i as f64).collect()
}

impl Grid {
    /// Fit a correction model for every normalized axis.
    ///
    /// Works on a copy: non-normalized axes are marginalized out and the rest
    /// renormalized, then each normalized axis is convolved with kernels of
    /// increasing width (`conv_err` is the widest, in grid steps) for as long
    /// as the kernel still fits around the ROI. The returned vector has one
    /// entry per axis; non-normalized axes and axes whose leakage is at the
    /// round-off level get `None`.
    pub fn fit_correction(&self, nsig: f64, conv_err: f64) -> Result<Vec<Option<CorrectionModel>>, AppError> {
        if !(conv_err.is_finite() && conv_err > MIN_TRIAL_SIGMA) {
            return Err(AppError::invalid(format!(
                "Widest trial kernel must exceed {MIN_TRIAL_SIGMA} steps, got {conv_err}."
            )));
        }

        let mut work = self.clone();
        for axis in (0..self.dim()).rev() {
            if !self.axes()[axis].is_normalized() {
                work = work.marginalize(axis)?;
            }
        }
        let work = work.normalize()?;

        let normalized: Vec<usize> = (0..self.dim())
            .filter(|&a| self.axes()[a].is_normalized())
            .collect();
        let widths = trial_widths(conv_err, CORRECTION_SAMPLES);

        let mut out = vec![None; self.dim()];
        for (work_axis, &axis) in normalized.iter().enumerate() {
            out[axis] = fit_axis(&work, work_axis, &widths, nsig).map_err(|e| e.context(format!("axis {axis}")))?;
        }
        Ok(out)
    }

    /// Fit and attach correction models, consuming the grid.
    pub fn with_fitted_corrections(mut self, nsig: f64, conv_err: f64) -> Result<Self, AppError> {
        let models = self.fit_correction(nsig, conv_err)?;
        for (axis, model) in models.into_iter().enumerate() {
            self.set_correction(axis, model)?;
        }
        Ok(self)
    }

    /// Normalize over the ROI, then fit and attach correction models.
    pub fn prepare(self, nsig: f64, conv_err: f64) -> Result<Self, AppError> {
        self.normalize()?.with_fitted_corrections(nsig, conv_err)
    }
}

fn fit_axis(work: &Grid, axis: usize, widths: &[f64], nsig: f64) -> Result<Option<CorrectionModel>, AppError> {
    let step = work.axis(axis)?.step();
    let mut sigma = Vec::with_capacity(widths.len());
    let mut delta_p = Vec::with_capacity(widths.len());

    for &s in widths {
        let kernel = Kernel::new(s, nsig, 1)?;
        if !work.check_fits(axis, &kernel) {
            log::warn!(
                "correction sweep stopped at {s:.2} steps: kernel half-width {} leaves the grid",
                kernel.half_width()
            );
            break;
        }
        let mass = work
            .clone()
            .convolve(axis, &kernel, 1)?
            .integrate_region_of_normalization()?;
        log::debug!("  sigma={:.6} dP={:+.3e}", s * step, mass - 1.0);
        sigma.push(s * step);
        delta_p.push(mass - 1.0);
    }

    if sigma.len() < 2 {
        log::warn!("too few kernels fit to model leakage ({} of {})", sigma.len(), widths.len());
        return Ok(None);
    }

    let peak = delta_p.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if peak < noise_floor() {
        log::info!("leakage {peak:.1e} is at round-off level; no correction");
        return Ok(None);
    }

    CorrectionModel::new(sigma, delta_p).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::density::GridAxis;
    use approx::assert_abs_diff_eq;

    /// Flat density filling the ROI exactly, so every kernel leaks mass.
    fn flat_box() -> Grid {
        let axis = GridAxis::linspace(0.0, 40.0, 41, [10.0, 30.0], true).unwrap();
        let values = axis
            .obs()
            .iter()
            .map(|&x| if (10.0..=30.0).contains(&x) { 1.0 } else { 0.0 })
            .collect();
        Grid::from_vec(values, vec![axis]).unwrap()
    }

    #[test]
    fn box_density_leaks_more_with_wider_kernels() {
        let models = flat_box().fit_correction(3.0, 3.0).unwrap();
        let model = models[0].as_ref().expect("leakage should be measurable");
        assert_eq!(model.sigma().len(), CORRECTION_SAMPLES);
        let dp = model.samples();
        assert!(dp.iter().all(|v| *v < 0.0));
        assert!(dp.windows(2).all(|w| w[1] < w[0]), "{dp:?}");
        assert!(model.factor(2.0) > 1.0);
    }

    #[test]
    fn sweep_stops_when_kernels_leave_the_grid() {
        // conv_err = 6 steps with nsig = 3 needs 18 steps of margin; only 10 exist.
        let models = flat_box().fit_correction(3.0, 6.0).unwrap();
        let model = models[0].as_ref().unwrap();
        assert!(model.sigma().len() < CORRECTION_SAMPLES);
        assert!(model.sigma().iter().all(|s| 3.0 * s <= 10.0));
    }

    #[test]
    fn interior_density_gets_no_correction() {
        let axis = GridAxis::linspace(0.0, 100.0, 101, [20.0, 80.0], true).unwrap();
        let values = axis
            .obs()
            .iter()
            .map(|x| (-0.5 * ((x - 50.0) / 2.0).powi(2)).exp())
            .collect();
        let g = Grid::from_vec(values, vec![axis]).unwrap();
        let models = g.fit_correction(4.0, 3.0).unwrap();
        assert!(models[0].is_none());
    }

    #[test]
    fn non_normalized_axes_are_skipped() {
        let a0 = GridAxis::linspace(0.0, 40.0, 41, [10.0, 30.0], true).unwrap();
        let a1 = GridAxis::linspace(0.0, 10.0, 11, [0.0, 10.0], false).unwrap();
        let mut values = Vec::new();
        for x in a0.obs() {
            for _ in a1.obs() {
                values.push(if (10.0..=30.0).contains(x) { 1.0 } else { 0.0 });
            }
        }
        let g = Grid::from_vec(values, vec![a0, a1]).unwrap();
        let g = g.with_fitted_corrections(3.0, 3.0).unwrap();
        assert!(g.axes()[0].correction().is_some());
        assert!(g.axes()[1].correction().is_none());
    }

    #[test]
    fn correction_knots_round_trip_through_json() {
        let model = CorrectionModel::new(vec![0.5, 1.0, 1.5], vec![-0.01, -0.03, -0.06]).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("delta_p"));
        let back: CorrectionModel = serde_json::from_str(&json).unwrap();
        assert_abs_diff_eq!(back.delta_p(2.0), model.delta_p(2.0), epsilon = 1e-15);
        // Past the last sample the chord of the last two samples is followed.
        assert_abs_diff_eq!(model.delta_p(2.0), -0.09, epsilon = 1e-12);
    }
}
