//! Probability densities on evenly spaced grids of observables.
//!
//! All integration here (marginalization, convolution, normalization) treats
//! grid steps as unit length, so the array holds *mass per cell* rather than
//! a physical density. [`Grid::density_value`] is the only way out of that
//! representation and returns a separate [`PhysicalDensity`] type, which has
//! no grid operations on it.
//!
//! Operations that change the array consume the grid and hand back a new one.
//! Anything that must survive (a prepared model grid shared by all stars, say)
//! is cloned explicitly by the caller before a destructive sequence.

use ndarray::{Array1, ArrayD, ArrayView1, Axis, IxDyn, Zip};

use crate::error::AppError;
use crate::grid::correction::CorrectionModel;
use crate::math::Kernel;

/// Largest supported rank.
pub const MAX_DIM: usize = 4;

/// Relative tolerance on coordinate spacing.
const SPACING_RTOL: f64 = 1e-6;

/// Slack (in steps) when comparing coordinates against region bounds.
const EDGE_TOL: f64 = 1e-9;

/// One dimension of a grid.
///
/// Coordinates, step, region of interest, normalization flag and correction
/// model live together so that removing an axis removes all of them at once.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAxis {
    obs: Vec<f64>,
    step: f64,
    roi: [f64; 2],
    /// `true`: normalized over the ROI. `false`: normalized over the whole
    /// line, and the ROI only marks where boundary mass is collected.
    norm: bool,
    correction: Option<CorrectionModel>,
}

impl GridAxis {
    pub fn new(obs: Vec<f64>, roi: [f64; 2], norm: bool) -> Result<Self, AppError> {
        let len = obs.len();
        if len < 2 {
            return Err(AppError::invalid(format!(
                "Grid axis needs at least 2 coordinates, got {len}."
            )));
        }
        if obs.iter().any(|v| !v.is_finite()) {
            return Err(AppError::invalid("Grid coordinates must be finite."));
        }
        let step = (obs[len - 1] - obs[0]) / (len as f64 - 1.0);
        if !(step > 0.0) {
            return Err(AppError::invalid(format!(
                "Grid coordinates must be strictly increasing (step={step})."
            )));
        }
        for (i, pair) in obs.windows(2).enumerate() {
            let d = pair[1] - pair[0];
            if (d - step).abs() > SPACING_RTOL * step {
                return Err(AppError::invalid(format!(
                    "Grid coordinates are not evenly spaced at index {i}: spacing {d} vs step {step}."
                )));
            }
        }
        if roi[0].is_nan() || roi[1].is_nan() || roi[0] > roi[1] {
            return Err(AppError::invalid(format!(
                "Invalid region of interest [{}, {}].",
                roi[0], roi[1]
            )));
        }

        Ok(Self {
            obs,
            step,
            roi,
            norm,
            correction: None,
        })
    }

    /// `n` evenly spaced coordinates from `lo` to `hi` inclusive.
    pub fn linspace(lo: f64, hi: f64, n: usize, roi: [f64; 2], norm: bool) -> Result<Self, AppError> {
        if n < 2 {
            return Err(AppError::invalid("Grid axis needs at least 2 coordinates."));
        }
        let h = (hi - lo) / (n as f64 - 1.0);
        let obs = (0..n).map(|i| lo + h * i as f64).collect();
        Self::new(obs, roi, norm)
    }

    pub fn obs(&self) -> &[f64] {
        &self.obs
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn roi(&self) -> [f64; 2] {
        self.roi
    }

    pub fn is_normalized(&self) -> bool {
        self.norm
    }

    pub fn correction(&self) -> Option<&CorrectionModel> {
        self.correction.as_ref()
    }

    pub fn len(&self) -> usize {
        self.obs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obs.is_empty()
    }

    /// Indices of the first and last coordinates inside `[lo, hi]`.
    fn span(&self, lo: f64, hi: f64) -> Option<(usize, usize)> {
        let tol = EDGE_TOL * self.step;
        let inside = |x: f64| x >= lo - tol && x <= hi + tol;
        let first = self.obs.iter().position(|&x| inside(x))?;
        let last = self.obs.iter().rposition(|&x| inside(x))?;
        Some((first, last))
    }

    /// Trapezoid weights for `[lo, hi]`: 1 inside, ½ on the two outermost
    /// points inside, 0 outside.
    fn region_weights(&self, lo: f64, hi: f64) -> Array1<f64> {
        let mut w = Array1::<f64>::zeros(self.obs.len());
        if let Some((first, last)) = self.span(lo, hi) {
            w.slice_mut(ndarray::s![first..=last]).fill(1.0);
            w[first] = 0.5;
            w[last] = 0.5;
        }
        w
    }
}

/// Density (as mass per unit-step cell) on an n-dimensional grid.
#[derive(Debug, Clone)]
pub struct Grid {
    dens: ArrayD<f64>,
    axes: Vec<GridAxis>,
    /// Product of the steps of axes already collapsed by point evaluation.
    evaluated_step: f64,
    age: f64,
    metallicity: f64,
}

impl Grid {
    pub fn new(dens: ArrayD<f64>, axes: Vec<GridAxis>) -> Result<Self, AppError> {
        if axes.is_empty() || axes.len() > MAX_DIM {
            return Err(AppError::invalid(format!(
                "Grids must have 1 to {MAX_DIM} dimensions, got {}.",
                axes.len()
            )));
        }
        if dens.ndim() != axes.len() {
            return Err(AppError::invalid(format!(
                "Density rank {} does not match {} coordinate axes.",
                dens.ndim(),
                axes.len()
            )));
        }
        for (i, (len, ax)) in dens.shape().iter().zip(axes.iter()).enumerate() {
            if *len != ax.len() {
                return Err(AppError::invalid(format!(
                    "Axis {i}: density has {len} points but {} coordinates.",
                    ax.len()
                )));
            }
        }
        if dens.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(AppError::invalid("Density values must be finite and non-negative."));
        }

        Ok(Self {
            dens,
            axes,
            evaluated_step: 1.0,
            age: f64::NAN,
            metallicity: f64::NAN,
        })
    }

    /// Build from row-major values.
    pub fn from_vec(values: Vec<f64>, axes: Vec<GridAxis>) -> Result<Self, AppError> {
        let shape: Vec<usize> = axes.iter().map(GridAxis::len).collect();
        let dens = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| AppError::invalid(format!("Density values do not match grid shape {shape:?}: {e}")))?;
        Self::new(dens, axes)
    }

    pub fn with_provenance(mut self, age: f64, metallicity: f64) -> Self {
        self.age = age;
        self.metallicity = metallicity;
        self
    }

    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    pub fn shape(&self) -> &[usize] {
        self.dens.shape()
    }

    pub fn dens(&self) -> &ArrayD<f64> {
        &self.dens
    }

    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    pub fn axis(&self, axis: usize) -> Result<&GridAxis, AppError> {
        self.axes.get(axis).ok_or_else(|| {
            AppError::invalid(format!("Axis {axis} out of range for a {}-dimensional grid.", self.dim()))
        })
    }

    pub fn age(&self) -> f64 {
        self.age
    }

    pub fn metallicity(&self) -> f64 {
        self.metallicity
    }

    /// Product of all steps, including those of point-evaluated axes.
    pub fn step_product(&self) -> f64 {
        self.axes.iter().map(GridAxis::step).product::<f64>() * self.evaluated_step
    }

    /// Mass left after every axis has been collapsed.
    pub fn scalar(&self) -> Option<f64> {
        if self.dim() == 0 { self.dens.first().copied() } else { None }
    }

    pub fn set_correction(&mut self, axis: usize, correction: Option<CorrectionModel>) -> Result<(), AppError> {
        self.axis(axis)?;
        self.axes[axis].correction = correction;
        Ok(())
    }

    /// Whether `kernel`, centered anywhere inside the ROI of `axis`, stays
    /// within the array.
    ///
    /// Only coordinates inside the closed ROI count as centers. An axis with
    /// no coordinates in its ROI never fits.
    pub fn check_fits(&self, axis: usize, kernel: &Kernel) -> bool {
        let Some(ax) = self.axes.get(axis) else {
            return false;
        };
        let [lo, hi] = ax.roi;
        let n = kernel.half_width();
        match ax.span(lo, hi) {
            Some((first, last)) => first >= n && ax.len() - 1 - last >= n,
            None => false,
        }
    }

    /// Convolve along `axis`, then keep every `downsample`-th point.
    ///
    /// `kernel.half_width()` points are dropped from each end rather than
    /// padded, so mass near those edges is lost. Call [`Grid::check_fits`]
    /// first when the ROI must be unaffected.
    pub fn convolve(mut self, axis: usize, kernel: &Kernel, downsample: usize) -> Result<Self, AppError> {
        self.axis(axis)?;
        if downsample == 0 {
            return Err(AppError::invalid("Downsample factor must be >= 1."));
        }
        let n = kernel.half_width();
        if n % downsample != 0 {
            return Err(AppError::invalid(format!(
                "Kernel half-width {n} is not a multiple of downsample factor {downsample}."
            )));
        }

        let len = self.axes[axis].len();
        let n_out = (len / downsample)
            .checked_sub(2 * (n / downsample))
            .filter(|&m| m > 0)
            .ok_or_else(|| {
                AppError::support(format!(
                    "Kernel half-width {n} leaves no points on axis {axis} of length {len} (sigma {} steps).",
                    kernel.sigma()
                ))
            })?;

        let mut shape = self.dens.shape().to_vec();
        shape[axis] = n_out;
        let mut out = ArrayD::<f64>::zeros(IxDyn(&shape));
        let weights = kernel.weights();

        Zip::from(out.lanes_mut(Axis(axis)))
            .and(self.dens.lanes(Axis(axis)))
            .for_each(|mut dst, src| {
                for m in 0..n_out {
                    let start = m * downsample;
                    dst[m] = weights
                        .iter()
                        .enumerate()
                        .map(|(j, w)| w * src[start + j])
                        .sum();
                }
            });

        let ax = &mut self.axes[axis];
        ax.obs = (0..n_out).map(|m| ax.obs[n + m * downsample]).collect();
        ax.step *= downsample as f64;
        self.dens = out;
        Ok(self)
    }

    /// Integrate over `[lo, hi]` along `axis` with the trapezoid weights of
    /// [`GridAxis`], removing the axis.
    pub fn integrate(self, region: [f64; 2], axis: usize) -> Result<Self, AppError> {
        let w = self.axis(axis)?.region_weights(region[0], region[1]);
        Ok(self.collapse(axis, |lane| lane.dot(&w)))
    }

    pub fn marginalize(self, axis: usize) -> Result<Self, AppError> {
        self.integrate([f64::NEG_INFINITY, f64::INFINITY], axis)
    }

    /// Collect all mass at or below the ROI's lower bound into one value.
    pub fn integrate_lower(self, axis: usize) -> Result<Self, AppError> {
        let lo = self.axis(axis)?.roi[0];
        self.integrate([f64::NEG_INFINITY, lo], axis)
    }

    /// Collect all mass at or above the ROI's upper bound into one value.
    pub fn integrate_upper(self, axis: usize) -> Result<Self, AppError> {
        let hi = self.axis(axis)?.roi[1];
        self.integrate([hi, f64::INFINITY], axis)
    }

    /// Total mass over the normalization region: the ROI on normalized axes,
    /// the whole axis elsewhere. The grid itself is left untouched.
    pub fn integrate_region_of_normalization(&self) -> Result<f64, AppError> {
        let mut g = self.clone();
        while g.dim() > 0 {
            let last = g.dim() - 1;
            let ax = &g.axes[last];
            let region = if ax.norm {
                ax.roi
            } else {
                [f64::NEG_INFINITY, f64::INFINITY]
            };
            g = g.integrate(region, last)?;
        }
        g.scalar()
            .ok_or_else(|| AppError::degenerate("Integration left no scalar mass."))
    }

    pub fn normalize(mut self) -> Result<Self, AppError> {
        let mass = self.integrate_region_of_normalization()?;
        if !(mass.is_finite() && mass > 0.0) {
            return Err(AppError::degenerate(format!(
                "Cannot normalize: mass over the normalization region is {mass}."
            )));
        }
        self.dens.mapv_inplace(|v| v / mass);
        Ok(self)
    }

    /// Integrate the density against a Gaussian of standard deviation `sigma`
    /// (observable units) centered at `point`, removing `axis`.
    ///
    /// Kernels narrower than half a step are under-resolved; they are treated
    /// as a delta function and the density is linearly interpolated instead.
    /// Wider kernels are sampled at every coordinate, cut at `nsig` standard
    /// deviations and renormalized. Their support must lie within the axis.
    pub fn evaluate_at_point(self, axis: usize, sigma: f64, nsig: f64, point: f64) -> Result<Self, AppError> {
        let ax = self.axis(axis)?;
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(AppError::invalid(format!("Evaluation sigma must be >= 0, got {sigma}.")));
        }
        if !point.is_finite() {
            return Err(AppError::invalid(format!("Evaluation point must be finite, got {point}.")));
        }

        let obs = ax.obs();
        let step = ax.step;
        let len = obs.len();
        let (lo, hi) = (obs[0], obs[len - 1]);
        let tol = EDGE_TOL * step;

        let mut w = Array1::<f64>::zeros(len);
        if sigma < 0.5 * step {
            if point < lo - tol || point > hi + tol {
                return Err(AppError::support(format!(
                    "Point {point} lies outside axis {axis} extent [{lo}, {hi}]."
                )));
            }
            let i = (((point - lo) / step).floor().max(0.0) as usize).min(len - 2);
            let t = ((point - obs[i]) / step).clamp(0.0, 1.0);
            w[i] = 1.0 - t;
            w[i + 1] = t;
        } else {
            let reach = nsig * sigma;
            if point - reach < lo - tol || point + reach > hi + tol {
                return Err(AppError::support(format!(
                    "Kernel [{}, {}] (sigma {sigma}, {nsig} sigma) exceeds axis {axis} extent [{lo}, {hi}].",
                    point - reach,
                    point + reach
                )));
            }
            for (wi, &x) in w.iter_mut().zip(obs.iter()) {
                let z = (x - point) / sigma;
                if z.abs() <= nsig {
                    *wi = (-0.5 * z * z).exp();
                }
            }
            let total = w.sum();
            if !(total > 0.0) {
                return Err(AppError::degenerate(format!(
                    "Evaluation kernel at {point} has no weight on axis {axis}."
                )));
            }
            w /= total;
        }

        let mut g = self.collapse(axis, |lane| lane.dot(&w));
        g.evaluated_step *= step;
        Ok(g)
    }

    /// Divide out the step product to get a physically scaled density.
    pub fn density_value(self) -> PhysicalDensity {
        debug_assert_eq!(self.dens.ndim(), self.dim());
        let scale = self.step_product();
        PhysicalDensity {
            values: self.dens.mapv(|v| v / scale),
            obs: self.axes.into_iter().map(|a| a.obs).collect(),
        }
    }

    fn collapse<F>(mut self, axis: usize, f: F) -> Self
    where
        F: FnMut(ArrayView1<'_, f64>) -> f64,
    {
        self.dens = self.dens.map_axis(Axis(axis), f);
        self.axes.remove(axis);
        self
    }
}

/// A density in observable units, detached from the grid machinery.
#[derive(Debug, Clone)]
pub struct PhysicalDensity {
    values: ArrayD<f64>,
    obs: Vec<Vec<f64>>,
}

impl PhysicalDensity {
    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn obs(&self) -> &[Vec<f64>] {
        &self.obs
    }

    /// The density at a fully evaluated point.
    pub fn scalar(&self) -> Option<f64> {
        if self.values.ndim() == 0 { self.values.first().copied() } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tent() -> Grid {
        let axis = GridAxis::linspace(0.0, 4.0, 5, [0.0, 4.0], true).unwrap();
        Grid::from_vec(vec![0.0, 1.0, 2.0, 1.0, 0.0], vec![axis]).unwrap()
    }

    fn gaussian_1d(n: usize, center: f64, width: f64, roi: [f64; 2]) -> Grid {
        let axis = GridAxis::linspace(0.0, (n - 1) as f64, n, roi, true).unwrap();
        let values = axis
            .obs()
            .iter()
            .map(|x| (-0.5 * ((x - center) / width).powi(2)).exp())
            .collect();
        Grid::from_vec(values, vec![axis]).unwrap()
    }

    fn box_2d() -> Grid {
        let a0 = GridAxis::linspace(0.0, 20.0, 21, [5.0, 15.0], true).unwrap();
        let a1 = GridAxis::linspace(-1.0, 1.0, 11, [-0.5, 0.5], false).unwrap();
        let mut values = Vec::new();
        for i in 0..21 {
            for j in 0..11 {
                values.push(1.0 + 0.1 * i as f64 + 0.05 * j as f64);
            }
        }
        Grid::from_vec(values, vec![a0, a1]).unwrap()
    }

    /// Straightforward convolution used to check the lane-based one.
    fn brute_force_convolve(src: &[f64], weights: &[f64], ds: usize) -> Vec<f64> {
        let n = (weights.len() - 1) / 2;
        let mut out = Vec::new();
        let mut center = n;
        while center + n < src.len() && out.len() < src.len() / ds - 2 * (n / ds) {
            let mut acc = 0.0;
            for k in 0..weights.len() {
                acc += weights[k] * src[center - n + k];
            }
            out.push(acc);
            center += ds;
        }
        out
    }

    #[test]
    fn tent_normalizes_to_unit_mass() {
        let g = tent().normalize().unwrap();
        let mass = g.clone().integrate([0.0, 4.0], 0).unwrap().scalar().unwrap();
        assert_abs_diff_eq!(mass, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g.integrate_region_of_normalization().unwrap(), 1.0, epsilon = 1e-9);

        let kernel = Kernel::new(1.0, 2.0, 1).unwrap();
        assert_eq!(kernel.half_width(), 2);
        assert!(!g.check_fits(0, &kernel));

        let wide_axis = GridAxis::linspace(0.0, 8.0, 9, [2.0, 6.0], true).unwrap();
        let wide = Grid::from_vec(vec![0.0, 0.0, 0.0, 1.0, 2.0, 1.0, 0.0, 0.0, 0.0], vec![wide_axis]).unwrap();
        assert!(wide.check_fits(0, &kernel));
    }

    #[test]
    fn normalize_measures_on_a_copy() {
        let g = tent();
        let mass = g.integrate_region_of_normalization().unwrap();
        assert_abs_diff_eq!(mass, 4.0, epsilon = 1e-12);
        // Original values are untouched by measuring.
        assert_eq!(g.dens()[[2]], 2.0);
    }

    #[test]
    fn normalized_mixed_grid_integrates_to_one() {
        let g = box_2d().normalize().unwrap();
        assert_abs_diff_eq!(g.integrate_region_of_normalization().unwrap(), 1.0, epsilon = 1e-12);

        // Marginalizing the non-normalized axis, then integrating the ROI of
        // the normalized one gives the same unit mass.
        let roi = g.axes()[0].roi();
        let m = g.marginalize(1).unwrap().integrate(roi, 0).unwrap();
        assert_abs_diff_eq!(m.scalar().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn integrate_uses_half_weights_at_region_edges() {
        let axis = GridAxis::linspace(0.0, 4.0, 5, [1.0, 3.0], true).unwrap();
        let g = Grid::from_vec(vec![10.0, 1.0, 1.0, 1.0, 10.0], vec![axis]).unwrap();
        let m = g.integrate([1.0, 3.0], 0).unwrap().scalar().unwrap();
        assert_abs_diff_eq!(m, 0.5 + 1.0 + 0.5, epsilon = 1e-12);
    }

    #[test]
    fn lower_and_upper_collect_boundary_mass() {
        let axis = GridAxis::linspace(-2.0, 2.0, 5, [0.0, 1.0], false).unwrap();
        let g = Grid::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![axis]).unwrap();
        let lower = g.clone().integrate_lower(0).unwrap().scalar().unwrap();
        let upper = g.integrate_upper(0).unwrap().scalar().unwrap();
        // [-inf, 0]: 1*0.5 + 2 + 3*0.5
        assert_abs_diff_eq!(lower, 4.0, epsilon = 1e-12);
        // [1, inf]: 4*0.5 + 5*0.5
        assert_abs_diff_eq!(upper, 4.5, epsilon = 1e-12);
    }

    #[test]
    fn axis_removal_keeps_axes_and_rank_in_step() {
        let g = box_2d();
        assert_eq!(g.dim(), 2);
        let g = g.marginalize(0).unwrap();
        assert_eq!(g.dim(), 1);
        assert_eq!(g.shape(), &[11]);
        assert!(!g.axes()[0].is_normalized());
        let g = g.marginalize(0).unwrap();
        assert_eq!(g.dim(), 0);
        assert!(g.scalar().is_some());
    }

    #[test]
    fn convolution_matches_brute_force_reference() {
        let g = gaussian_1d(40, 17.0, 3.0, [10.0, 30.0]);
        let src: Vec<f64> = g.dens().iter().copied().collect();
        for &(sigma, ds) in &[(1.0, 1usize), (2.2, 1), (1.5, 3), (0.8, 2)] {
            let kernel = Kernel::new(sigma, 3.0, ds).unwrap();
            let expected = brute_force_convolve(&src, kernel.weights(), ds);
            let out = g.clone().convolve(0, &kernel, ds).unwrap();
            assert_eq!(out.shape()[0], expected.len(), "sigma={sigma} ds={ds}");
            for (a, b) in out.dens().iter().zip(expected.iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
            }
            let n = kernel.half_width();
            assert_abs_diff_eq!(out.axes()[0].obs()[0], n as f64, epsilon = 1e-12);
            assert_abs_diff_eq!(out.axes()[0].step(), ds as f64, epsilon = 1e-12);
        }
    }

    #[test]
    fn convolution_along_inner_axis_of_2d_grid() {
        let g = box_2d();
        let kernel = Kernel::new(1.0, 2.0, 1).unwrap();
        let out = g.clone().convolve(1, &kernel, 1).unwrap();
        assert_eq!(out.shape(), &[21, 7]);
        for i in 0..21 {
            let row: Vec<f64> = g.dens().index_axis(Axis(0), i).iter().copied().collect();
            let expected = brute_force_convolve(&row, kernel.weights(), 1);
            for (j, e) in expected.iter().enumerate() {
                assert_abs_diff_eq!(out.dens()[[i, j]], *e, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn convolution_conserves_mass_away_from_edges() {
        let g = gaussian_1d(81, 40.0, 4.0, [20.0, 60.0]).normalize().unwrap();
        let kernel = Kernel::new(2.0, 4.0, 1).unwrap();
        assert!(g.check_fits(0, &kernel));
        let m = g.convolve(0, &kernel, 1).unwrap().integrate_region_of_normalization().unwrap();
        // Only the Gaussian tails beyond the ROI are lost.
        assert_abs_diff_eq!(m, 1.0, epsilon = 1e-4);
        assert!(m < 1.0);
    }

    #[test]
    fn convolution_too_wide_is_insufficient_support() {
        let kernel = Kernel::new(3.0, 3.0, 1).unwrap();
        let err = tent().convolve(0, &kernel, 1).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InsufficientSupport);
    }

    #[test]
    fn narrow_evaluation_interpolates_linearly() {
        let g = tent();
        for &sigma in &[0.0, 1e-6, 0.2, 0.49] {
            let v = g.clone().evaluate_at_point(0, sigma, 3.0, 1.25).unwrap().scalar().unwrap();
            assert_abs_diff_eq!(v, 1.25, epsilon = 1e-12);
        }
        let v = g.evaluate_at_point(0, 0.0, 3.0, 4.0).unwrap().scalar().unwrap();
        assert_abs_diff_eq!(v, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn evaluation_near_threshold_agrees_with_convolution() {
        let g = gaussian_1d(61, 30.0, 4.0, [10.0, 50.0]);
        let sigma = 0.6;
        let nsig = 4.0;
        let kernel = Kernel::new(sigma, nsig, 1).unwrap();
        let conv = g.clone().convolve(0, &kernel, 1).unwrap();
        // Convolution output starts at coordinate n.
        let n = kernel.half_width();
        for &x in &[25.0, 30.0, 33.0] {
            let idx = x as usize - n;
            let expected = conv.dens()[[idx]];
            let v = g.clone().evaluate_at_point(0, sigma, nsig, x).unwrap().scalar().unwrap();
            assert!((v - expected).abs() / expected < 0.03, "x={x}: {v} vs {expected}");
        }
    }

    #[test]
    fn evaluation_outside_support_fails() {
        let g = tent();
        let err = g.clone().evaluate_at_point(0, 1.0, 3.0, 2.0).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InsufficientSupport);
        let err = g.evaluate_at_point(0, 0.1, 3.0, 4.5).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InsufficientSupport);
    }

    #[test]
    fn density_value_divides_by_every_step() {
        let a0 = GridAxis::linspace(0.0, 1.0, 3, [0.0, 1.0], true).unwrap();
        let a1 = GridAxis::linspace(0.0, 4.0, 3, [0.0, 4.0], true).unwrap();
        let g = Grid::from_vec(vec![1.0; 9], vec![a0, a1]).unwrap();
        let full = g.clone().density_value();
        assert_abs_diff_eq!(full.values()[[1, 1]], 1.0 / (0.5 * 2.0), epsilon = 1e-12);

        let point = g
            .evaluate_at_point(1, 0.0, 3.0, 2.0)
            .unwrap()
            .evaluate_at_point(0, 0.0, 3.0, 0.5)
            .unwrap()
            .density_value();
        assert_abs_diff_eq!(point.scalar().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_malformed_axes() {
        assert!(GridAxis::new(vec![0.0, 1.0, 3.0], [0.0, 3.0], true).is_err());
        assert!(GridAxis::new(vec![1.0, 0.0], [0.0, 1.0], true).is_err());
        assert!(GridAxis::new(vec![0.0], [0.0, 1.0], true).is_err());
        assert!(GridAxis::new(vec![0.0, 1.0], [1.0, 0.0], true).is_err());
        let axis = GridAxis::linspace(0.0, 1.0, 2, [0.0, 1.0], true).unwrap();
        assert!(Grid::from_vec(vec![1.0, -1.0], vec![axis.clone()]).is_err());
        assert!(Grid::from_vec(vec![1.0, 1.0, 1.0], vec![axis]).is_err());
    }
}
