//! Cluster model density at each observation.
//!
//! For one star and one population grid we collapse the grid one axis at a
//! time, from the last axis inward, each time integrating against the part of
//! the star's error that the grid does not already include. The grids are
//! convolved to the floor standard deviations of the observables, so the
//! residual width is `sqrt(err^2 - floor^2)`. Where an axis carries a
//! correction model its leakage at that width is divided back out. This
//! holds for every axis, the last one included; only normalized axes are
//! ever fitted with a model, so the boundary axis is never corrected.

use ndarray::Array2;
use rayon::prelude::*;

use crate::domain::{Availability, Catalog, ClusterConfig, Star};
use crate::error::AppError;
use crate::grid::Grid;

/// Model grids of one population, one per measurement-availability variant.
#[derive(Debug, Clone)]
pub struct PopulationGrids {
    pub label: String,
    full: Grid,
    absent: Option<Grid>,
    below_threshold: Option<Grid>,
}

impl PopulationGrids {
    /// Derive the absent and below-threshold variants by collapsing the
    /// boundary axis of `full`.
    pub fn from_full(label: impl Into<String>, full: Grid, boundary_axis: Option<usize>) -> Result<Self, AppError> {
        let (absent, below_threshold) = match boundary_axis {
            Some(b) => (
                Some(full.clone().marginalize(b)?),
                Some(full.clone().integrate_lower(b)?),
            ),
            None => (None, None),
        };
        Ok(Self {
            label: label.into(),
            full,
            absent,
            below_threshold,
        })
    }

    pub fn full(&self) -> &Grid {
        &self.full
    }

    pub fn variant(&self, which: Availability) -> Result<&Grid, AppError> {
        let grid = match which {
            Availability::Full => Some(&self.full),
            Availability::Absent => self.absent.as_ref(),
            Availability::BelowThreshold => self.below_threshold.as_ref(),
        };
        grid.ok_or_else(|| {
            AppError::invalid(format!("Population '{}' has no {which:?} grid variant.", self.label))
        })
    }
}

/// Per-star model densities, `values[[star, population]]`.
#[derive(Debug, Clone)]
pub struct ModelDensities {
    pub values: Array2<f64>,
    /// Largest |Δp| applied to any star.
    pub max_delta_p: f64,
}

#[derive(Debug, Clone, Copy)]
struct StarDensity {
    value: f64,
    max_delta_p: f64,
}

/// Observables that remain as grid axes in a given variant.
fn variant_observables(ndim: usize, boundary_axis: Option<usize>, which: Availability) -> Vec<usize> {
    match (which, boundary_axis) {
        (Availability::Full, _) | (_, None) => (0..ndim).collect(),
        (_, Some(b)) => (0..ndim).filter(|&k| k != b).collect(),
    }
}

/// Model density of every star under every population.
pub fn model_densities(
    populations: &[PopulationGrids],
    catalog: &Catalog,
    config: &ClusterConfig,
) -> Result<ModelDensities, AppError> {
    if populations.is_empty() {
        return Err(AppError::invalid("No population grids supplied."));
    }
    let ndim = config.ndim();
    for pop in populations {
        if pop.full.dim() != ndim {
            return Err(AppError::invalid(format!(
                "Population '{}' grid has {} dimensions, config has {ndim} observables.",
                pop.label,
                pop.full.dim()
            )));
        }
    }

    let boundary = config.boundary_axis();
    let rows: Vec<(Vec<f64>, f64)> = catalog
        .stars
        .par_iter()
        .enumerate()
        .map(|(i, star)| -> Result<(Vec<f64>, f64), AppError> {
            let which = star.availability(boundary);
            let observables = variant_observables(ndim, boundary, which);
            let mut row = Vec::with_capacity(populations.len());
            let mut max_dp = 0.0_f64;
            for pop in populations {
                let d = pop
                    .variant(which)
                    .and_then(|grid| star_density(grid, star, &observables, config))
                    .map_err(|e| {
                        e.context(format!("population '{}'", pop.label))
                            .context(format!("star {i} ({})", star.id))
                    })?;
                row.push(d.value);
                max_dp = max_dp.max(d.max_delta_p);
            }
            Ok((row, max_dp))
        })
        .collect::<Result<_, _>>()?;

    let npop = populations.len();
    let mut values = Array2::<f64>::zeros((rows.len(), npop));
    let mut max_delta_p = 0.0_f64;
    for (i, (row, dp)) in rows.into_iter().enumerate() {
        for (k, v) in row.into_iter().enumerate() {
            values[[i, k]] = v;
        }
        max_delta_p = max_delta_p.max(dp);
    }
    log::debug!("maximum absolute de-normalization: {max_delta_p:.3e}");

    Ok(ModelDensities { values, max_delta_p })
}

fn star_density(grid: &Grid, star: &Star, observables: &[usize], config: &ClusterConfig) -> Result<StarDensity, AppError> {
    if grid.dim() != observables.len() {
        return Err(AppError::invalid(format!(
            "Grid variant has {} dimensions, expected {}.",
            grid.dim(),
            observables.len()
        )));
    }
    if star.values.len() != config.ndim() || star.errors.len() != config.ndim() {
        return Err(AppError::invalid(format!(
            "Star has {} values and {} errors for {} observables.",
            star.values.len(),
            star.errors.len(),
            config.ndim()
        )));
    }

    let nsig = config.eval_nsig();
    let mut g = grid.clone();
    let mut factor = 1.0;
    let mut max_delta_p = 0.0_f64;

    for axis in (0..g.dim()).rev() {
        let k = observables[axis];
        let name = &config.observables[k];
        let x = star.values[k]
            .value()
            .ok_or_else(|| AppError::invalid(format!("{name} has no usable value.")))?;
        let err = star.errors[k];
        if !(err.is_finite() && err >= 0.0) {
            return Err(AppError::invalid(format!("{name} error must be finite and >= 0, got {err}.")));
        }
        let floor = config.std_floor[k];
        // Errors at the floor can come out slightly negative after subtraction.
        let sigma = (err * err - floor * floor).max(0.0).sqrt();

        if let Some(model) = g.axes()[axis].correction() {
            let dp = model.delta_p(sigma);
            factor /= 1.0 + dp;
            max_delta_p = max_delta_p.max(dp.abs());
        }
        g = g
            .evaluate_at_point(axis, sigma, nsig, x)
            .map_err(|e| e.context(format!("axis {axis} ({name}), sigma {sigma:.4}")))?;
    }

    let value = g
        .density_value()
        .scalar()
        .ok_or_else(|| AppError::degenerate("Evaluation left a non-scalar density."))?;
    Ok(StarDensity {
        value: value * factor,
        max_delta_p,
    })
}
