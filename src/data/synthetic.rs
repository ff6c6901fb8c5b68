//! Seeded synthetic catalogs drawn from a population grid.
//!
//! Each star is a cluster member with probability `cluster_fraction`:
//! - members: a grid cell drawn with probability proportional to its mass,
//!   jittered uniformly within the cell, then perturbed by the residual
//!   error `sqrt(err^2 - floor^2)` (the grid already carries the floor)
//! - field stars: uniform over the ROI, with the boundary observable
//!   smeared by `v0err * floor` the way the background model assumes
//!
//! Stars that land outside the ROI of a normalized observable are redrawn.
//! Boundary values below the ROI are reported as below threshold.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Catalog, ClusterConfig, Measurement, Star};
use crate::error::AppError;
use crate::grid::Grid;

/// Redraw budget per requested star.
const MAX_DRAWS_PER_STAR: usize = 1000;

#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub n_stars: usize,
    pub cluster_fraction: f64,
    /// Measurement errors as a multiple of the floor standard deviations.
    pub error_scale: f64,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct SyntheticCatalog {
    pub catalog: Catalog,
    /// Whether each star was drawn from the cluster.
    pub members: Vec<bool>,
}

impl SyntheticCatalog {
    pub fn member_fraction(&self) -> f64 {
        self.members.iter().filter(|m| **m).count() as f64 / self.members.len().max(1) as f64
    }
}

pub fn simulate_catalog(grid: &Grid, config: &ClusterConfig, spec: &SyntheticSpec) -> Result<SyntheticCatalog, AppError> {
    if spec.n_stars == 0 {
        return Err(AppError::invalid("Star count must be > 0."));
    }
    if !(0.0..=1.0).contains(&spec.cluster_fraction) {
        return Err(AppError::invalid(format!(
            "Cluster fraction must be in [0, 1], got {}.",
            spec.cluster_fraction
        )));
    }
    if !(spec.error_scale.is_finite() && spec.error_scale >= 1.0) {
        return Err(AppError::invalid(format!(
            "Error scale must be >= 1 (errors never fall below the floor), got {}.",
            spec.error_scale
        )));
    }
    let ndim = config.ndim();
    if grid.dim() != ndim {
        return Err(AppError::invalid(format!(
            "Grid has {} dimensions, config has {ndim} observables.",
            grid.dim()
        )));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let cells = WeightedIndex::new(grid.dens().iter().copied())
        .map_err(|e| AppError::degenerate(format!("Cannot sample from grid mass: {e}")))?;
    let boundary = config.boundary_axis();

    let errors: Vec<f64> = config.std_floor.iter().map(|f| f * spec.error_scale).collect();
    let residual = noise(config.std_floor.iter().zip(&errors).map(|(f, e)| (e * e - f * f).max(0.0).sqrt()))?;
    let edge = match boundary {
        Some(b) => Some(normal(config.v0err * config.std_floor[b])?),
        None => None,
    };

    let mut stars = Vec::with_capacity(spec.n_stars);
    let mut members = Vec::with_capacity(spec.n_stars);
    let mut draws = 0usize;

    while stars.len() < spec.n_stars {
        draws += 1;
        if draws > spec.n_stars * MAX_DRAWS_PER_STAR {
            return Err(AppError::degenerate(format!(
                "Only {} of {} stars landed inside the ROI.",
                stars.len(),
                spec.n_stars
            )));
        }

        let member = rng.gen_bool(spec.cluster_fraction);
        let observed: Vec<f64> = if member {
            let index = unravel(cells.sample(&mut rng), grid.shape());
            grid.axes()
                .iter()
                .zip(index)
                .zip(&residual)
                .map(|((ax, i), n)| {
                    let jitter = ax.step() * (rng.r#gen::<f64>() - 0.5);
                    ax.obs()[i] + jitter + n.sample(&mut rng)
                })
                .collect()
        } else {
            config
                .roi
                .iter()
                .enumerate()
                .map(|(k, [lo, hi])| {
                    let v = rng.gen_range(*lo..*hi);
                    match (&edge, boundary) {
                        (Some(n), Some(b)) if b == k => v + n.sample(&mut rng),
                        _ => v,
                    }
                })
                .collect()
        };

        let inside = observed
            .iter()
            .zip(&config.roi)
            .zip(&config.norm)
            .all(|((v, [lo, hi]), norm)| !norm || (lo..=hi).contains(&v));
        if !inside {
            continue;
        }

        let values = observed
            .iter()
            .enumerate()
            .map(|(k, &v)| {
                if Some(k) == boundary && v < config.roi[k][0] {
                    Measurement::BelowThreshold
                } else {
                    Measurement::Present(v)
                }
            })
            .collect::<Vec<_>>();
        let star_errors = values
            .iter()
            .zip(&errors)
            .map(|(m, e)| if m.value().is_some() { *e } else { f64::NAN })
            .collect();

        stars.push(Star {
            id: format!("syn{}", stars.len()),
            values,
            errors: star_errors,
        });
        members.push(member);
    }

    log::info!(
        "simulated {} stars ({} draws), seed {}",
        stars.len(),
        draws,
        spec.seed
    );

    Ok(SyntheticCatalog {
        catalog: Catalog {
            observables: config.observables.clone(),
            stars,
        },
        members,
    })
}

fn normal(sigma: f64) -> Result<Normal<f64>, AppError> {
    Normal::new(0.0, sigma).map_err(|e| AppError::invalid(format!("Noise distribution error: {e}")))
}

fn noise(sigmas: impl Iterator<Item = f64>) -> Result<Vec<Normal<f64>>, AppError> {
    sigmas.map(normal).collect()
}

/// Row-major flat index to per-axis indices.
fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (k, &n) in shape.iter().enumerate().rev() {
        index[k] = flat % n;
        flat /= n;
    }
    index
}
