//! Shared likelihood pipeline used by the CLI commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! grids -> population variants -> per-star model densities + background
//! -> MLE or profiled surface
//!
//! The commands can then focus on I/O and presentation.

use std::path::{Path, PathBuf};

use crate::domain::{Catalog, ClusterConfig, LikelihoodSurface, MleResult};
use crate::error::AppError;
use crate::grid::Grid;
use crate::io::read_grid_json;
use crate::likelihood::{
    PopulationGrids, SURFACE_POPULATIONS, background_densities, mle_single, model_densities, profile_surface,
    uniform_background,
};

/// Outputs of a single-population fit.
#[derive(Debug, Clone)]
pub struct MleRun {
    pub result: MleResult,
    pub max_delta_p: f64,
    pub age: f64,
    pub metallicity: f64,
}

/// Outputs of a three-population surface.
#[derive(Debug, Clone)]
pub struct SurfaceRun {
    pub surface: LikelihoodSurface,
    pub max_delta_p: f64,
}

/// Check that a grid describes the observables of the config.
pub fn check_grid(grid: &Grid, config: &ClusterConfig) -> Result<(), AppError> {
    if grid.dim() != config.ndim() {
        return Err(AppError::invalid(format!(
            "Grid has {} dimensions, config has {} observables.",
            grid.dim(),
            config.ndim()
        )));
    }
    for (i, ax) in grid.axes().iter().enumerate() {
        if ax.is_normalized() != config.norm[i] {
            return Err(AppError::invalid(format!(
                "Axis {i} ({}): grid norm flag {} disagrees with config.",
                config.observables[i],
                ax.is_normalized()
            )));
        }
        if ax.roi() != config.roi[i] {
            log::warn!(
                "axis {i} ({}): grid ROI {:?} differs from config ROI {:?}",
                config.observables[i],
                ax.roi(),
                config.roi[i]
            );
        }
    }
    Ok(())
}

/// Normalize (optionally) and fit correction models.
pub fn correct_grid(grid: Grid, config: &ClusterConfig, normalize: bool) -> Result<Grid, AppError> {
    check_grid(&grid, config)?;
    if normalize {
        grid.prepare(config.nsig, config.conv_err)
    } else {
        grid.with_fitted_corrections(config.nsig, config.conv_err)
    }
}

/// Load population grids and derive their boundary variants.
pub fn load_populations(paths: &[PathBuf], config: &ClusterConfig) -> Result<Vec<PopulationGrids>, AppError> {
    paths
        .iter()
        .map(|p| -> Result<PopulationGrids, AppError> {
            let grid = read_grid_json(p)?;
            populations_from_grid(label(p), grid, config).map_err(|e| e.context(p.display()))
        })
        .collect()
}

pub fn populations_from_grid(label: String, grid: Grid, config: &ClusterConfig) -> Result<PopulationGrids, AppError> {
    check_grid(&grid, config)?;
    PopulationGrids::from_full(label, grid, config.boundary_axis())
}

fn label(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

/// Single-population cluster fraction.
///
/// With `uniform_background_density` the field density is `1 / volume` for every
/// star; otherwise the boundary-aware background model is used.
pub fn run_mle(
    population: &PopulationGrids,
    catalog: &Catalog,
    config: &ClusterConfig,
    uniform_background_density: bool,
) -> Result<MleRun, AppError> {
    let densities = model_densities(std::slice::from_ref(population), catalog, config)?;
    let back = if uniform_background_density {
        uniform_background(catalog.len(), config.volume(None))?
    } else {
        background_densities(catalog, config)?
    };
    let p: Vec<f64> = densities.values.column(0).to_vec();
    let result = mle_single(&p, &back)?;
    log::info!("MLE cluster fraction {:.4} over {} stars", result.q, result.n);

    Ok(MleRun {
        result,
        max_delta_p: densities.max_delta_p,
        age: population.full().age(),
        metallicity: population.full().metallicity(),
    })
}

/// Profiled likelihood surface over three populations.
pub fn run_surface(
    populations: &[PopulationGrids],
    catalog: &Catalog,
    config: &ClusterConfig,
) -> Result<SurfaceRun, AppError> {
    if populations.len() != SURFACE_POPULATIONS {
        return Err(AppError::invalid(format!(
            "Surface needs {SURFACE_POPULATIONS} population grids, got {}.",
            populations.len()
        )));
    }
    let first = populations[0].full();
    let (age, metallicity) = (first.age(), first.metallicity());
    for pop in &populations[1..] {
        let g = pop.full();
        let same = |a: f64, b: f64| a == b || (a.is_nan() && b.is_nan());
        if !(same(g.age(), age) && same(g.metallicity(), metallicity)) {
            log::warn!(
                "population '{}' is tagged age {} [M/H] {}, first grid has {age} {metallicity}",
                pop.label,
                g.age(),
                g.metallicity()
            );
        }
    }

    let densities = model_densities(populations, catalog, config)?;
    let back = background_densities(catalog, config)?;
    log::info!(
        "profiling {}x{} weight grid over {} stars",
        config.weight_steps,
        config.weight_steps,
        catalog.len()
    );
    let surface =
        profile_surface(&densities.values, &back, config.weight_steps, config.q_points)?.with_provenance(age, metallicity);

    Ok(SurfaceRun {
        surface,
        max_delta_p: densities.max_delta_p,
    })
}
