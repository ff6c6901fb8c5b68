//! Read/write density grid JSON files.
//!
//! One file holds one population grid as produced by the isochrone
//! provider, optionally with fitted correction models attached:
//!
//! ```json
//! {"age": 9.15, "metallicity": -0.45, "shape": [n0, n1, n2],
//!  "dens": [...], "obs": [[...], [...], [...]],
//!  "roi": [[lo, hi], ...], "norm": [true, true, false],
//!  "correction": [{"sigma": [...], "delta_p": [...]}, null, null]}
//! ```
//!
//! `dens` is row-major with the last axis fastest.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::grid::{CorrectionModel, Grid, GridAxis};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridFile {
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub metallicity: Option<f64>,
    pub shape: Vec<usize>,
    pub dens: Vec<f64>,
    pub obs: Vec<Vec<f64>>,
    pub roi: Vec<[f64; 2]>,
    pub norm: Vec<bool>,
    /// One entry per axis; may be omitted entirely for uncorrected grids.
    #[serde(default)]
    pub correction: Vec<Option<CorrectionModel>>,
}

impl GridFile {
    pub fn from_grid(grid: &Grid) -> Self {
        Self {
            age: Some(grid.age()).filter(|v| v.is_finite()),
            metallicity: Some(grid.metallicity()).filter(|v| v.is_finite()),
            shape: grid.shape().to_vec(),
            dens: grid.dens().iter().copied().collect(),
            obs: grid.axes().iter().map(|a| a.obs().to_vec()).collect(),
            roi: grid.axes().iter().map(GridAxis::roi).collect(),
            norm: grid.axes().iter().map(GridAxis::is_normalized).collect(),
            correction: grid.axes().iter().map(|a| a.correction().cloned()).collect(),
        }
    }

    pub fn into_grid(self) -> Result<Grid, AppError> {
        let n = self.shape.len();
        if self.obs.len() != n || self.roi.len() != n || self.norm.len() != n {
            return Err(AppError::invalid(format!(
                "Grid file lengths disagree: shape has {n} axes, {} obs, {} roi, {} norm.",
                self.obs.len(),
                self.roi.len(),
                self.norm.len()
            )));
        }
        if !self.correction.is_empty() && self.correction.len() != n {
            return Err(AppError::invalid(format!(
                "Grid file has {} correction entries for {n} axes.",
                self.correction.len()
            )));
        }

        let mut axes = Vec::with_capacity(n);
        for (i, ((obs, roi), norm)) in self.obs.into_iter().zip(self.roi).zip(self.norm).enumerate() {
            if obs.len() != self.shape[i] {
                return Err(AppError::invalid(format!(
                    "Axis {i}: shape says {} points but obs has {}.",
                    self.shape[i],
                    obs.len()
                )));
            }
            axes.push(GridAxis::new(obs, roi, norm).map_err(|e| e.context(format!("axis {i}")))?);
        }

        let mut grid = Grid::from_vec(self.dens, axes)?.with_provenance(
            self.age.unwrap_or(f64::NAN),
            self.metallicity.unwrap_or(f64::NAN),
        );
        for (axis, model) in self.correction.into_iter().enumerate() {
            grid.set_correction(axis, model)?;
        }
        Ok(grid)
    }
}

/// Read a density grid JSON file.
pub fn read_grid_json(path: &Path) -> Result<Grid, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open grid JSON '{}': {e}", path.display())))?;
    let raw: GridFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::io(format!("Invalid grid JSON '{}': {e}", path.display())))?;
    let grid = raw.into_grid().map_err(|e| e.context(path.display()))?;
    log::info!(
        "loaded grid {} (shape {:?}, age {}, [M/H] {})",
        path.display(),
        grid.shape(),
        grid.age(),
        grid.metallicity()
    );
    Ok(grid)
}

/// Write a density grid JSON file.
pub fn write_grid_json(path: &Path, grid: &Grid) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create grid JSON '{}': {e}", path.display())))?;
    serde_json::to_writer(BufWriter::new(file), &GridFile::from_grid(grid))
        .map_err(|e| AppError::io(format!("Failed to write grid JSON: {e}")))?;
    Ok(())
}
