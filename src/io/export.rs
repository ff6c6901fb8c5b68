//! Export likelihood results.
//!
//! - surface CSV: one `w0,w1,ll` row per feasible cell, easy to load in
//!   spreadsheets or plotting scripts
//! - surface JSON: the full square grid (`null` where infeasible) plus the
//!   argmax and run metadata
//! - MLE JSON: the single-weight result

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{LikelihoodSurface, MleResult, SurfacePeak};
use crate::error::AppError;

const TOOL: &str = "cmem";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceFile {
    pub tool: String,
    pub created: DateTime<Utc>,
    pub age: Option<f64>,
    pub metallicity: Option<f64>,
    pub w0: Vec<f64>,
    pub w1: Vec<f64>,
    /// Row-major by `w0`; `None` outside the simplex.
    pub ll: Vec<Vec<Option<f64>>>,
    pub argmax: Option<SurfacePeak>,
}

impl SurfaceFile {
    pub fn from_surface(surface: &LikelihoodSurface) -> Self {
        Self {
            tool: TOOL.to_string(),
            created: Utc::now(),
            age: finite(surface.age),
            metallicity: finite(surface.metallicity),
            w0: surface.w0.clone(),
            w1: surface.w1.clone(),
            ll: surface
                .ll
                .rows()
                .into_iter()
                .map(|row| row.iter().map(|&v| finite(v)).collect())
                .collect(),
            argmax: surface.argmax(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MleFile {
    pub tool: String,
    pub created: DateTime<Utc>,
    pub age: Option<f64>,
    pub metallicity: Option<f64>,
    #[serde(flatten)]
    pub result: MleResult,
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Write feasible surface cells to a CSV file.
pub fn write_surface_csv(path: &Path, surface: &LikelihoodSurface) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_surface_rows(BufWriter::new(file), surface)
}

fn write_surface_rows<W: Write>(mut out: W, surface: &LikelihoodSurface) -> Result<(), AppError> {
    writeln!(out, "w0,w1,ll").map_err(|e| AppError::io(format!("Failed to write export CSV header: {e}")))?;
    for ((i, j), &v) in surface.ll.indexed_iter() {
        if !v.is_finite() {
            continue;
        }
        writeln!(out, "{:.4},{:.4},{:.6}", surface.w0[i], surface.w1[j], v)
            .map_err(|e| AppError::io(format!("Failed to write export CSV row: {e}")))?;
    }
    out.flush()
        .map_err(|e| AppError::io(format!("Failed to flush export CSV: {e}")))
}

/// Write the full surface with metadata to a JSON file.
pub fn write_surface_json(path: &Path, surface: &LikelihoodSurface) -> Result<(), AppError> {
    write_json(path, &SurfaceFile::from_surface(surface))
}

pub fn write_mle_json(path: &Path, result: &MleResult, age: f64, metallicity: f64) -> Result<(), AppError> {
    let file = MleFile {
        tool: TOOL.to_string(),
        created: Utc::now(),
        age: finite(age),
        metallicity: finite(metallicity),
        result: result.clone(),
    };
    write_json(path, &file)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create export JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .map_err(|e| AppError::io(format!("Failed to write export JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn surface() -> LikelihoodSurface {
        let ll = Array2::from_shape_vec((2, 2), vec![-3.0, -1.5, -2.0, f64::NAN]).unwrap();
        LikelihoodSurface {
            w0: vec![0.0, 1.0],
            w1: vec![0.0, 1.0],
            ll,
            age: 9.15,
            metallicity: f64::NAN,
        }
    }

    #[test]
    fn csv_lists_only_feasible_cells() {
        let mut buf = Vec::new();
        write_surface_rows(&mut buf, &surface()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["w0,w1,ll", "0.0000,0.0000,-3.000000", "0.0000,1.0000,-1.500000", "1.0000,0.0000,-2.000000"]);
    }

    #[test]
    fn json_uses_null_for_infeasible_cells() {
        let file = SurfaceFile::from_surface(&surface());
        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["ll"][1][1], serde_json::Value::Null);
        assert_eq!(value["ll"][0][1], serde_json::json!(-1.5));
        assert_eq!(value["metallicity"], serde_json::Value::Null);
        assert_eq!(value["argmax"]["j"], serde_json::json!(1));
        assert_eq!(value["tool"], "cmem");
    }
}
