//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the grid and likelihood code stays clean and testable
//! - output changes are localized

use crate::domain::{Availability, Catalog, ClusterConfig, LikelihoodSurface, MleResult};
use crate::grid::Grid;
use crate::io::catalog::RowError;

/// Catalog size and how many stars fall into each boundary class.
pub fn format_catalog_summary(catalog: &Catalog, row_errors: &[RowError], config: &ClusterConfig) -> String {
    let b = config.boundary_axis();
    let mut out = String::new();
    out.push_str(&format!(
        "Catalog: n={} | observables={}\n",
        catalog.len(),
        config.observables.join(",")
    ));
    if let Some(axis) = b {
        out.push_str(&format!(
            "Boundary `{}`: measured={} absent={} below={}\n",
            config.observables[axis],
            catalog.count(b, Availability::Full),
            catalog.count(b, Availability::Absent),
            catalog.count(b, Availability::BelowThreshold),
        ));
    }
    if !row_errors.is_empty() {
        out.push_str(&format!("Skipped rows: {}\n", row_errors.len()));
        for e in row_errors.iter().take(5) {
            out.push_str(&format!(
                "  line {} ({}): {}\n",
                e.line,
                e.id.as_deref().unwrap_or("-"),
                e.message
            ));
        }
    }
    out
}

/// Correction models attached to a grid, one block per axis.
pub fn format_corrections(grid: &Grid, config: &ClusterConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!("Grid: shape={:?}\n", grid.shape()));
    for (i, ax) in grid.axes().iter().enumerate() {
        let name = config.observables.get(i).map_or("?", String::as_str);
        match ax.correction() {
            Some(m) => {
                out.push_str(&format!("{name}: {} samples\n", m.sigma().len()));
                out.push_str(&format!("  sigma: {}\n", fmt_vec(m.sigma())));
                out.push_str(&format!("  dP   : {}\n", fmt_vec(m.samples())));
            }
            None => out.push_str(&format!("{name}: no correction\n")),
        }
    }
    out
}

pub fn format_mle_summary(result: &MleResult) -> String {
    format!(
        "Cluster fraction: q={:.4} | ln L={:.4} | n={}\n",
        result.q, result.log_likelihood, result.n
    )
}

/// Extremes of the surface, in the order a reader checks them.
pub fn format_surface_summary(surface: &LikelihoodSurface) -> String {
    let mut out = String::new();
    if surface.age.is_finite() || surface.metallicity.is_finite() {
        out.push_str(&format!("Age: {:.3} | [M/H]: {:.3}\n", surface.age, surface.metallicity));
    }
    match (surface.argmax(), surface.argmin()) {
        (Some(top), Some(low)) => {
            out.push_str(&format!(
                "max ln likelihood: {:.4} at w_0 = {:.2}, w_1 = {:.2}\n",
                top.ll, top.w0, top.w1
            ));
            out.push_str(&format!("min ln likelihood: {:.4}\n", low.ll));
        }
        _ => out.push_str("No feasible cells.\n"),
    }
    out.push_str(&format!("Feasible cells: {}\n", surface.feasible_cells()));
    out
}

/// The `n` best cells as a table.
pub fn format_top_cells(surface: &LikelihoodSurface, n: usize) -> String {
    let mut cells: Vec<(f64, f64, f64)> = surface
        .ll
        .indexed_iter()
        .filter(|(_, v)| v.is_finite())
        .map(|((i, j), &v)| (surface.w0[i], surface.w1[j], v))
        .collect();
    cells.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut out = String::new();
    out.push_str(&format!("{:>6} {:>6} {:>14}\n", "w0", "w1", "ln L"));
    out.push_str(&format!("{:->6} {:->6} {:->14}\n", "", "", ""));
    for (w0, w1, ll) in cells.into_iter().take(n) {
        out.push_str(&format!("{w0:>6.2} {w1:>6.2} {ll:>14.4}\n"));
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.3e}")).collect();
    format!("[{}]", parts.join(", "))
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
            metallicity: -0.45,
        }
    }

    #[test]
    fn surface_summary_names_the_peak() {
        let text = format_surface_summary(&surface());
        assert!(text.contains("max ln likelihood: -1.5000 at w_0 = 0.00, w_1 = 1.00"), "{text}");
        assert!(text.contains("min ln likelihood: -3.0000"), "{text}");
        assert!(text.contains("Feasible cells: 3"));
    }

    #[test]
    fn top_cells_are_sorted_and_skip_nan() {
        let text = format_top_cells(&surface(), 10);
        let rows: Vec<&str> = text.lines().skip(2).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].ends_with("-1.5000"));
        assert!(rows[2].ends_with("-3.0000"));
    }
}
