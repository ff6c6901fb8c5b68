//! Mixture likelihoods over per-star model and background densities.
//!
//! - `mle_single`: cluster fraction `q` maximizing `Σ ln(q p_i + (1-q) b_i)`
//! - `profile_surface`: for each pair of population weights `(w0, w1)`, the
//!   log-likelihood with `q` integrated out under a uniform prior
//!
//! Surface values are relative to the pure-background likelihood `Π b_i`,
//! which is the same in every cell and would only shift the surface.

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

use crate::domain::{LikelihoodSurface, MleResult};
use crate::error::AppError;
use crate::math::{find_root, minimize_bounded};

/// Offset from q = 0 and q = 1 at which the derivative is tested.
const Q_EPS: f64 = f64::EPSILON;
const ROOT_TOL: f64 = 2e-12;

/// Number of rotational populations mixed by the surface.
pub const SURFACE_POPULATIONS: usize = 3;

/// Background density `1 / volume` for `n` stars.
pub fn uniform_background(n: usize, volume: f64) -> Result<Vec<f64>, AppError> {
    if !(volume.is_finite() && volume > 0.0) {
        return Err(AppError::invalid(format!("Background volume must be > 0, got {volume}.")));
    }
    Ok(vec![1.0 / volume; n])
}

fn check_densities(values: ArrayView1<'_, f64>, what: &str) -> Result<(), AppError> {
    match values.iter().position(|v| !(v.is_finite() && *v >= 0.0)) {
        Some(i) => Err(AppError::invalid(format!("star {i}: {what} density must be finite and >= 0, got {}.", values[i]))),
        None => Ok(()),
    }
}

fn check_background(back: &[f64], n: usize) -> Result<(), AppError> {
    if back.len() != n {
        return Err(AppError::invalid(format!(
            "{} background densities for {n} stars.",
            back.len()
        )));
    }
    match back.iter().position(|b| !(b.is_finite() && *b > 0.0)) {
        Some(i) => Err(AppError::invalid(format!("star {i}: background density must be > 0, got {}.", back[i]))),
        None => Ok(()),
    }
}

/// Maximum-likelihood cluster fraction for one population.
pub fn mle_single(p: &[f64], back: &[f64]) -> Result<MleResult, AppError> {
    if p.is_empty() {
        return Err(AppError::invalid("Cannot fit a cluster fraction to an empty catalog."));
    }
    check_densities(ArrayView1::from(p), "model")?;
    check_background(back, p.len())?;

    let log_l = |q: f64| -> f64 {
        p.iter()
            .zip(back)
            .map(|(pi, bi)| (q * pi + (1.0 - q) * bi).max(f64::MIN_POSITIVE).ln())
            .sum()
    };
    let q = minimize_bounded(|q| -log_l(q), 0.0, 1.0)?;
    log::debug!("single-population MLE: q = {q:.6}");

    Ok(MleResult {
        q,
        log_likelihood: log_l(q),
        n: p.len(),
    })
}

/// Odds ratios `r_i = f_i / b_i`. Stars with `r_i == 1` carry no
/// information about `q` and are dropped.
fn odds_ratios(f: impl Iterator<Item = f64>, back: &[f64]) -> Vec<f64> {
    f.zip(back).map(|(fi, bi)| fi / bi).filter(|&r| r != 1.0).collect()
}

/// `Σ ln(1 - q/q_i)` with `q_i = 1/(1 - r_i)`, written as `ln(1 - q + q r_i)`.
fn log_likelihood_ratio(ratios: &[f64], q: f64) -> f64 {
    ratios.iter().map(|r| (1.0 - q + q * r).ln()).sum()
}

/// `d/dq` of [`log_likelihood_ratio`], i.e. `Σ 1/(q - q_i)`.
fn dlog_likelihood(ratios: &[f64], q: f64) -> f64 {
    ratios.iter().map(|r| (r - 1.0) / (1.0 - q + q * r)).sum()
}

/// Cluster fraction maximizing the likelihood ratio.
///
/// The log-likelihood is concave in `q`, so the derivative at the two ends
/// decides between a boundary maximum and a single interior root.
pub fn profile_max(ratios: &[f64]) -> Result<f64, AppError> {
    let d0 = dlog_likelihood(ratios, Q_EPS);
    let d1 = dlog_likelihood(ratios, 1.0 - Q_EPS);
    if d0 <= 0.0 && d1 <= 0.0 {
        Ok(0.0)
    } else if d0 >= 0.0 && d1 >= 0.0 {
        Ok(1.0)
    } else {
        find_root(|q| dlog_likelihood(ratios, q), Q_EPS, 1.0 - Q_EPS, ROOT_TOL)
    }
}

/// `ln ∫ L(q) dq` over `[0, 1]`, integrated with the trapezoid rule on
/// `q_points` points after scaling by the maximum likelihood.
pub fn profiled_log_likelihood(ratios: &[f64], q_points: usize) -> Result<f64, AppError> {
    if q_points < 2 {
        return Err(AppError::invalid(format!("Need at least 2 q points, got {q_points}.")));
    }
    let qmax = profile_max(ratios)?;
    let llmax = log_likelihood_ratio(ratios, qmax);
    if !llmax.is_finite() {
        return Err(AppError::degenerate(format!("Maximum log-likelihood is {llmax} at q = {qmax}.")));
    }

    let dq = 1.0 / (q_points - 1) as f64;
    let integral: f64 = (0..q_points)
        .map(|k| {
            let q = k as f64 * dq;
            let w = if k == 0 || k == q_points - 1 { 0.5 } else { 1.0 };
            w * (log_likelihood_ratio(ratios, q) - llmax).exp()
        })
        .sum::<f64>()
        * dq;

    Ok(integral.ln() + llmax)
}

/// Profiled log-likelihood on the `(w0, w1)` simplex.
///
/// `densities` holds one row per star and one column per population; the
/// mixture is `p0 w0 + p1 (1 - w0 - w1) + p2 w1`. Cells with `w0 + w1 > 1`
/// stay NaN.
pub fn profile_surface(
    densities: &Array2<f64>,
    back: &[f64],
    weight_steps: usize,
    q_points: usize,
) -> Result<LikelihoodSurface, AppError> {
    let (npts, npop) = densities.dim();
    if npop != SURFACE_POPULATIONS {
        return Err(AppError::invalid(format!(
            "Surface needs {SURFACE_POPULATIONS} populations, got {npop}."
        )));
    }
    if weight_steps < 2 {
        return Err(AppError::invalid(format!("Need at least 2 weight steps, got {weight_steps}.")));
    }
    for (k, col) in densities.columns().into_iter().enumerate() {
        check_densities(col, &format!("population {k}"))?;
    }
    check_background(back, npts)?;

    let weights: Vec<f64> = (0..weight_steps)
        .map(|i| i as f64 / (weight_steps - 1) as f64)
        .collect();
    let (p0, p1, p2) = (densities.column(0), densities.column(1), densities.column(2));

    let rows: Vec<Vec<f64>> = (0..weight_steps)
        .into_par_iter()
        .map(|i| -> Result<Vec<f64>, AppError> {
            let w0 = weights[i];
            let mut row = vec![f64::NAN; weight_steps];
            for (j, cell) in row.iter_mut().enumerate().take(weight_steps - i) {
                let w1 = weights[j];
                let wm = (1.0 - w0 - w1).max(0.0);
                let f = (0..npts).map(|s| p0[s] * w0 + p1[s] * wm + p2[s] * w1);
                let ratios = odds_ratios(f, back);
                *cell = profiled_log_likelihood(&ratios, q_points)
                    .map_err(|e| e.context(format!("cell w0={w0:.3}, w1={w1:.3}")))?;
            }
            Ok(row)
        })
        .collect::<Result<_, _>>()?;

    let mut ll = Array2::<f64>::from_elem((weight_steps, weight_steps), f64::NAN);
    for (i, row) in rows.into_iter().enumerate() {
        for (j, v) in row.into_iter().enumerate() {
            ll[[i, j]] = v;
        }
    }

    Ok(LikelihoodSurface {
        w0: weights.clone(),
        w1: weights,
        ll,
        age: f64::NAN,
        metallicity: f64::NAN,
    })
}
