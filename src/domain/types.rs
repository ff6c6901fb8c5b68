//! Shared domain types.
//!
//! Observations and configuration are plain data; the likelihood outputs are
//! serializable so they can be exported and reloaded for plotting.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::grid::MAX_DIM;

/// One measured value of one observable.
///
/// Catalogs commonly encode the two special cases as NaN and -1; those
/// sentinels are translated once at load time and never compared against
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    Present(f64),
    /// Not measured.
    Absent,
    /// Measured, but below the detection threshold (collected at the
    /// lower ROI bound).
    BelowThreshold,
}

impl Measurement {
    pub fn value(self) -> Option<f64> {
        match self {
            Measurement::Present(v) => Some(v),
            Measurement::Absent | Measurement::BelowThreshold => None,
        }
    }
}

/// Which grid variant a star's density is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    /// Every observable has an ordinary value.
    Full,
    /// The boundary observable is missing; its axis is marginalized.
    Absent,
    /// The boundary observable is below threshold; its axis is collapsed to
    /// the mass below the ROI.
    BelowThreshold,
}

/// A catalog entry: observed values and measurement-error standard deviations.
#[derive(Debug, Clone, PartialEq)]
pub struct Star {
    pub id: String,
    pub values: Vec<Measurement>,
    pub errors: Vec<f64>,
}

impl Star {
    /// Grid variant for this star, decided by the boundary observable only.
    pub fn availability(&self, boundary_axis: Option<usize>) -> Availability {
        match boundary_axis.and_then(|a| self.values.get(a)) {
            Some(Measurement::Absent) => Availability::Absent,
            Some(Measurement::BelowThreshold) => Availability::BelowThreshold,
            _ => Availability::Full,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub observables: Vec<String>,
    pub stars: Vec<Star>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    pub fn count(&self, boundary_axis: Option<usize>, which: Availability) -> usize {
        self.stars
            .iter()
            .filter(|s| s.availability(boundary_axis) == which)
            .count()
    }
}

/// Cluster-specific constants and numerical settings.
///
/// Defaults describe NGC 1846 in (F555W magnitude, F435W-F814W color, vsini).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub observables: Vec<String>,
    /// Closed region of interest per observable.
    pub roi: Vec<[f64; 2]>,
    /// Which observables are normalized over the ROI.
    pub norm: Vec<bool>,
    /// Smallest standard deviation each observable is ever measured with;
    /// model grids are already convolved to this width.
    pub std_floor: Vec<f64>,
    /// Width of the background at the lower boundary of the boundary
    /// observable, in units of its floor standard deviation.
    pub v0err: f64,
    /// Standard deviations allotted to kernel support; evaluation kernels are
    /// cut one standard deviation earlier.
    pub nsig: f64,
    /// Widest trial kernel for correction fits, in grid steps.
    pub conv_err: f64,
    /// Points per mixture-weight axis.
    pub weight_steps: usize,
    /// Points on the q grid used to integrate out the cluster fraction.
    pub q_points: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            observables: vec!["mag".into(), "col".into(), "vsini".into()],
            roi: vec![[19.5, 22.0], [0.4, 1.0], [0.0, 280.0]],
            norm: vec![true, true, false],
            std_floor: vec![0.01, 0.01 * 2f64.sqrt(), 10.0],
            v0err: 5.0,
            nsig: 4.0,
            conv_err: 9.0,
            weight_steps: 101,
            q_points: 1000,
        }
    }
}

impl ClusterConfig {
    pub fn ndim(&self) -> usize {
        self.observables.len()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let n = self.ndim();
        if n == 0 || n > MAX_DIM {
            return Err(AppError::invalid(format!(
                "Config must name 1 to {MAX_DIM} observables, got {n}."
            )));
        }
        if self.roi.len() != n || self.norm.len() != n || self.std_floor.len() != n {
            return Err(AppError::invalid(format!(
                "Config lengths disagree: {n} observables, {} ROI bounds, {} norm flags, {} floors.",
                self.roi.len(),
                self.norm.len(),
                self.std_floor.len()
            )));
        }
        for (name, [lo, hi]) in self.observables.iter().zip(self.roi.iter()) {
            if !(lo.is_finite() && hi.is_finite() && hi > lo) {
                return Err(AppError::invalid(format!("Invalid ROI for {name}: [{lo}, {hi}].")));
            }
        }
        for (name, s) in self.observables.iter().zip(self.std_floor.iter()) {
            if !(s.is_finite() && *s > 0.0) {
                return Err(AppError::invalid(format!("Floor std for {name} must be > 0, got {s}.")));
            }
        }
        if !(self.v0err.is_finite() && self.v0err > 0.0) {
            return Err(AppError::invalid("v0err must be > 0."));
        }
        if !(self.nsig.is_finite() && self.nsig >= 2.0) {
            return Err(AppError::invalid("nsig must be >= 2."));
        }
        if self.weight_steps < 2 || self.q_points < 2 {
            return Err(AppError::invalid("weight_steps and q_points must be >= 2."));
        }
        Ok(())
    }

    /// Truncation width of per-star evaluation kernels.
    pub fn eval_nsig(&self) -> f64 {
        self.nsig - 1.0
    }

    /// The last observable that is not normalized over its ROI.
    pub fn boundary_axis(&self) -> Option<usize> {
        self.norm.iter().rposition(|n| !n)
    }

    /// ROI volume, optionally leaving one axis out.
    pub fn volume(&self, without: Option<usize>) -> f64 {
        self.roi
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != without)
            .map(|(_, [lo, hi])| hi - lo)
            .product()
    }
}

/// Single-weight maximum-likelihood result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MleResult {
    /// Maximum-likelihood cluster fraction.
    pub q: f64,
    pub log_likelihood: f64,
    pub n: usize,
}

/// Profiled log-likelihood over two mixture weights.
///
/// `ll[[i, j]]` belongs to `(w0[i], w1[j])` and is NaN where `w0 + w1 > 1`.
#[derive(Debug, Clone)]
pub struct LikelihoodSurface {
    pub w0: Vec<f64>,
    pub w1: Vec<f64>,
    pub ll: Array2<f64>,
    pub age: f64,
    pub metallicity: f64,
}

/// Location and value of the surface maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfacePeak {
    pub i: usize,
    pub j: usize,
    pub w0: f64,
    pub w1: f64,
    pub ll: f64,
}

impl LikelihoodSurface {
    pub fn with_provenance(mut self, age: f64, metallicity: f64) -> Self {
        self.age = age;
        self.metallicity = metallicity;
        self
    }

    /// Largest finite cell.
    pub fn argmax(&self) -> Option<SurfacePeak> {
        self.extreme(|a, b| a > b)
    }

    /// Smallest finite cell.
    pub fn argmin(&self) -> Option<SurfacePeak> {
        self.extreme(|a, b| a < b)
    }

    fn extreme(&self, better: impl Fn(f64, f64) -> bool) -> Option<SurfacePeak> {
        let mut best: Option<SurfacePeak> = None;
        for ((i, j), &v) in self.ll.indexed_iter() {
            if !v.is_finite() {
                continue;
            }
            if best.is_none_or(|b| better(v, b.ll)) {
                best = Some(SurfacePeak {
                    i,
                    j,
                    w0: self.w0[i],
                    w1: self.w1[j],
                    ll: v,
                });
            }
        }
        best
    }

    pub fn feasible_cells(&self) -> usize {
        self.ll.iter().filter(|v| v.is_finite()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star(values: Vec<Measurement>) -> Star {
        let n = values.len();
        Star {
            id: "s".into(),
            values,
            errors: vec![0.1; n],
        }
    }

    #[test]
    fn availability_follows_boundary_observable() {
        let cfg = ClusterConfig::default();
        let b = cfg.boundary_axis();
        assert_eq!(b, Some(2));
        let full = star(vec![Measurement::Present(20.0), Measurement::Present(0.5), Measurement::Present(120.0)]);
        let absent = star(vec![Measurement::Present(20.0), Measurement::Present(0.5), Measurement::Absent]);
        let below = star(vec![Measurement::Present(20.0), Measurement::Present(0.5), Measurement::BelowThreshold]);
        assert_eq!(full.availability(b), Availability::Full);
        assert_eq!(absent.availability(b), Availability::Absent);
        assert_eq!(below.availability(b), Availability::BelowThreshold);
        assert_eq!(below.availability(None), Availability::Full);
    }

    #[test]
    fn default_config_is_valid_and_volumes_match() {
        let cfg = ClusterConfig::default();
        cfg.validate().unwrap();
        assert!((cfg.volume(None) - 2.5 * 0.6 * 280.0).abs() < 1e-9);
        assert!((cfg.volume(Some(2)) - 2.5 * 0.6).abs() < 1e-12);
        assert_eq!(cfg.eval_nsig(), 3.0);
    }

    #[test]
    fn config_json_ignores_retired_keys_and_fills_defaults() {
        let cfg: ClusterConfig = serde_json::from_str(r#"{"nsig": 5.0, "downsample": 3}"#).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.nsig, 5.0);
        assert_eq!(cfg.conv_err, ClusterConfig::default().conv_err);
    }

    #[test]
    fn config_rejects_mismatched_lengths() {
        let cfg = ClusterConfig {
            norm: vec![true, true],
            ..ClusterConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_config_json_falls_back_to_defaults() {
        let cfg: ClusterConfig = serde_json::from_str(r#"{"v0err": 3.0, "weight_steps": 11}"#).unwrap();
        assert_eq!(cfg.v0err, 3.0);
        assert_eq!(cfg.weight_steps, 11);
        assert_eq!(cfg.roi, ClusterConfig::default().roi);
    }

    #[test]
    fn surface_extremes_skip_nan_cells() {
        let ll = Array2::from_shape_vec((2, 2), vec![1.0, 3.0, 2.0, f64::NAN]).unwrap();
        let s = LikelihoodSurface {
            w0: vec![0.0, 1.0],
            w1: vec![0.0, 1.0],
            ll,
            age: 9.0,
            metallicity: 0.0,
        };
        let top = s.argmax().unwrap();
        assert_eq!((top.i, top.j, top.ll), (0, 1, 3.0));
        assert_eq!(s.argmin().unwrap().ll, 1.0);
        assert_eq!(s.feasible_cells(), 3);
    }
}
