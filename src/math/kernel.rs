//! Truncated discrete Gaussian kernels.
//!
//! A [`Kernel`] is the discrete stand-in for convolution with a continuous
//! Gaussian error distribution on an evenly spaced grid. Offsets are in grid
//! steps, so the same kernel works on any axis with the same resolution.

use crate::error::AppError;

/// Normalized, symmetric Gaussian weights sampled at integer offsets `-n..=n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    sigma: f64,
    n: usize,
    weights: Vec<f64>,
}

impl Kernel {
    /// Build a kernel with standard deviation `sigma` (grid steps), truncated
    /// at no fewer than `nsig` standard deviations.
    ///
    /// The half-width is rounded up to a multiple of `downsample` so that a
    /// convolution followed by decimation keeps output points aligned with
    /// input coordinates.
    pub fn new(sigma: f64, nsig: f64, downsample: usize) -> Result<Self, AppError> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(AppError::invalid(format!(
                "Kernel sigma must be finite and > 0, got {sigma}."
            )));
        }
        if !(nsig.is_finite() && nsig >= 1.0) {
            return Err(AppError::invalid(format!(
                "Kernel truncation width must be >= 1 sigma, got {nsig}."
            )));
        }
        if downsample == 0 {
            return Err(AppError::invalid("Downsample factor must be >= 1."));
        }

        let ds = downsample as f64;
        let n = ((nsig * sigma / ds).ceil() as usize) * downsample;

        let mut weights: Vec<f64> = (0..=2 * n)
            .map(|i| {
                let x = (i as f64 - n as f64) / sigma;
                (-0.5 * x * x).exp()
            })
            .collect();
        let total: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= total;
        }

        Ok(Self { sigma, n, weights })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Number of steps in one half of the kernel.
    pub fn half_width(&self) -> usize {
        self.n
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_sigma_two_nsig_has_five_symmetric_weights() {
        let k = Kernel::new(1.0, 2.0, 1).unwrap();
        assert_eq!(k.half_width(), 2);
        assert_eq!(k.weights().len(), 5);
        let sum: f64 = k.weights().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert_eq!(k.weights()[0], k.weights()[4]);
        assert_eq!(k.weights()[1], k.weights()[3]);
        assert!(k.weights()[2] > k.weights()[1]);
    }

    #[test]
    fn weights_sum_to_one_and_are_symmetric_for_many_widths() {
        for &sigma in &[0.3, 0.5, 1.0, 1.7, 3.0, 9.0] {
            for &nsig in &[1.0, 2.5, 3.0, 4.0] {
                let k = Kernel::new(sigma, nsig, 1).unwrap();
                let w = k.weights();
                let n = k.half_width();
                assert_eq!(w.len(), 2 * n + 1);
                let sum: f64 = w.iter().sum();
                assert!((sum - 1.0).abs() < 1e-12, "sigma={sigma} nsig={nsig} sum={sum}");
                for i in 0..w.len() {
                    assert_eq!(w[i], w[2 * n - i]);
                }
            }
        }
    }

    #[test]
    fn half_width_is_a_multiple_of_downsample() {
        let k = Kernel::new(1.4, 3.0, 3).unwrap();
        // ceil(3 * 1.4 / 3) * 3 = 2 * 3
        assert_eq!(k.half_width(), 6);
        assert_eq!(k.half_width() % 3, 0);
    }

    #[test]
    fn rejects_non_positive_sigma() {
        assert!(Kernel::new(0.0, 3.0, 1).is_err());
        assert!(Kernel::new(-1.0, 3.0, 1).is_err());
        assert!(Kernel::new(f64::NAN, 3.0, 1).is_err());
        assert!(Kernel::new(1.0, 3.0, 0).is_err());
    }
}
