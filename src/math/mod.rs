//! Mathematical building blocks: Gaussian kernels, spline interpolation and
//! bounded one-dimensional solvers.

pub mod kernel;
pub mod solve;
pub mod spline;

pub use kernel::*;
pub use solve::*;
pub use spline::*;
