//! Discretized probability densities and their boundary corrections.
//!
//! - `density`: the grid itself (convolution, integration, normalization,
//!   point evaluation)
//! - `correction`: per-axis leakage models fit by convolve-and-reintegrate

pub mod correction;
pub mod density;

pub use correction::*;
pub use density::*;
