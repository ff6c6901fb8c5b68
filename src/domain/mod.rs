//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observations (`Measurement`, `Star`, `Catalog`)
//! - run configuration (`ClusterConfig`)
//! - likelihood outputs (`MleResult`, `LikelihoodSurface`)

pub mod types;

pub use types::*;
