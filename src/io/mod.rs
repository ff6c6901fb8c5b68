//! Input/output helpers.
//!
//! - density grid JSON read/write (`grid_file`)
//! - catalog CSV ingest + validation (`catalog`)
//! - cluster config JSON (`config`)
//! - likelihood exports (CSV/JSON) (`export`)

pub mod catalog;
pub mod config;
pub mod export;
pub mod grid_file;

pub use catalog::*;
pub use config::*;
pub use export::*;
pub use grid_file::*;
