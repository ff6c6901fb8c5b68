//! Reporting utilities: terminal summaries of catalogs, grids and
//! likelihood results.

pub mod format;

pub use format::*;
