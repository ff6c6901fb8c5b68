//! Membership likelihood engine.
//!
//! - `background`: field-star density per observation
//! - `evaluate`: corrected cluster model density per observation
//! - `mixture`: single-weight MLE and the profiled two-weight surface

pub mod background;
pub mod evaluate;
pub mod mixture;

pub use background::*;
pub use evaluate::*;
pub use mixture::*;
