//! `cluster-membership` library crate.
//!
//! The binary (`cmem`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the grid and likelihood engines are reusable from other drivers
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod grid;
pub mod io;
pub mod likelihood;
pub mod math;
pub mod report;
