//! Synthetic data generation.
//!
//! `synthetic` draws seeded mixed cluster/field catalogs from a population
//! grid, for recovery tests and the `simulate` command.

pub mod synthetic;

pub use synthetic::*;
