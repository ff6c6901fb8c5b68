//! Command-line parsing for the cluster membership likelihood tools.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the grid/likelihood code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cmem", version, about = "Cluster membership likelihoods on density grids")]
pub struct Cli {
    /// Cluster config JSON (defaults to $CMEM_CONFIG, then built-in values).
    #[arg(long, global = true, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Log level or filter spec (defaults to $CMEM_LOG, then `info`).
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Normalize a population grid and fit its correction models.
    Correct(CorrectArgs),
    /// Fit the cluster fraction for a single population.
    Mle(MleArgs),
    /// Profile the likelihood over the weights of three populations.
    Surface(SurfaceArgs),
    /// Draw a synthetic catalog from a population grid.
    Simulate(SimulateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CorrectArgs {
    /// Input grid JSON.
    #[arg(long, value_name = "JSON")]
    pub grid: PathBuf,

    /// Output grid JSON with correction models attached.
    #[arg(long, value_name = "JSON")]
    pub out: PathBuf,

    /// Fit corrections without renormalizing first.
    #[arg(long)]
    pub no_normalize: bool,
}

#[derive(Debug, Args, Clone)]
pub struct MleArgs {
    /// Population grid JSON.
    #[arg(long, value_name = "JSON")]
    pub grid: PathBuf,

    /// Catalog CSV.
    #[arg(long, value_name = "CSV")]
    pub catalog: PathBuf,

    /// Use a flat 1/volume background instead of the boundary-aware model.
    #[arg(long)]
    pub uniform_background: bool,

    /// Export the result to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SurfaceArgs {
    /// Population grid JSONs, in order: w0 population, middle, w1 population.
    #[arg(long = "grid", value_name = "JSON", num_args = 3, required = true)]
    pub grids: Vec<PathBuf>,

    /// Catalog CSV.
    #[arg(long, value_name = "CSV")]
    pub catalog: PathBuf,

    /// Points per weight axis (overrides the config).
    #[arg(long)]
    pub weight_steps: Option<usize>,

    /// Show the N best cells.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export the surface; `.json` writes the full grid, anything else CSV.
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Population grid JSON to draw cluster members from.
    #[arg(long, value_name = "JSON")]
    pub grid: PathBuf,

    /// Output catalog CSV.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    /// Number of stars.
    #[arg(short = 'n', long, default_value_t = 1000)]
    pub stars: usize,

    /// Fraction of cluster members.
    #[arg(long, default_value_t = 0.5)]
    pub fraction: f64,

    /// Measurement errors as a multiple of the floor standard deviations.
    #[arg(long, default_value_t = 1.5)]
    pub error_scale: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}
