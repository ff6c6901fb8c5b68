//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env`, sets up logging and resolves the cluster config
//! - parses CLI arguments and dispatches commands
//! - prints reports
//! - writes optional exports

use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};

use crate::cli::{Cli, Command, CorrectArgs, MleArgs, SimulateArgs, SurfaceArgs};
use crate::data::{SyntheticSpec, simulate_catalog};
use crate::domain::ClusterConfig;
use crate::error::AppError;
use crate::io::{
    load_config, read_catalog_csv, read_grid_json, write_catalog_csv, write_grid_json, write_mle_json,
    write_surface_csv, write_surface_json,
};

pub mod pipeline;

pub const LOG_ENV: &str = "CMEM_LOG";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Entry point for the `cmem` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _logger = setup_logging(cli.log_level.as_deref())?;
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Correct(args) => handle_correct(args, &config),
        Command::Mle(args) => handle_mle(args, &config),
        Command::Surface(args) => {
            if let Some(n) = args.weight_steps {
                config.weight_steps = n;
                config.validate()?;
            }
            handle_surface(args, &config)
        }
        Command::Simulate(args) => handle_simulate(args, &config),
    }
}

/// Start the stderr logger: `--log-level`, then `$CMEM_LOG`, then `info`.
///
/// The handle must be kept alive for the rest of the run.
pub fn setup_logging(level: Option<&str>) -> Result<LoggerHandle, AppError> {
    let spec = level
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    Logger::try_with_str(&spec)
        .map_err(|e| AppError::invalid(format!("Invalid log level '{spec}': {e}")))?
        .log_to_stderr()
        .start()
        .map_err(|e| AppError::io(format!("Logger initialization failed: {e}")))
}

fn handle_correct(args: CorrectArgs, config: &ClusterConfig) -> Result<(), AppError> {
    let grid = read_grid_json(&args.grid)?;
    let grid = pipeline::correct_grid(grid, config, !args.no_normalize)?;
    print!("{}", crate::report::format_corrections(&grid, config));
    write_grid_json(&args.out, &grid)?;
    log::info!("wrote corrected grid to {}", args.out.display());
    Ok(())
}

fn handle_mle(args: MleArgs, config: &ClusterConfig) -> Result<(), AppError> {
    let loaded = read_catalog_csv(&args.catalog, config)?;
    let mut populations = pipeline::load_populations(std::slice::from_ref(&args.grid), config)?;
    let population = populations
        .pop()
        .ok_or_else(|| AppError::invalid("No population grid loaded."))?;

    print!(
        "{}",
        crate::report::format_catalog_summary(&loaded.catalog, &loaded.row_errors, config)
    );
    let run = pipeline::run_mle(&population, &loaded.catalog, config, args.uniform_background)?;
    print!("{}", crate::report::format_mle_summary(&run.result));
    log::info!("maximum absolute de-normalization: {:.3e}", run.max_delta_p);

    if let Some(path) = &args.export {
        write_mle_json(path, &run.result, run.age, run.metallicity)?;
    }
    Ok(())
}

fn handle_surface(args: SurfaceArgs, config: &ClusterConfig) -> Result<(), AppError> {
    let loaded = read_catalog_csv(&args.catalog, config)?;
    let populations = pipeline::load_populations(&args.grids, config)?;

    print!(
        "{}",
        crate::report::format_catalog_summary(&loaded.catalog, &loaded.row_errors, config)
    );
    let run = pipeline::run_surface(&populations, &loaded.catalog, config)?;
    log::info!("maximum absolute de-normalization: {:.3e}", run.max_delta_p);

    print!("{}", crate::report::format_surface_summary(&run.surface));
    if args.top > 0 {
        print!("{}", crate::report::format_top_cells(&run.surface, args.top));
    }

    if let Some(path) = &args.export {
        let is_json = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            write_surface_json(path, &run.surface)?;
        } else {
            write_surface_csv(path, &run.surface)?;
        }
        log::info!("wrote surface to {}", path.display());
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs, config: &ClusterConfig) -> Result<(), AppError> {
    let grid = read_grid_json(&args.grid)?;
    pipeline::check_grid(&grid, config)?;
    let spec = SyntheticSpec {
        n_stars: args.stars,
        cluster_fraction: args.fraction,
        error_scale: args.error_scale,
        seed: args.seed,
    };
    let sim = simulate_catalog(&grid, config, &spec)?;
    write_catalog_csv(&args.out, &sim.catalog)?;
    println!(
        "Simulated {} stars, member fraction {:.4} -> {}",
        sim.catalog.len(),
        sim.member_fraction(),
        args.out.display()
    );
    Ok(())
}
