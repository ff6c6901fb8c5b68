//! Cluster configuration JSON.
//!
//! The path comes from `--config`, falling back to `CMEM_CONFIG` (which may
//! be set in a `.env` file). With neither, the built-in defaults are used.
//! Missing keys in the file also fall back to defaults.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::domain::ClusterConfig;
use crate::error::AppError;

pub const CONFIG_ENV: &str = "CMEM_CONFIG";

/// Resolve and load the run configuration.
pub fn load_config(path: Option<&Path>) -> Result<ClusterConfig, AppError> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let config = match path {
        Some(p) => {
            let config = read_config_json(&p)?;
            log::info!("config: {}", p.display());
            config
        }
        None => {
            log::info!("config: built-in defaults");
            ClusterConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}

pub fn read_config_json(path: &Path) -> Result<ClusterConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open config JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::io(format!("Invalid config JSON '{}': {e}", path.display())))
}
