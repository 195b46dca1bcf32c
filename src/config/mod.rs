//! Configuration for Waypoint.
//!
//! Settings live in `config.kdl` inside the data directory:
//! - Default: `~/.local/share/waypoint/config.kdl`
//! - Overridden by `--data-dir` or `WP_DATA_DIR`
//!
//! A missing file means all defaults. A file that fails to parse or validate
//! is an error rather than being silently ignored.
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    BACKEND_ENV, ConfigOverrides, LOG_ENV, Resolved, ResolvedConfig, ValueSource, resolve_config,
};
pub use schema::{CONFIG_FILE_NAME, LogFormat, WaypointConfig};

use crate::{Error, Result};
use kdl::KdlDocument;
use std::path::{Path, PathBuf};

/// Path of config.kdl inside `data_dir`.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

/// Read and validate config.kdl from `data_dir`.
pub fn read_config(data_dir: &Path) -> Result<WaypointConfig> {
    let path = config_path(data_dir);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(WaypointConfig::default());
        }
        Err(e) => return Err(e.into()),
    };

    let doc: KdlDocument = content
        .parse()
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    let config = WaypointConfig::from_kdl(&doc)
        .and_then(|config| config.validate().map(|()| config))
        .map_err(|msg| Error::Config(format!("{}: {}", path.display(), msg)))?;
    Ok(config)
}

/// Write `config` to config.kdl in `data_dir`, creating the directory.
pub fn write_config(data_dir: &Path, config: &WaypointConfig) -> Result<PathBuf> {
    config.validate().map_err(Error::Config)?;
    std::fs::create_dir_all(data_dir)?;

    let mut doc = config.to_kdl();
    doc.autoformat();
    let path = config_path(data_dir);
    std::fs::write(&path, doc.to_string())?;
    Ok(path)
}
