//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`WP_DATA_DIR`, `WP_BACKEND`, `WP_LOG`)
//! 3. `config.kdl` in the data directory
//! 4. Built-in defaults

use crate::autonomy::EngineSettings;
use crate::autonomy::mission_graph::MAX_HISTORY;
use crate::config::schema::MAX_REVIEW_INTERVAL_HOURS;
use crate::config::{LogFormat, read_config};
use crate::storage::{BackendType, DATA_DIR_ENV};
use crate::{Error, Result};
use serde::{Serialize, Serializer};
use std::path::PathBuf;

/// Environment variable selecting the storage backend.
pub const BACKEND_ENV: &str = "WP_BACKEND";

/// Environment variable holding the tracing filter.
pub const LOG_ENV: &str = "WP_LOG";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from environment variable
    EnvVar(String),
    /// Value from config.kdl
    ConfigFile,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ConfigFile => write!(f, "config"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub data_dir: Resolved<PathBuf>,
    #[serde(serialize_with = "serialize_backend")]
    pub backend: Resolved<BackendType>,
    pub history_limit: Resolved<u32>,
    pub review_interval_hours: Resolved<u32>,
    pub decision_log_limit: Resolved<u32>,
    pub log_level: Resolved<String>,
    pub log_format: Resolved<LogFormat>,
    pub action_log: Resolved<bool>,
}

fn serialize_backend<S: Serializer>(
    backend: &Resolved<BackendType>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    Resolved::new(backend.value.as_str(), backend.source.clone()).serialize(serializer)
}

impl ResolvedConfig {
    /// Defaults rooted at `data_dir`.
    fn with_data_dir(data_dir: Resolved<PathBuf>) -> Self {
        let defaults = EngineSettings::default();
        Self {
            data_dir,
            backend: Resolved::new(BackendType::default(), ValueSource::Default),
            history_limit: Resolved::new(
                u32::try_from(defaults.history_limit).unwrap_or(u32::MAX),
                ValueSource::Default,
            ),
            review_interval_hours: Resolved::new(
                u32::try_from(defaults.review_interval.num_hours()).unwrap_or(6),
                ValueSource::Default,
            ),
            decision_log_limit: Resolved::new(
                u32::try_from(defaults.decision_log_limit).unwrap_or(u32::MAX),
                ValueSource::Default,
            ),
            log_level: Resolved::new("warn".to_string(), ValueSource::Default),
            log_format: Resolved::new(LogFormat::Text, ValueSource::Default),
            action_log: Resolved::new(true, ValueSource::Default),
        }
    }

    /// Engine limits derived from this configuration.
    ///
    /// History is capped at [`MAX_HISTORY`] even when the file asks for more.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            history_limit: (self.history_limit.value as usize).min(MAX_HISTORY),
            review_interval: chrono::Duration::hours(i64::from(
                self.review_interval_hours
                    .value
                    .min(MAX_REVIEW_INTERVAL_HOURS),
            )),
            decision_log_limit: self.decision_log_limit.value as usize,
        }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir.value
    }

    pub fn backend(&self) -> BackendType {
        self.backend.value
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub backend: Option<BackendType>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = Some(backend);
        self
    }
}

/// Resolve configuration with the full precedence chain.
///
/// The data directory is resolved first since config.kdl lives inside it.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let mut result = ResolvedConfig::with_data_dir(resolve_data_dir(overrides)?);
    let file = read_config(result.data_dir())?;

    // Resolve backend
    if let Some(backend) = overrides.backend {
        result.backend = Resolved::new(backend, ValueSource::CliFlag);
    } else if let Some(raw) = non_empty_env(BACKEND_ENV) {
        let backend = BackendType::parse(&raw).ok_or_else(|| {
            Error::Config(format!("{} has unknown backend \"{}\"", BACKEND_ENV, raw))
        })?;
        result.backend = Resolved::new(backend, ValueSource::EnvVar(BACKEND_ENV.to_string()));
    } else if let Some(backend) = file.backend_type() {
        result.backend = Resolved::new(backend, ValueSource::ConfigFile);
    }

    // Resolve log level
    if let Some(level) = non_empty_env(LOG_ENV) {
        result.log_level = Resolved::new(level, ValueSource::EnvVar(LOG_ENV.to_string()));
    } else if let Some(level) = file.log_level {
        result.log_level = Resolved::new(level, ValueSource::ConfigFile);
    }

    // File-only values
    if let Some(limit) = file.history_limit {
        result.history_limit = Resolved::new(limit, ValueSource::ConfigFile);
    }
    if let Some(hours) = file.review_interval_hours {
        result.review_interval_hours = Resolved::new(hours, ValueSource::ConfigFile);
    }
    if let Some(limit) = file.decision_log_limit {
        result.decision_log_limit = Resolved::new(limit, ValueSource::ConfigFile);
    }
    if let Some(format) = file.log_format {
        result.log_format = Resolved::new(format, ValueSource::ConfigFile);
    }
    if let Some(enabled) = file.action_log {
        result.action_log = Resolved::new(enabled, ValueSource::ConfigFile);
    }

    Ok(result)
}

fn resolve_data_dir(overrides: &ConfigOverrides) -> Result<Resolved<PathBuf>> {
    if let Some(ref dir) = overrides.data_dir {
        return Ok(Resolved::new(dir.clone(), ValueSource::CliFlag));
    }
    if let Some(dir) = non_empty_env(DATA_DIR_ENV) {
        return Ok(Resolved::new(
            PathBuf::from(dir),
            ValueSource::EnvVar(DATA_DIR_ENV.to_string()),
        ));
    }
    let base = dirs::data_dir()
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?;
    Ok(Resolved::new(base.join("waypoint"), ValueSource::Default))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
