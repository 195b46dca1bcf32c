//! Action logging for operator commands.
//!
//! Every `wp` invocation appends one JSON line to `action.log` in the data
//! directory, unless `action-log #false` is configured.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the action log inside the data directory.
pub const ACTION_LOG_FILE: &str = "action.log";

/// Represents a single action log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    pub timestamp: DateTime<Utc>,

    /// Command name (e.g., "upsert", "approve", "config show")
    pub command: String,

    /// Command arguments as JSON
    pub args: serde_json::Value,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: u64,

    /// User who executed the command
    pub user: String,
}

impl ActionLog {
    pub fn new(
        command: &str,
        args: serde_json::Value,
        success: bool,
        error: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            command: command.to_string(),
            args: sanitize_args(&args),
            success,
            error,
            duration_ms,
            user: current_user(),
        }
    }
}

/// Path of the action log inside `data_dir`.
pub fn log_path(data_dir: &Path) -> PathBuf {
    data_dir.join(ACTION_LOG_FILE)
}

/// Append `entry` to the action log in `data_dir`.
///
/// Logging never fails a command: write errors are reported as warnings.
pub fn log_action(data_dir: &Path, entry: &ActionLog) {
    let path = log_path(data_dir);
    if let Err(e) = write_log_entry(&path, entry) {
        tracing::warn!(path = %path.display(), error = %e, "failed to write action log");
    }
}

/// Read every entry from the action log in `data_dir`, skipping malformed lines.
pub fn read_actions(data_dir: &Path) -> crate::Result<Vec<ActionLog>> {
    let content = match fs::read_to_string(log_path(data_dir)) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}

fn write_log_entry(path: &Path, entry: &ActionLog) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", json)?;
    Ok(())
}

/// Reduce arguments to what is safe and useful to keep.
///
/// Paths become their file name and long strings are truncated.
fn sanitize_args(args: &serde_json::Value) -> serde_json::Value {
    match args {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), sanitize_args(value)))
                .collect(),
        ),
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sanitize_args).collect())
        }
        serde_json::Value::String(s) => {
            let base = s.rsplit(['/', '\\']).next().unwrap_or(s);
            if base.chars().count() > 100 {
                let head: String = base.chars().take(97).collect();
                serde_json::Value::String(format!("{}... ({} chars)", head, base.chars().count()))
            } else {
                serde_json::Value::String(base.to_string())
            }
        }
        _ => args.clone(),
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
