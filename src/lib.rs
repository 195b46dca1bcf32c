//! Waypoint - A closed-loop mission orchestration library.
//!
//! This library provides the core functionality for the `wp` CLI tool:
//! goal derivation, risk-scored task planning with outcome projection,
//! governance gating, simulated execution, and outcome verification that
//! feeds back into replanning.

pub mod action_log;
pub mod autonomy;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod storage;

/// Library-level error type for Waypoint operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The stored snapshot changed since it was loaded.
    #[error("Stale write: expected snapshot version {expected:?}, found {found:?}")]
    StaleWrite {
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Waypoint operations.
pub type Result<T> = std::result::Result<T, Error>;
