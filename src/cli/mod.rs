//! CLI argument definitions for Waypoint.

use crate::storage::BackendType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Waypoint - closed-loop mission orchestration.
///
/// Feed a case readiness snapshot with `wp upsert`, inspect the result with
/// `wp show`, and steer the loop with `wp pause`, `wp resume` and `wp approve`.
#[derive(Parser, Debug)]
#[command(name = "wp")]
#[command(author, version, long_version = long_version(), about = "Plan, gate, execute and verify a mission from case readiness", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Directory holding the mission store, config.kdl and action.log.
    /// Defaults to WP_DATA_DIR, then the platform data directory.
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Storage backend: sqlite, file or memory
    #[arg(long, global = true, value_parser = parse_backend)]
    pub backend: Option<BackendType>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild the mission from a case snapshot and run a cycle unless paused
    Upsert {
        /// Case snapshot JSON file, or "-" for stdin
        #[arg(long = "case")]
        case: String,

        /// Execute even if autonomy is paused
        #[arg(long)]
        force: bool,
    },

    /// Rebuild the mission and run a cycle regardless of the pause flag
    Run {
        /// Case snapshot JSON file, or "-" for stdin
        #[arg(long = "case")]
        case: String,
    },

    /// Pause the autonomous loop
    Pause,

    /// Resume the autonomous loop
    Resume,

    /// Approve every task held for review
    Approve,

    /// Show the current mission snapshot
    Show,

    /// Show the append-only decision log
    Decisions {
        /// Only entries for this task ID
        #[arg(long)]
        task: Option<String>,
    },

    /// Delete the mission snapshot
    Clear,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration and where each value came from
    Show,

    /// Write config.kdl with the current resolved values
    Init {
        /// Overwrite an existing config.kdl
        #[arg(long)]
        force: bool,
    },
}

fn parse_backend(s: &str) -> Result<BackendType, String> {
    BackendType::parse(s).ok_or_else(|| format!("unknown backend '{}' (sqlite, file, memory)", s))
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\nbuilt: ",
        env!("WP_BUILD_TIMESTAMP"),
        "\ncommit: ",
        env!("WP_GIT_COMMIT")
    )
}
