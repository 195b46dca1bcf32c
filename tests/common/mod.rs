//! Common test utilities for waypoint integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/waypoint/` directory.

#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::Value;
pub use tempfile::TempDir;

/// A test environment with an isolated data directory.
///
/// The `wp()` method returns a `Command` that sets `WP_DATA_DIR` per
/// invocation, making tests parallel-safe.
pub struct TestEnv {
    pub data_dir: TempDir,
    pub work_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
            work_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the wp binary with isolated data directory.
    pub fn wp(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_wp"));
        cmd.current_dir(self.work_dir.path());
        cmd.env("WP_DATA_DIR", self.data_dir.path());
        cmd.env_remove("WP_BACKEND");
        cmd.env_remove("WP_LOG");
        cmd
    }

    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }

    /// Write a case snapshot file and return its path.
    pub fn write_case(&self, name: &str, case: &Value) -> String {
        let path = self.work_dir.path().join(name);
        std::fs::write(&path, serde_json::to_string_pretty(case).unwrap()).unwrap();
        path.to_string_lossy().to_string()
    }

    /// Run `args` expecting success and parse stdout as JSON.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self.wp().args(args).assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// A case snapshot as the intake layer would send it.
pub fn case_json(readiness: i64, gaps: u64) -> Value {
    serde_json::json!({
        "organization_name": "Acme Holdings",
        "narrative": "Board needs a go/no-go on the regional expansion.",
        "objectives": "Decide on expansion",
        "constraints": "Budget cap; Q3 deadline",
        "target_audience": "Board of directors",
        "decision_deadline": "2026-12-01",
        "readiness_score": readiness,
        "critical_gap_count": gaps,
        "top_critical_gap": if gaps > 0 { Value::from("Missing market sizing") } else { Value::Null },
        "recommended_titles": ["Expansion memo", "Risk register", "Financial model"]
    })
}
