//! Command implementations for the `wp` CLI.
//!
//! Each command returns a result type implementing [`Output`], which the
//! binary prints as JSON or, with `-H`, as human-readable text.

use crate::autonomy::{MissionGraph, UpsertOptions};
use crate::config::{ResolvedConfig, WaypointConfig, config_path, write_config};
use crate::models::{CaseSnapshot, GovernanceDecision, MissionSnapshot, Verdict};
use crate::storage::MissionStore;
use crate::{Error, Result};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Open the mission graph described by `config`.
pub fn open_graph(config: &ResolvedConfig) -> Result<MissionGraph> {
    std::fs::create_dir_all(config.data_dir())?;
    let backend = config.backend().open(config.data_dir())?;
    tracing::debug!(
        backend = %config.backend(),
        location = %backend.location(),
        "opened mission store"
    );
    Ok(MissionGraph::new(MissionStore::new(backend)).with_settings(config.engine_settings()))
}

/// Read a case snapshot from a JSON file, or stdin when `source` is "-".
pub fn read_case(source: &str) -> Result<CaseSnapshot> {
    let content = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source)
            .map_err(|e| Error::InvalidInput(format!("cannot read case file {}: {}", source, e)))?
    };
    serde_json::from_str(&content)
        .map_err(|e| Error::InvalidInput(format!("invalid case snapshot: {}", e)))
}

// === Mission commands ===

/// The mission snapshot after a command, or `None` if no mission exists.
#[derive(Serialize)]
#[serde(transparent)]
pub struct SnapshotResult {
    pub snapshot: Option<MissionSnapshot>,
}

impl Output for SnapshotResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let Some(ref s) = self.snapshot else {
            return "No mission yet. Run `wp upsert --case <file>` to start one.".to_string();
        };

        let mut lines = vec![
            format!("Mission {} [{}]", s.mission.mission_id, s.mission.status),
            format!("  Objective: {}", s.mission.objective),
            format!("  Horizon: {}", s.mission.horizon),
            format!(
                "  Governance: {}{}",
                s.governance_status,
                if s.autonomy_paused { " (autonomy paused)" } else { "" }
            ),
            format!("  Next review: {}", s.next_review_at.format("%Y-%m-%d %H:%M UTC")),
            String::new(),
            format!("Plan ({} tasks, {} in flight):", s.active_plan.len(), s.in_flight_tasks.len()),
        ];
        for task in &s.active_plan {
            let verdict = s
                .decision_for(&task.task_id)
                .map(|d| d.decision.to_string())
                .unwrap_or_else(|| "undecided".to_string());
            lines.push(format!(
                "  {} {} [{}] risk {} base {} ({})",
                task.task_id,
                task.kind,
                task.status,
                task.risk_score,
                task.projected_base(),
                verdict
            ));
        }
        if let Some(ref summary) = s.verification_summary {
            lines.push(String::new());
            lines.push(format!(
                "Verification: adaptation {:.1}{}",
                summary.adaptation_score,
                if summary.requires_replan { ", replan required" } else { "" }
            ));
            for signal in &summary.replan_signals {
                lines.push(format!("  ! {}", signal));
            }
            for adjustment in &summary.strategy_adjustments {
                lines.push(format!("  > {}", adjustment));
            }
        }
        lines.push(String::new());
        lines.push(format!(
            "History: {} outcomes, {} runs",
            s.latest_outcomes.len(),
            s.execution_records.len()
        ));
        lines.join("\n")
    }
}

/// Upsert the mission from a case file.
pub fn upsert(graph: &mut MissionGraph, case_source: &str, force_run: bool) -> Result<SnapshotResult> {
    let case = read_case(case_source)?;
    let snapshot = graph.upsert_from_case_input(&case, UpsertOptions { force_run })?;
    Ok(SnapshotResult {
        snapshot: Some(snapshot),
    })
}

/// Upsert and execute regardless of the pause flag.
pub fn run(graph: &mut MissionGraph, case_source: &str) -> Result<SnapshotResult> {
    let case = read_case(case_source)?;
    Ok(SnapshotResult {
        snapshot: Some(graph.run_cycle_from_case_input(&case)?),
    })
}

pub fn set_paused(graph: &mut MissionGraph, paused: bool) -> Result<SnapshotResult> {
    Ok(SnapshotResult {
        snapshot: graph.set_autonomy_paused(paused)?,
    })
}

pub fn approve(graph: &mut MissionGraph) -> Result<SnapshotResult> {
    Ok(SnapshotResult {
        snapshot: graph.approve_manual_tasks()?,
    })
}

pub fn show(graph: &MissionGraph) -> Result<SnapshotResult> {
    Ok(SnapshotResult {
        snapshot: graph.snapshot()?,
    })
}

// === Decision log ===

#[derive(Serialize)]
pub struct DecisionLogResult {
    pub count: usize,
    pub entries: Vec<GovernanceDecision>,
}

impl Output for DecisionLogResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No decisions recorded.".to_string();
        }
        let mut lines = vec![format!("{} decision(s):", self.count)];
        for d in &self.entries {
            let marker = match d.decision {
                Verdict::Approved => "+",
                Verdict::Rejected => "x",
                Verdict::ReviewRequired => "?",
            };
            lines.push(format!(
                "  {} {} {} {} by {}",
                d.timestamp.format("%Y-%m-%d %H:%M:%S"),
                marker,
                d.task_id,
                d.decision,
                d.reviewer
            ));
            if let Some(reason) = d.reasons.last() {
                lines.push(format!("      {}", reason));
            }
        }
        lines.join("\n")
    }
}

/// List the decision log, optionally for one task.
pub fn decisions(graph: &MissionGraph, task: Option<&str>) -> Result<DecisionLogResult> {
    let entries: Vec<GovernanceDecision> = graph
        .snapshot()?
        .map(|s| s.decision_log)
        .unwrap_or_default()
        .into_iter()
        .filter(|d| task.is_none_or(|id| d.task_id == id))
        .collect();
    Ok(DecisionLogResult {
        count: entries.len(),
        entries,
    })
}

// === Clear ===

#[derive(Serialize)]
pub struct ClearResult {
    pub cleared: bool,
    pub location: String,
}

impl Output for ClearResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.cleared {
            format!("Cleared mission snapshot from {}", self.location)
        } else {
            "No mission snapshot to clear.".to_string()
        }
    }
}

pub fn clear(graph: &mut MissionGraph) -> Result<ClearResult> {
    let cleared = graph.clear()?;
    Ok(ClearResult {
        cleared,
        location: graph.store().location(),
    })
}

// === Config ===

#[derive(Serialize)]
#[serde(transparent)]
pub struct ConfigShowResult {
    pub config: ResolvedConfig,
}

impl Output for ConfigShowResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let c = &self.config;
        [
            format!("data-dir: {} ({})", c.data_dir.value.display(), c.data_dir.source),
            format!("backend: {} ({})", c.backend.value, c.backend.source),
            format!("history-limit: {} ({})", c.history_limit.value, c.history_limit.source),
            format!(
                "review-interval-hours: {} ({})",
                c.review_interval_hours.value, c.review_interval_hours.source
            ),
            format!(
                "decision-log-limit: {} ({})",
                c.decision_log_limit.value, c.decision_log_limit.source
            ),
            format!("log-level: {} ({})", c.log_level.value, c.log_level.source),
            format!("log-format: {} ({})", c.log_format.value, c.log_format.source),
            format!("action-log: {} ({})", c.action_log.value, c.action_log.source),
        ]
        .join("\n")
    }
}

pub fn config_show(config: &ResolvedConfig) -> ConfigShowResult {
    ConfigShowResult {
        config: config.clone(),
    }
}

#[derive(Serialize)]
pub struct ConfigInitResult {
    pub path: PathBuf,
    pub written: bool,
}

impl Output for ConfigInitResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.written {
            format!("Wrote {}", self.path.display())
        } else {
            format!("{} already exists (use --force to overwrite)", self.path.display())
        }
    }
}

/// Write config.kdl holding the resolved values.
pub fn config_init(config: &ResolvedConfig, force: bool) -> Result<ConfigInitResult> {
    let data_dir: &Path = config.data_dir();
    let path = config_path(data_dir);
    if path.exists() && !force {
        return Ok(ConfigInitResult {
            path,
            written: false,
        });
    }

    let file = WaypointConfig {
        backend: Some(config.backend.value.as_str().to_string()),
        history_limit: Some(config.history_limit.value),
        review_interval_hours: Some(config.review_interval_hours.value),
        decision_log_limit: Some(config.decision_log_limit.value),
        log_level: Some(config.log_level.value.clone()),
        log_format: Some(config.log_format.value),
        action_log: Some(config.action_log.value),
    };
    let path = write_config(data_dir, &file)?;
    Ok(ConfigInitResult {
        path,
        written: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestEnv, sample_case};

    fn graph() -> MissionGraph {
        MissionGraph::new(MissionStore::in_memory())
    }

    fn write_case(env: &TestEnv, readiness: i32, gaps: u32) -> String {
        let path = env.data_path().join("case.json");
        let json = serde_json::to_string(&sample_case(readiness, gaps)).unwrap();
        std::fs::write(&path, json).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_read_case_rejects_bad_json() {
        let env = TestEnv::new();
        let path = env.data_path().join("bad.json");
        std::fs::write(&path, "{ nope").unwrap();
        let err = read_case(&path.to_string_lossy()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_read_case_missing_file() {
        assert!(matches!(
            read_case("/nonexistent/case.json"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_partial_case_uses_defaults() {
        let env = TestEnv::new();
        let path = env.data_path().join("partial.json");
        std::fs::write(&path, r#"{"readiness_score": 75}"#).unwrap();
        let case = read_case(&path.to_string_lossy()).unwrap();
        assert_eq!(case.readiness_score, 75);
        assert_eq!(case.critical_gap_count, 0);
        assert!(case.recommended_titles.is_empty());
    }

    #[test]
    fn test_show_without_mission_prints_null() {
        let result = show(&graph()).unwrap();
        assert_eq!(result.to_json(), "null");
        assert!(result.to_human().contains("No mission yet"));
    }

    #[test]
    fn test_upsert_then_filter_decisions() {
        let env = TestEnv::new();
        let case = write_case(&env, 90, 0);
        let mut graph = graph();
        let result = upsert(&mut graph, &case, false).unwrap();
        let snapshot = result.snapshot.as_ref().unwrap();
        assert!(result.to_human().contains("Governance: green"));

        let all = decisions(&graph, None).unwrap();
        assert_eq!(all.count, 3);

        let task_id = snapshot.active_plan[0].task_id.clone();
        let one = decisions(&graph, Some(&task_id)).unwrap();
        assert_eq!(one.count, 1);
        assert_eq!(one.entries[0].task_id, task_id);
    }

    #[test]
    fn test_clear_reports_whether_anything_existed() {
        let env = TestEnv::new();
        let case = write_case(&env, 90, 0);
        let mut graph = graph();
        assert!(!clear(&mut graph).unwrap().cleared);
        upsert(&mut graph, &case, false).unwrap();
        assert!(clear(&mut graph).unwrap().cleared);
        assert!(show(&graph).unwrap().snapshot.is_none());
    }

    #[test]
    fn test_clear_counts_undecodable_snapshot() {
        use crate::storage::{KeyValueStore, MemoryStore, MissionStore, SNAPSHOT_KEY};

        let mut backend = MemoryStore::new();
        backend.set(SNAPSHOT_KEY, b"{truncated").unwrap();
        let mut graph = MissionGraph::new(MissionStore::new(Box::new(backend)));
        assert!(show(&graph).unwrap().snapshot.is_none());

        assert!(clear(&mut graph).unwrap().cleared);
        assert!(!clear(&mut graph).unwrap().cleared);
    }

    #[test]
    fn test_pause_without_mission_is_null() {
        let result = set_paused(&mut graph(), true).unwrap();
        assert!(result.snapshot.is_none());
    }
}
