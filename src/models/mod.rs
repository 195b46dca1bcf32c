//! Data models for Waypoint entities.
//!
//! This module defines the core data structures:
//! - `CaseSnapshot` - Readiness input supplied fresh on every cycle
//! - `Mission` - The objective container, recomputed on every upsert
//! - `Goal` - Prioritized sub-outcomes of the mission
//! - `ActionTask` - Planned units of work with a projection and approval mode
//! - `GovernanceDecision` - Policy verdict gating execution
//! - `ExecutionRecord` / `OutcomeRecord` - What ran and how it compared to expectation
//! - `VerificationSummary` - Cycle health and replan signals
//! - `MissionSnapshot` - The aggregate root persisted as one unit

pub mod case;

pub use case::CaseSnapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Mission lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissionStatus {
    #[default]
    Draft,
    Active,
    Blocked,
    Completed,
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MissionStatus::Draft => "draft",
            MissionStatus::Active => "active",
            MissionStatus::Blocked => "blocked",
            MissionStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// Goal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalStatus {
    #[default]
    Pending,
    InProgress,
    Blocked,
    Completed,
}

/// Action task status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Ready,
    /// Declared for asynchronous execution; no component assigns it yet
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Returns true if a task in this status counts as in flight.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TaskStatus::Running | TaskStatus::Ready)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ready => "ready",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// How much human involvement a task needs before it may run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalMode {
    Auto,
    #[default]
    Conditional,
    Manual,
}

/// The kind of work an action task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Close the outstanding critical gaps
    GapResolution,
    /// Validate that the report path is clear
    ReportPreflight,
    /// Back recommendations with stronger evidence
    EvidenceStrengthening,
    /// Rebalance the plan after a failed verification
    StrategyRecalibration,
}

impl TaskKind {
    /// Get the string tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::GapResolution => "gap-resolution",
            TaskKind::ReportPreflight => "report-preflight",
            TaskKind::EvidenceStrengthening => "evidence-strengthening",
            TaskKind::StrategyRecalibration => "strategy-recalibration",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Governance verdict for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Approved,
    Rejected,
    ReviewRequired,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Approved => "approved",
            Verdict::Rejected => "rejected",
            Verdict::ReviewRequired => "review-required",
        };
        write!(f, "{}", s)
    }
}

/// Terminal status of one execution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Whether an executed task delivered its expected KPI movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeVerdict {
    Met,
    PartiallyMet,
    Missed,
}

/// Overall governance traffic light for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GovernanceStatus {
    Green,
    Amber,
    Red,
}

impl fmt::Display for GovernanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GovernanceStatus::Green => "green",
            GovernanceStatus::Amber => "amber",
            GovernanceStatus::Red => "red",
        };
        write!(f, "{}", s)
    }
}

/// The top-level objective container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    /// Unique identifier, stable across upserts
    pub mission_id: String,

    /// Objective text
    pub objective: String,

    /// Constraint clauses derived from the case
    #[serde(default)]
    pub constraints: Vec<String>,

    /// Fixed target KPIs
    #[serde(default)]
    pub target_kpis: Vec<String>,

    /// Planning horizon
    pub horizon: String,

    /// Current status
    #[serde(default)]
    pub status: MissionStatus,

    /// Creation timestamp, preserved across upserts
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// A prioritized sub-outcome of the mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub goal_id: String,
    pub mission_id: String,
    pub description: String,

    /// Priority (0-100, higher first)
    pub priority: u8,

    /// Goal IDs this goal depends on
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Confidence (0-100)
    pub confidence: i32,

    #[serde(default)]
    pub status: GoalStatus,

    /// Descriptive agent label; not a runnable entity
    pub owner_agent: String,
}

/// Deterministic three-point outcome estimate for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub task_id: String,

    /// Base case (10-95)
    pub base: i32,

    /// Upside case (15-99)
    pub upside: i32,

    /// Downside case (1-90)
    pub downside: i32,

    /// Named drivers the estimate is sensitive to
    #[serde(default)]
    pub sensitivity_drivers: Vec<String>,

    pub recommended_proceed: bool,
}

/// A unit of planned work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTask {
    pub task_id: String,
    pub goal_id: String,

    #[serde(rename = "type")]
    pub kind: TaskKind,

    /// Input payload for the executor
    #[serde(default)]
    pub input: serde_json::Value,

    pub expected_outcome: String,

    #[serde(default)]
    pub preconditions: Vec<String>,

    #[serde(default)]
    pub postconditions: Vec<String>,

    pub rollback_plan: String,

    /// Risk score (0-100)
    pub risk_score: i32,

    #[serde(default)]
    pub approval_mode: ApprovalMode,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
}

impl ActionTask {
    /// Projected base case, or 0 when the task has not been projected.
    pub fn projected_base(&self) -> i32 {
        self.projection.as_ref().map_or(0, |p| p.base)
    }

    /// Returns true if the projection recommends proceeding.
    pub fn projection_recommends_proceed(&self) -> bool {
        self.projection
            .as_ref()
            .is_some_and(|p| p.recommended_proceed)
    }
}

/// Policy verdict for a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceDecision {
    pub task_id: String,

    /// Pass/fail line for every policy check evaluated
    #[serde(default)]
    pub policy_checks: Vec<String>,

    pub decision: Verdict,

    #[serde(default)]
    pub reasons: Vec<String>,

    /// "auto", "policy" or "manual-approval"
    pub reviewer: String,

    pub timestamp: DateTime<Utc>,
}

/// Record of one task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub run_id: String,
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,

    #[serde(default)]
    pub outputs: serde_json::Value,

    #[serde(default)]
    pub errors: Vec<String>,

    #[serde(default)]
    pub retries: u32,
}

/// Expected versus observed effect of an executed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub task_id: String,

    #[serde(default)]
    pub expected_kpi_change: BTreeMap<String, i32>,

    #[serde(default)]
    pub observed_kpi_change: BTreeMap<String, i32>,

    /// Expected minus observed
    pub variance: i32,

    pub verdict: OutcomeVerdict,

    #[serde(default)]
    pub root_cause_tags: Vec<String>,

    pub lesson: String,
}

/// Cycle health and replan signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSummary {
    /// Adaptation score (5-98 for verified cycles)
    pub adaptation_score: f64,

    pub requires_replan: bool,

    #[serde(default)]
    pub replan_signals: Vec<String>,

    #[serde(default)]
    pub strategy_adjustments: Vec<String>,
}

/// The aggregate root: one mission and everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSnapshot {
    pub mission: Mission,

    #[serde(default)]
    pub goals: Vec<Goal>,

    /// The current task plan
    #[serde(default)]
    pub active_plan: Vec<ActionTask>,

    /// Tasks in the plan that are `ready` or `running`
    #[serde(default)]
    pub in_flight_tasks: Vec<ActionTask>,

    /// Most recent outcome records, newest first
    #[serde(default)]
    pub latest_outcomes: Vec<OutcomeRecord>,

    /// Decisions for the current plan
    #[serde(default)]
    pub governance_decisions: Vec<GovernanceDecision>,

    /// Most recent execution records, newest first
    #[serde(default)]
    pub execution_records: Vec<ExecutionRecord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_summary: Option<VerificationSummary>,

    #[serde(default)]
    pub autonomy_paused: bool,

    pub next_review_at: DateTime<Utc>,

    pub governance_status: GovernanceStatus,

    /// Append-only audit trail of every decision rendered, oldest first
    #[serde(default)]
    pub decision_log: Vec<GovernanceDecision>,
}

impl MissionSnapshot {
    /// Recompute `in_flight_tasks` from the active plan.
    pub fn refresh_in_flight(&mut self) {
        self.in_flight_tasks = in_flight(&self.active_plan);
    }

    /// Look up the current decision for a task.
    pub fn decision_for(&self, task_id: &str) -> Option<&GovernanceDecision> {
        self.governance_decisions
            .iter()
            .find(|d| d.task_id == task_id)
    }
}

/// The subset of tasks that are `ready` or `running`.
pub fn in_flight(tasks: &[ActionTask]) -> Vec<ActionTask> {
    tasks
        .iter()
        .filter(|t| t.status.is_in_flight())
        .cloned()
        .collect()
}
