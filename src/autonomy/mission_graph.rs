//! Mission graph facade: the sole owner of the persisted mission snapshot.
//!
//! One call to [`MissionGraph::upsert_from_case_input`] runs the whole loop in
//! strict order: goals, then tasks, then governance decisions, then execution,
//! then verification. The resulting snapshot replaces the stored one.

use super::execution::{CancelToken, ExecutionEngine, SimulatedExecutor, TaskExecutor};
use super::governance::{GovernanceGate, MIN_READINESS};
use super::orchestrator::{CycleResult, LoopOrchestrator};
use super::planner::{REPORT_READY_THRESHOLD, TaskPlanner};
use super::projector::{HeuristicProjector, OutcomeProjector};
use crate::{Error, Result};
use crate::models::{
    ActionTask, CaseSnapshot, Goal, GoalStatus, GovernanceDecision, GovernanceStatus, Mission,
    MissionSnapshot, MissionStatus, TaskStatus, Verdict, VerificationSummary, in_flight,
};
use crate::storage::{MissionStore, generate_id};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Readiness below which governance is at best amber.
pub const GREEN_READINESS: i32 = 85;

/// Signal reported when a cycle is skipped because autonomy is paused.
pub const PAUSED_LOOP_SIGNAL: &str = "Autonomy loop is paused";

/// Signal reported when an operator pauses autonomy.
pub const OPERATOR_PAUSE_SIGNAL: &str = "Autonomy paused by operator";

/// Signal reported when a cancelled batch left approved tasks unexecuted.
pub const INTERRUPTED_SIGNAL: &str = "Execution cancelled before all approved tasks ran";

/// Upper bound on outcome and execution history, whatever the settings say.
pub const MAX_HISTORY: usize = 20;

/// Reviewer name for operator-promoted decisions.
pub const REVIEWER_MANUAL: &str = "manual-approval";

/// Fixed mission KPIs.
const TARGET_KPIS: [&str; 3] = [
    "Readiness >= 80",
    "Critical gaps = 0",
    "Recommendation confidence >= 75",
];

/// Tunable limits for the facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Entries kept in outcome and execution history, at most [`MAX_HISTORY`]
    pub history_limit: usize,
    /// Time until the next scheduled review
    pub review_interval: Duration,
    /// Entries kept in the append-only decision log
    pub decision_log_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_limit: MAX_HISTORY,
            review_interval: Duration::hours(6),
            decision_log_limit: 200,
        }
    }
}

/// Options for an upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOptions {
    /// Execute even if autonomy is paused
    pub force_run: bool,
}

/// Facade composing planning, governance and the execution loop over one
/// persisted mission snapshot.
///
/// Calls read-modify-write the snapshot as one unit. A concurrent writer that
/// saved in between makes the save fail with [`crate::Error::StaleWrite`]
/// instead of silently losing its update.
pub struct MissionGraph {
    store: MissionStore,
    settings: EngineSettings,
    projector: Box<dyn OutcomeProjector>,
    executor: Box<dyn TaskExecutor>,
    gate: GovernanceGate,
    orchestrator: LoopOrchestrator,
    cancel: CancelToken,
}

impl MissionGraph {
    /// Create a facade with the default heuristic projector and simulated executor.
    pub fn new(store: MissionStore) -> Self {
        Self {
            store,
            settings: EngineSettings::default(),
            projector: Box::new(HeuristicProjector::new()),
            executor: Box::new(SimulatedExecutor),
            gate: GovernanceGate,
            orchestrator: LoopOrchestrator::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_projector(mut self, projector: Box<dyn OutcomeProjector>) -> Self {
        self.projector = projector;
        self
    }

    pub fn with_executor(mut self, executor: Box<dyn TaskExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Handle that stops an in-progress execution batch.
    ///
    /// A cancellation applies to one cycle: the next upsert runs normally.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &MissionStore {
        &self.store
    }

    /// The current snapshot, if a mission has started.
    pub fn snapshot(&self) -> Result<Option<MissionSnapshot>> {
        Ok(self.store.load()?.map(|stored| stored.snapshot))
    }

    /// Rebuild the mission from `case` and run one cycle unless paused.
    pub fn upsert_from_case_input(
        &mut self,
        case: &CaseSnapshot,
        options: UpsertOptions,
    ) -> Result<MissionSnapshot> {
        let existing = self.store.load()?;
        let expected_version = existing.as_ref().map(|s| s.version);
        let prior = existing.map(|s| s.snapshot);

        let now = Utc::now();
        let next_review_at = now
            .checked_add_signed(self.settings.review_interval)
            .ok_or_else(|| {
                Error::Config(format!(
                    "review interval of {} hours is out of range",
                    self.settings.review_interval.num_hours()
                ))
            })?;
        let autonomy_paused = prior.as_ref().is_some_and(|p| p.autonomy_paused);
        let execute = options.force_run || !autonomy_paused;

        let mission = build_mission(case, prior.as_ref().map(|p| &p.mission), now);
        let goals = build_goals(&mission.mission_id, case);
        let planned = TaskPlanner::new(self.projector.as_ref()).plan(&goals, case);
        let decisions = self.gate.evaluate_plan(&planned, case);

        let cycle = if execute {
            let batch = ExecutionEngine::new(self.executor.as_ref()).run_with_cancel(
                planned,
                &decisions,
                case,
                &self.cancel,
            );
            self.cancel.reset();
            let interrupted = batch.interrupted;
            let mut cycle = self.orchestrator.run_cycle(
                case,
                batch.tasks,
                &decisions,
                batch.execution_records,
                batch.outcomes,
            );
            if interrupted {
                tracing::warn!("execution batch cancelled; persisting partial results");
                let summary = &mut cycle.verification_summary;
                summary.replan_signals.push(INTERRUPTED_SIGNAL.to_string());
                summary
                    .strategy_adjustments
                    .push("Run another cycle to execute the remaining approved tasks".to_string());
            }
            cycle
        } else {
            tracing::info!("autonomy paused; skipping execution");
            paused_cycle(planned, case)
        };

        let (prior_outcomes, prior_records, mut decision_log) = prior
            .map(|p| (p.latest_outcomes, p.execution_records, p.decision_log))
            .unwrap_or_default();
        let limit = self.settings.history_limit.min(MAX_HISTORY);
        append_to_log(
            &mut decision_log,
            decisions.iter().cloned(),
            self.settings.decision_log_limit,
        );

        let snapshot = MissionSnapshot {
            governance_status: derive_governance_status(case, &decisions),
            mission,
            goals,
            active_plan: cycle.tasks,
            in_flight_tasks: cycle.in_flight_tasks,
            latest_outcomes: merge_history(cycle.latest_outcomes, prior_outcomes, limit),
            governance_decisions: decisions,
            execution_records: merge_history(cycle.execution_records, prior_records, limit),
            verification_summary: Some(cycle.verification_summary),
            autonomy_paused,
            next_review_at,
            decision_log,
        };

        let version = self.store.save(&snapshot, expected_version)?;
        tracing::info!(
            version,
            mission = %snapshot.mission.mission_id,
            governance = %snapshot.governance_status,
            "mission snapshot updated"
        );
        Ok(snapshot)
    }

    /// Upsert and execute regardless of the pause flag.
    pub fn run_cycle_from_case_input(&mut self, case: &CaseSnapshot) -> Result<MissionSnapshot> {
        self.upsert_from_case_input(case, UpsertOptions { force_run: true })
    }

    /// Set the pause flag. Returns `None` if no mission has started.
    ///
    /// Pausing replaces the verification summary with an operator placeholder;
    /// resuming leaves it as is.
    pub fn set_autonomy_paused(&mut self, paused: bool) -> Result<Option<MissionSnapshot>> {
        let Some(stored) = self.store.load()? else {
            return Ok(None);
        };
        let mut snapshot = stored.snapshot;

        snapshot.autonomy_paused = paused;
        if paused {
            let previous = snapshot.verification_summary.as_ref();
            snapshot.verification_summary = Some(VerificationSummary {
                adaptation_score: previous.map_or(60.0, |s| s.adaptation_score),
                requires_replan: previous.is_some_and(|s| s.requires_replan),
                replan_signals: vec![OPERATOR_PAUSE_SIGNAL.to_string()],
                strategy_adjustments: vec!["Resume autonomy or run a manual cycle".to_string()],
            });
        }

        self.store.save(&snapshot, Some(stored.version))?;
        tracing::info!(paused, "autonomy pause flag updated");
        Ok(Some(snapshot))
    }

    /// Promote every `review-required` decision to `approved`.
    ///
    /// Pending tasks behind a promoted decision become ready. Returns `None` if
    /// no mission has started; with nothing to promote the snapshot is returned
    /// unchanged and not rewritten.
    pub fn approve_manual_tasks(&mut self) -> Result<Option<MissionSnapshot>> {
        let Some(stored) = self.store.load()? else {
            return Ok(None);
        };
        let mut snapshot = stored.snapshot;

        let now = Utc::now();
        let mut promoted = Vec::new();
        for decision in snapshot
            .governance_decisions
            .iter_mut()
            .filter(|d| d.decision == Verdict::ReviewRequired)
        {
            decision.decision = Verdict::Approved;
            decision.reviewer = REVIEWER_MANUAL.to_string();
            decision
                .reasons
                .push("Manual approval granted by operator".to_string());
            decision.timestamp = now;
            promoted.push(decision.clone());
        }

        if promoted.is_empty() {
            tracing::debug!("no decisions awaiting review");
            return Ok(Some(snapshot));
        }

        let promoted_ids: HashSet<&str> = promoted.iter().map(|d| d.task_id.as_str()).collect();
        for task in snapshot
            .active_plan
            .iter_mut()
            .filter(|t| promoted_ids.contains(t.task_id.as_str()))
            .filter(|t| t.status == TaskStatus::Pending)
        {
            task.status = TaskStatus::Ready;
        }
        snapshot.refresh_in_flight();

        tracing::info!(count = promoted.len(), "manual approval granted");
        append_to_log(
            &mut snapshot.decision_log,
            promoted.into_iter(),
            self.settings.decision_log_limit,
        );

        self.store.save(&snapshot, Some(stored.version))?;
        Ok(Some(snapshot))
    }

    /// Remove the mission snapshot. Returns true if anything was stored.
    pub fn clear(&mut self) -> Result<bool> {
        self.store.clear()
    }
}

/// Rebuild the mission record from the case, keeping identity and creation time.
pub fn build_mission(case: &CaseSnapshot, prior: Option<&Mission>, now: DateTime<Utc>) -> Mission {
    let objective = [case.objectives.trim(), case.narrative.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or("Build decision-ready strategic case")
        .to_string();
    let horizon = if case.decision_deadline.is_empty() {
        "Current planning cycle".to_string()
    } else {
        case.decision_deadline.clone()
    };

    Mission {
        mission_id: prior.map_or_else(|| generate_id("mission", &objective), |m| m.mission_id.clone()),
        objective,
        constraints: case.constraint_clauses().take(6).map(String::from).collect(),
        target_kpis: TARGET_KPIS.iter().map(|k| k.to_string()).collect(),
        horizon,
        status: derive_mission_status(case),
        created_at: prior.map_or(now, |m| m.created_at),
        updated_at: now,
    }
}

pub fn derive_mission_status(case: &CaseSnapshot) -> MissionStatus {
    if case.has_critical_gaps() {
        MissionStatus::Blocked
    } else if case.readiness_score < REPORT_READY_THRESHOLD {
        MissionStatus::Draft
    } else {
        MissionStatus::Active
    }
}

/// Derive the goal list, highest priority first.
pub fn build_goals(mission_id: &str, case: &CaseSnapshot) -> Vec<Goal> {
    let readiness = case.readiness_score;
    let or_default = |s: &str, fallback: &str| {
        if s.is_empty() { fallback.to_string() } else { s.to_string() }
    };

    let mut goals = vec![
        Goal {
            goal_id: generate_id("goal", "decision-ready"),
            mission_id: mission_id.to_string(),
            description: format!(
                "Reach decision-ready state for {}",
                or_default(&case.organization_name, "organization")
            ),
            priority: 100,
            dependencies: Vec::new(),
            confidence: readiness,
            status: if readiness >= REPORT_READY_THRESHOLD {
                GoalStatus::InProgress
            } else {
                GoalStatus::Pending
            },
            owner_agent: "planner-agent".to_string(),
        },
        Goal {
            goal_id: generate_id("goal", "audience-outputs"),
            mission_id: mission_id.to_string(),
            description: format!(
                "Prepare target outputs for {}",
                or_default(&case.target_audience, "stakeholders")
            ),
            priority: 85,
            dependencies: Vec::new(),
            confidence: (readiness - 5).clamp(40, 95),
            status: if case.recommended_titles.is_empty() {
                GoalStatus::Pending
            } else {
                GoalStatus::InProgress
            },
            owner_agent: "document-strategy-agent".to_string(),
        },
    ];

    if let Some(gap) = case.named_top_gap() {
        goals.push(Goal {
            goal_id: generate_id("goal", gap),
            mission_id: mission_id.to_string(),
            description: format!("Resolve critical gap: {}", gap),
            priority: 95,
            dependencies: Vec::new(),
            confidence: 60,
            status: GoalStatus::Pending,
            owner_agent: "case-intake-agent".to_string(),
        });
    }

    goals.sort_by_key(|g| std::cmp::Reverse(g.priority));
    goals
}

/// Overall traffic light for the case and its current decisions.
pub fn derive_governance_status(
    case: &CaseSnapshot,
    decisions: &[GovernanceDecision],
) -> GovernanceStatus {
    let any = |verdict: Verdict| decisions.iter().any(|d| d.decision == verdict);

    if case.has_critical_gaps() || case.readiness_score < MIN_READINESS || any(Verdict::Rejected) {
        GovernanceStatus::Red
    } else if any(Verdict::ReviewRequired) || case.readiness_score < GREEN_READINESS {
        GovernanceStatus::Amber
    } else {
        GovernanceStatus::Green
    }
}

/// Put `newest` in front of `prior` and keep at most `limit` entries.
pub fn merge_history<T>(newest: Vec<T>, prior: Vec<T>, limit: usize) -> Vec<T> {
    newest.into_iter().chain(prior).take(limit).collect()
}

fn append_to_log(
    log: &mut Vec<GovernanceDecision>,
    entries: impl Iterator<Item = GovernanceDecision>,
    limit: usize,
) {
    log.extend(entries);
    if log.len() > limit {
        let excess = log.len() - limit;
        log.drain(..excess);
    }
}

fn paused_cycle(tasks: Vec<ActionTask>, case: &CaseSnapshot) -> CycleResult {
    CycleResult {
        in_flight_tasks: in_flight(&tasks),
        tasks,
        latest_outcomes: Vec::new(),
        execution_records: Vec::new(),
        verification_summary: VerificationSummary {
            adaptation_score: f64::from(case.readiness_score.clamp(10, 95)),
            requires_replan: false,
            replan_signals: vec![PAUSED_LOOP_SIGNAL.to_string()],
            strategy_adjustments: vec![
                "Run a cycle for one-time execution or resume to enable the continuous loop"
                    .to_string(),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApprovalMode, OutcomeVerdict, RunStatus, TaskKind};
    use crate::test_utils::sample_case;

    fn graph() -> MissionGraph {
        MissionGraph::new(MissionStore::in_memory())
    }

    fn task_of(snapshot: &MissionSnapshot, kind: TaskKind) -> ActionTask {
        snapshot
            .active_plan
            .iter()
            .find(|t| t.kind == kind)
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_ready_case_executes_preflight() {
        let mut graph = graph();
        let case = sample_case(90, 0);
        let snapshot = graph
            .upsert_from_case_input(&case, UpsertOptions::default())
            .unwrap();

        let preflight = task_of(&snapshot, TaskKind::ReportPreflight);
        assert_eq!(
            snapshot.decision_for(&preflight.task_id).unwrap().decision,
            Verdict::Approved
        );
        assert_eq!(preflight.status, TaskStatus::Completed);

        let outcome = snapshot
            .latest_outcomes
            .iter()
            .find(|o| o.task_id == preflight.task_id)
            .unwrap();
        assert_eq!(outcome.verdict, OutcomeVerdict::Met);

        assert_eq!(snapshot.execution_records.len(), 2);
        assert!(snapshot
            .execution_records
            .iter()
            .all(|r| r.status == RunStatus::Completed));
        assert_eq!(snapshot.mission.status, MissionStatus::Active);
        assert_eq!(snapshot.governance_status, GovernanceStatus::Green);
        assert!(!snapshot.verification_summary.as_ref().unwrap().requires_replan);
    }

    #[test]
    fn test_low_readiness_gap_task_rejected() {
        let mut graph = graph();
        let snapshot = graph
            .upsert_from_case_input(&sample_case(40, 2), UpsertOptions::default())
            .unwrap();

        let gap = task_of(&snapshot, TaskKind::GapResolution);
        assert_eq!(gap.risk_score, 70);
        assert_eq!(gap.approval_mode, ApprovalMode::Manual);

        let decision = snapshot.decision_for(&gap.task_id).unwrap();
        assert_eq!(decision.decision, Verdict::Rejected);
        assert_eq!(decision.reviewer, "policy");
        assert!(decision.reasons.iter().any(|r| r.contains("Readiness is below")));
        assert!(decision.reasons.iter().any(|r| r.contains("manual approval")));

        assert!(snapshot.execution_records.is_empty());
        assert_eq!(snapshot.mission.status, MissionStatus::Blocked);
        assert_eq!(snapshot.governance_status, GovernanceStatus::Red);

        // Gaps force a replan, which injects a recalibration task
        assert!(snapshot.verification_summary.as_ref().unwrap().requires_replan);
        assert!(snapshot
            .active_plan
            .iter()
            .any(|t| t.kind == TaskKind::StrategyRecalibration));
    }

    #[test]
    fn test_paused_upsert_skips_execution() {
        let mut graph = graph();
        let case = sample_case(90, 0);
        let first = graph
            .upsert_from_case_input(&case, UpsertOptions::default())
            .unwrap();
        let recorded = first.execution_records.len();

        graph.set_autonomy_paused(true).unwrap().unwrap();
        let paused = graph
            .upsert_from_case_input(&case, UpsertOptions::default())
            .unwrap();

        let summary = paused.verification_summary.as_ref().unwrap();
        assert_eq!(summary.replan_signals, vec![PAUSED_LOOP_SIGNAL.to_string()]);
        assert!(!summary.requires_replan);
        assert_eq!(summary.adaptation_score, 90.0);
        assert_eq!(paused.execution_records.len(), recorded);
        assert!(paused.autonomy_paused);
        assert!(paused
            .active_plan
            .iter()
            .all(|t| !matches!(t.status, TaskStatus::Completed | TaskStatus::Failed)));
    }

    #[test]
    fn test_forced_run_executes_while_paused() {
        let mut graph = graph();
        let case = sample_case(90, 0);
        graph.upsert_from_case_input(&case, UpsertOptions::default()).unwrap();
        graph.set_autonomy_paused(true).unwrap();

        let forced = graph.run_cycle_from_case_input(&case).unwrap();
        assert_eq!(forced.execution_records.len(), 4);
        assert!(forced.autonomy_paused);
    }

    #[test]
    fn test_approve_manual_tasks_promotes_once() {
        let mut graph = graph();
        // Evidence base 61: held for review and pending
        let snapshot = graph
            .upsert_from_case_input(&sample_case(72, 0), UpsertOptions::default())
            .unwrap();
        let held: Vec<_> = snapshot
            .governance_decisions
            .iter()
            .filter(|d| d.decision == Verdict::ReviewRequired)
            .collect();
        assert_eq!(held.len(), 1);
        let held_id = held[0].task_id.clone();
        assert_eq!(
            snapshot.active_plan.iter().find(|t| t.task_id == held_id).unwrap().status,
            TaskStatus::Pending
        );
        let version_before = graph.store().load().unwrap().unwrap().version;

        let approved = graph.approve_manual_tasks().unwrap().unwrap();
        let decision = approved.decision_for(&held_id).unwrap();
        assert_eq!(decision.decision, Verdict::Approved);
        assert_eq!(decision.reviewer, REVIEWER_MANUAL);
        assert!(decision.reasons.last().unwrap().contains("Manual approval"));
        let task = approved.active_plan.iter().find(|t| t.task_id == held_id).unwrap();
        assert_eq!(task.status, TaskStatus::Ready);
        assert!(approved.in_flight_tasks.iter().any(|t| t.task_id == held_id));
        assert_eq!(approved.decision_log.len(), snapshot.decision_log.len() + 1);

        let version_after = graph.store().load().unwrap().unwrap().version;
        assert_eq!(version_after, version_before + 1);

        let again = graph.approve_manual_tasks().unwrap().unwrap();
        assert_eq!(again, approved);
        assert_eq!(graph.store().load().unwrap().unwrap().version, version_after);
    }

    #[test]
    fn test_operator_commands_without_snapshot() {
        let mut graph = graph();
        assert!(graph.set_autonomy_paused(true).unwrap().is_none());
        assert!(graph.approve_manual_tasks().unwrap().is_none());
        assert!(graph.snapshot().unwrap().is_none());
    }

    #[test]
    fn test_pause_placeholder_and_resume() {
        let mut graph = graph();
        let snapshot = graph
            .upsert_from_case_input(&sample_case(90, 0), UpsertOptions::default())
            .unwrap();
        let score = snapshot.verification_summary.as_ref().unwrap().adaptation_score;

        let paused = graph.set_autonomy_paused(true).unwrap().unwrap();
        let summary = paused.verification_summary.as_ref().unwrap();
        assert_eq!(summary.replan_signals, vec![OPERATOR_PAUSE_SIGNAL.to_string()]);
        assert_eq!(summary.adaptation_score, score);

        let resumed = graph.set_autonomy_paused(false).unwrap().unwrap();
        assert!(!resumed.autonomy_paused);
        assert_eq!(resumed.verification_summary, paused.verification_summary);
    }

    #[test]
    fn test_created_at_and_id_stable_across_upserts() {
        let mut graph = graph();
        let first = graph
            .upsert_from_case_input(&sample_case(60, 1), UpsertOptions::default())
            .unwrap();

        let mut case = sample_case(95, 0);
        case.objectives = "Ship the board pack".to_string();
        case.constraints = "budget; headcount".to_string();
        let second = graph
            .upsert_from_case_input(&case, UpsertOptions::default())
            .unwrap();

        assert_eq!(second.mission.created_at, first.mission.created_at);
        assert_eq!(second.mission.mission_id, first.mission.mission_id);
        assert!(second.mission.updated_at >= first.mission.updated_at);
        assert_eq!(second.mission.objective, "Ship the board pack");
        assert_eq!(second.mission.constraints, vec!["budget", "headcount"]);
        assert_eq!(second.mission.status, MissionStatus::Active);
        assert_ne!(second.goals[0].goal_id, first.goals[0].goal_id);
    }

    #[test]
    fn test_history_capped_most_recent_first() {
        let mut graph = graph();
        let case = sample_case(90, 0);
        let mut snapshot = None;
        for _ in 0..12 {
            snapshot = Some(
                graph
                    .upsert_from_case_input(&case, UpsertOptions::default())
                    .unwrap(),
            );
        }
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.latest_outcomes.len(), 20);
        assert_eq!(snapshot.execution_records.len(), 20);

        let current: HashSet<&str> = snapshot
            .active_plan
            .iter()
            .map(|t| t.task_id.as_str())
            .collect();
        assert!(current.contains(snapshot.latest_outcomes[0].task_id.as_str()));
        assert!(current.contains(snapshot.execution_records[1].task_id.as_str()));
        assert!(!current.contains(snapshot.execution_records[2].task_id.as_str()));
    }

    #[test]
    fn test_decision_log_is_bounded() {
        let mut graph = graph().with_settings(EngineSettings {
            decision_log_limit: 5,
            ..EngineSettings::default()
        });
        let case = sample_case(90, 0);
        let first = graph
            .upsert_from_case_input(&case, UpsertOptions::default())
            .unwrap();
        assert_eq!(first.decision_log.len(), 3);

        let second = graph
            .upsert_from_case_input(&case, UpsertOptions::default())
            .unwrap();
        assert_eq!(second.decision_log.len(), 5);
        // Newest decisions sit at the end
        assert_eq!(second.decision_log[4], second.governance_decisions[2]);
    }

    #[test]
    fn test_goals_sorted_with_named_gap() {
        let mut case = sample_case(50, 1);
        case.organization_name = "Acme".to_string();
        case.top_critical_gap = Some("Missing audited financials".to_string());
        let goals = build_goals("mission-1", &case);

        let priorities: Vec<u8> = goals.iter().map(|g| g.priority).collect();
        assert_eq!(priorities, vec![100, 95, 85]);
        assert_eq!(goals[0].description, "Reach decision-ready state for Acme");
        assert_eq!(goals[0].confidence, 50);
        assert_eq!(goals[0].status, GoalStatus::Pending);
        assert_eq!(goals[1].description, "Resolve critical gap: Missing audited financials");
        assert_eq!(goals[2].description, "Prepare target outputs for stakeholders");
        assert_eq!(goals[2].confidence, 45);
    }

    #[test]
    fn test_second_goal_confidence_clamped() {
        let goals = build_goals("m", &sample_case(20, 0));
        assert_eq!(goals[1].confidence, 40);
        let goals = build_goals("m", &sample_case(100, 0));
        assert_eq!(goals[1].confidence, 95);
        assert_eq!(goals[0].status, GoalStatus::InProgress);
    }

    #[test]
    fn test_governance_status_rules() {
        let approved = |id: &str| GovernanceDecision {
            task_id: id.to_string(),
            policy_checks: Vec::new(),
            decision: Verdict::Approved,
            reasons: Vec::new(),
            reviewer: "auto".to_string(),
            timestamp: Utc::now(),
        };
        let with = |verdict| GovernanceDecision {
            decision: verdict,
            ..approved("t")
        };

        assert_eq!(derive_governance_status(&sample_case(90, 0), &[approved("t")]), GovernanceStatus::Green);
        assert_eq!(derive_governance_status(&sample_case(84, 0), &[]), GovernanceStatus::Amber);
        assert_eq!(derive_governance_status(&sample_case(90, 0), &[with(Verdict::ReviewRequired)]), GovernanceStatus::Amber);
        assert_eq!(derive_governance_status(&sample_case(90, 0), &[with(Verdict::Rejected)]), GovernanceStatus::Red);
        assert_eq!(derive_governance_status(&sample_case(69, 0), &[]), GovernanceStatus::Red);
        assert_eq!(derive_governance_status(&sample_case(99, 1), &[]), GovernanceStatus::Red);
    }

    #[test]
    fn test_mission_defaults_for_blank_case() {
        let mission = build_mission(&CaseSnapshot::default(), None, Utc::now());
        assert_eq!(mission.objective, "Build decision-ready strategic case");
        assert_eq!(mission.horizon, "Current planning cycle");
        assert_eq!(mission.target_kpis.len(), 3);
        assert!(mission.mission_id.starts_with("mission-"));
        assert_eq!(mission.status, MissionStatus::Draft);
    }

    #[test]
    fn test_mission_constraints_capped_at_six() {
        let case = CaseSnapshot {
            constraints: "a;b;c;d;e;f;g;h".to_string(),
            narrative: "  Narrative objective  ".to_string(),
            ..Default::default()
        };
        let mission = build_mission(&case, None, Utc::now());
        assert_eq!(mission.constraints.len(), 6);
        assert_eq!(mission.objective, "Narrative objective");
    }

    #[test]
    fn test_cancelled_graph_persists_without_runs() {
        let mut graph = graph();
        graph.cancel_token().cancel();
        let snapshot = graph
            .upsert_from_case_input(&sample_case(90, 0), UpsertOptions::default())
            .unwrap();
        assert!(snapshot.execution_records.is_empty());
        assert!(
            snapshot
                .verification_summary
                .as_ref()
                .unwrap()
                .replan_signals
                .contains(&INTERRUPTED_SIGNAL.to_string())
        );
        assert_eq!(graph.snapshot().unwrap().unwrap(), snapshot);
    }

    #[test]
    fn test_cycle_after_cancelled_one_executes() {
        let mut graph = graph();
        let case = sample_case(90, 0);
        graph.cancel_token().cancel();
        graph
            .upsert_from_case_input(&case, UpsertOptions::default())
            .unwrap();

        let next = graph.run_cycle_from_case_input(&case).unwrap();
        assert_eq!(next.execution_records.len(), 2);
        assert!(
            !next
                .verification_summary
                .unwrap()
                .replan_signals
                .contains(&INTERRUPTED_SIGNAL.to_string())
        );
        assert!(!graph.cancel_token().is_cancelled());
    }

    #[test]
    fn test_history_limit_never_exceeds_cap() {
        let mut graph = graph().with_settings(EngineSettings {
            history_limit: 50,
            ..EngineSettings::default()
        });
        let case = sample_case(90, 0);
        let mut snapshot = None;
        for _ in 0..12 {
            snapshot = Some(
                graph
                    .upsert_from_case_input(&case, UpsertOptions::default())
                    .unwrap(),
            );
        }
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.latest_outcomes.len(), MAX_HISTORY);
        assert_eq!(snapshot.execution_records.len(), MAX_HISTORY);
    }

    #[test]
    fn test_out_of_range_review_interval_is_config_error() {
        let mut graph = graph().with_settings(EngineSettings {
            review_interval: Duration::days(100_000_000),
            ..EngineSettings::default()
        });
        let err = graph
            .upsert_from_case_input(&sample_case(90, 0), UpsertOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(graph.snapshot().unwrap().is_none());
    }

    #[test]
    fn test_clear_forgets_mission() {
        let mut graph = graph();
        graph
            .upsert_from_case_input(&sample_case(90, 0), UpsertOptions::default())
            .unwrap();
        assert!(graph.clear().unwrap());
        assert!(graph.snapshot().unwrap().is_none());
        assert!(!graph.clear().unwrap());
    }
}
