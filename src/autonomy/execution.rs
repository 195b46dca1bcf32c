//! Execution of governance-approved tasks.
//!
//! Only tasks whose decision is `approved` and whose status is `ready` are
//! dispatched. Each dispatched task produces one [`ExecutionRecord`] and one
//! [`OutcomeRecord`] comparing the expected readiness delta with the observed
//! one. Every other task is returned untouched.
//!
//! Work is dispatched per task through a [`TaskExecutor`]. The batch checks a
//! [`CancelToken`] before each dispatch; once cancelled, the remaining tasks
//! pass through unchanged and the partial batch is returned.

use crate::models::{
    ActionTask, CaseSnapshot, ExecutionRecord, GovernanceDecision, OutcomeRecord, OutcomeVerdict,
    RunStatus, TaskKind, TaskStatus, Verdict,
};
use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Minimum projected base case for a simulated run to succeed.
pub const SUCCESS_MIN_BASE: i32 = 60;

/// KPI name tracked by outcome records.
pub const READINESS_KPI: &str = "readiness";

/// Error recorded when a run falls short of the success threshold.
pub const LOW_CONFIDENCE_ERROR: &str = "Execution confidence did not meet minimum threshold";

/// Shared flag that stops a batch from dispatching further tasks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Tasks already dispatched still complete.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set.
    pub fn reset(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Result of running one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRun {
    pub succeeded: bool,
    pub outputs: serde_json::Value,
    pub errors: Vec<String>,
}

/// Performs the work for a single task.
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, task: &ActionTask, case: &CaseSnapshot) -> TaskRun;
}

/// Executor that simulates the outcome from the task's projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedExecutor;

impl TaskExecutor for SimulatedExecutor {
    fn execute(&self, task: &ActionTask, case: &CaseSnapshot) -> TaskRun {
        let succeeded = task.projected_base() >= SUCCESS_MIN_BASE;
        TaskRun {
            succeeded,
            outputs: json!({
                "task_type": task.kind,
                "mission_readiness": case.readiness_score,
                "critical_gap_count": case.critical_gap_count,
            }),
            errors: if succeeded {
                Vec::new()
            } else {
                vec![LOW_CONFIDENCE_ERROR.to_string()]
            },
        }
    }
}

/// Output of one execution batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionBatch {
    /// The full task list, with executed tasks marked completed or failed
    pub tasks: Vec<ActionTask>,
    pub execution_records: Vec<ExecutionRecord>,
    pub outcomes: Vec<OutcomeRecord>,
    /// True if cancellation stopped the batch before every eligible task ran
    pub interrupted: bool,
}

/// Dispatches approved, ready tasks to an executor.
pub struct ExecutionEngine<'a> {
    executor: &'a dyn TaskExecutor,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(executor: &'a dyn TaskExecutor) -> Self {
        Self { executor }
    }

    /// Run every eligible task.
    pub fn run(
        &self,
        tasks: Vec<ActionTask>,
        decisions: &[GovernanceDecision],
        case: &CaseSnapshot,
    ) -> ExecutionBatch {
        self.run_with_cancel(tasks, decisions, case, &CancelToken::new())
    }

    /// Run eligible tasks until `cancel` fires.
    pub fn run_with_cancel(
        &self,
        tasks: Vec<ActionTask>,
        decisions: &[GovernanceDecision],
        case: &CaseSnapshot,
        cancel: &CancelToken,
    ) -> ExecutionBatch {
        let verdicts: HashMap<&str, Verdict> = decisions
            .iter()
            .map(|d| (d.task_id.as_str(), d.decision))
            .collect();

        let mut batch = ExecutionBatch::default();
        let mut updated = Vec::with_capacity(tasks.len());

        for mut task in tasks {
            let eligible = verdicts.get(task.task_id.as_str()) == Some(&Verdict::Approved)
                && task.status == TaskStatus::Ready;
            if !eligible {
                updated.push(task);
                continue;
            }
            if cancel.is_cancelled() {
                batch.interrupted = true;
                updated.push(task);
                continue;
            }

            let started_at = Utc::now();
            let run = self.executor.execute(&task, case);
            let finished_at = Utc::now();

            if run.succeeded {
                tracing::info!(task = %task.task_id, kind = %task.kind, "task completed");
            } else {
                tracing::warn!(task = %task.task_id, kind = %task.kind, errors = ?run.errors, "task failed");
            }

            batch.execution_records.push(ExecutionRecord {
                run_id: format!("run-{}", task.task_id),
                task_id: task.task_id.clone(),
                started_at,
                finished_at,
                status: if run.succeeded {
                    RunStatus::Completed
                } else {
                    RunStatus::Failed
                },
                outputs: run.outputs,
                errors: run.errors,
                retries: if run.succeeded { 0 } else { 1 },
            });
            batch
                .outcomes
                .push(outcome_for(&task, case, run.succeeded));

            task.status = if run.succeeded {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            };
            updated.push(task);
        }

        batch.tasks = updated;
        batch
    }
}

/// Expected readiness delta for a task kind.
pub fn expected_readiness_delta(kind: TaskKind) -> i32 {
    match kind {
        TaskKind::GapResolution => 8,
        _ => 5,
    }
}

/// Observed readiness delta; each gap beyond the first erodes the gain, floored at 3.
pub fn observed_readiness_delta(expected: i32, succeeded: bool, case: &CaseSnapshot) -> i32 {
    if !succeeded {
        return 0;
    }
    let drag = i32::try_from(case.critical_gap_count.saturating_sub(1)).unwrap_or(i32::MAX);
    expected.saturating_sub(drag).max(3)
}

fn outcome_for(task: &ActionTask, case: &CaseSnapshot, succeeded: bool) -> OutcomeRecord {
    let expected = expected_readiness_delta(task.kind);
    let observed = observed_readiness_delta(expected, succeeded, case);

    let (verdict, tags, lesson) = if succeeded {
        (
            OutcomeVerdict::Met,
            vec!["governance-pass", "execution-success"],
            "Approved tasks with a strong base case execute reliably",
        )
    } else {
        (
            OutcomeVerdict::Missed,
            vec!["execution-confidence-drop"],
            "Tasks with marginal confidence need stronger evidence before autonomous execution",
        )
    };

    OutcomeRecord {
        task_id: task.task_id.clone(),
        expected_kpi_change: BTreeMap::from([(READINESS_KPI.to_string(), expected)]),
        observed_kpi_change: BTreeMap::from([(READINESS_KPI.to_string(), observed)]),
        variance: expected - observed,
        verdict,
        root_cause_tags: tags.into_iter().map(String::from).collect(),
        lesson: lesson.to_string(),
    }
}
