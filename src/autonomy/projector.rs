//! Outcome projection for planned tasks.
//!
//! A projection is a deterministic heuristic score, not a sample: the same
//! task kind and case always produce the same base/upside/downside triple.
//!
//! # Heuristic
//!
//! - **Complexity** (5-45): objective length tier, narrative length tier,
//!   three points per constraint clause, eight points per critical gap.
//! - **Task bias**: gap resolution +8; report preflight +10 with no gaps,
//!   -10 otherwise.
//! - `base = clamp(readiness - complexity - 7 * gaps + bias, 10, 95)`
//! - `upside = clamp(base + 12, 15, 99)`, `downside = clamp(base - 18, 1, 90)`
//! - Proceed iff `base >= 62` and `downside >= 25`.

use crate::models::{CaseSnapshot, Projection, TaskKind};

/// Thresholds for projection scoring.
pub mod thresholds {
    /// Minimum base case to recommend proceeding.
    pub const PROCEED_MIN_BASE: i32 = 62;

    /// Minimum downside case to recommend proceeding.
    pub const PROCEED_MIN_DOWNSIDE: i32 = 25;
}

/// Strategy turning a task and case into a projection.
///
/// Planning, governance and execution only read the resulting [`Projection`],
/// so a different model can be substituted here without touching them.
pub trait OutcomeProjector: Send + Sync {
    fn project(&self, task_id: &str, kind: TaskKind, case: &CaseSnapshot) -> Projection;
}

/// The default deterministic scoring heuristic.
#[derive(Debug, Clone, Default)]
pub struct HeuristicProjector {
    /// Drivers reported on every projection; empty means the defaults
    pub sensitivity_drivers: Vec<String>,
}

impl HeuristicProjector {
    pub fn new() -> Self {
        Self::default()
    }

    fn drivers(&self) -> Vec<String> {
        if self.sensitivity_drivers.is_empty() {
            vec![
                "Readiness score".to_string(),
                "Critical gap count".to_string(),
                "Constraint density".to_string(),
            ]
        } else {
            self.sensitivity_drivers.clone()
        }
    }
}

impl OutcomeProjector for HeuristicProjector {
    fn project(&self, task_id: &str, kind: TaskKind, case: &CaseSnapshot) -> Projection {
        let complexity = score_complexity(case);
        let readiness = case.readiness_score.clamp(0, 100);
        let gap_penalty = gap_count(case) * 7;

        let base = (readiness - complexity - gap_penalty + task_bias(kind, case)).clamp(10, 95);
        let upside = (base + 12).clamp(15, 99);
        let downside = (base - 18).clamp(1, 90);

        Projection {
            task_id: task_id.to_string(),
            base,
            upside,
            downside,
            sensitivity_drivers: self.drivers(),
            recommended_proceed: recommends_proceed(base, downside),
        }
    }
}

/// The go/no-go rule shared by every projector.
pub fn recommends_proceed(base: i32, downside: i32) -> bool {
    base >= thresholds::PROCEED_MIN_BASE && downside >= thresholds::PROCEED_MIN_DOWNSIDE
}

/// Case complexity in [5, 45].
pub fn score_complexity(case: &CaseSnapshot) -> i32 {
    let objective = match case.objectives.chars().count() {
        n if n > 120 => 15,
        n if n > 60 => 10,
        _ => 5,
    };
    let narrative = match case.narrative.chars().count() {
        n if n > 200 => 18,
        n if n > 100 => 12,
        _ => 6,
    };
    let clauses = case.raw_constraint_clauses().count() as i32 * 3;
    let gaps = gap_count(case) * 8;
    (objective + narrative + clauses + gaps).clamp(5, 45)
}

fn task_bias(kind: TaskKind, case: &CaseSnapshot) -> i32 {
    match kind {
        TaskKind::GapResolution => 8,
        TaskKind::ReportPreflight if case.has_critical_gaps() => -10,
        TaskKind::ReportPreflight => 10,
        _ => 0,
    }
}

fn gap_count(case: &CaseSnapshot) -> i32 {
    i32::try_from(case.critical_gap_count).unwrap_or(i32::MAX / 16)
}
