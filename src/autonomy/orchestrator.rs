//! One verify-and-adjust pass over an executed batch.

use super::verification::VerificationEngine;
use crate::models::{
    ActionTask, CaseSnapshot, ExecutionRecord, GovernanceDecision, OutcomeRecord,
    VerificationSummary, in_flight,
};

/// Result of one loop cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleResult {
    /// The plan after any replan adjustments
    pub tasks: Vec<ActionTask>,
    pub in_flight_tasks: Vec<ActionTask>,
    pub latest_outcomes: Vec<OutcomeRecord>,
    pub execution_records: Vec<ExecutionRecord>,
    pub verification_summary: VerificationSummary,
}

/// Composes verification and replanning into a single cycle step.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopOrchestrator {
    verifier: VerificationEngine,
}

impl LoopOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify the batch, apply replan adjustments, and collect in-flight tasks.
    ///
    /// Outcomes and execution records pass through unchanged.
    pub fn run_cycle(
        &self,
        case: &CaseSnapshot,
        tasks: Vec<ActionTask>,
        decisions: &[GovernanceDecision],
        execution_records: Vec<ExecutionRecord>,
        outcomes: Vec<OutcomeRecord>,
    ) -> CycleResult {
        let verification_summary = self.verifier.verify(&outcomes, decisions, case);
        let tasks = self
            .verifier
            .apply_replan_adjustments(tasks, &verification_summary);
        let in_flight_tasks = in_flight(&tasks);

        CycleResult {
            tasks,
            in_flight_tasks,
            latest_outcomes: outcomes,
            execution_records,
            verification_summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApprovalMode, OutcomeVerdict, TaskKind, TaskStatus};
    use crate::test_utils::{outcome, projected_task, sample_case};

    #[test]
    fn test_healthy_cycle_keeps_ready_tasks_in_flight() {
        let mut ready = projected_task(TaskKind::EvidenceStrengthening, 30, ApprovalMode::Auto, true);
        ready.status = TaskStatus::Ready;
        let mut done = projected_task(TaskKind::ReportPreflight, 30, ApprovalMode::Auto, true);
        done.status = TaskStatus::Completed;

        let outcomes = vec![outcome(OutcomeVerdict::Met, 0)];
        let result = LoopOrchestrator::new().run_cycle(
            &sample_case(90, 0),
            vec![ready.clone(), done],
            &[],
            Vec::new(),
            outcomes.clone(),
        );

        assert!(!result.verification_summary.requires_replan);
        assert_eq!(result.in_flight_tasks, vec![ready]);
        assert_eq!(result.latest_outcomes, outcomes);
    }

    #[test]
    fn test_replan_cycle_only_recalibration_in_flight() {
        let mut ready = projected_task(TaskKind::GapResolution, 70, ApprovalMode::Manual, false);
        ready.status = TaskStatus::Ready;

        let result = LoopOrchestrator::new().run_cycle(
            &sample_case(60, 2),
            vec![ready],
            &[],
            Vec::new(),
            Vec::new(),
        );

        assert!(result.verification_summary.requires_replan);
        assert_eq!(result.tasks.len(), 2);
        assert_eq!(result.tasks[0].status, TaskStatus::Pending);
        assert_eq!(result.in_flight_tasks.len(), 1);
        assert_eq!(result.in_flight_tasks[0].kind, TaskKind::StrategyRecalibration);
    }
}
