//! Policy gate deciding whether each planned task may execute.
//!
//! Four checks are evaluated for every task:
//! - the projection recommends proceeding
//! - risk score is at most [`MAX_RISK_SCORE`]
//! - case readiness is at least [`MIN_READINESS`]
//! - a report preflight has no critical gaps outstanding
//!
//! A failed risk or readiness check rejects the task outright, even when the
//! planner already marked it manual. Otherwise a manual task, a failed
//! projection or a blocked preflight holds the task for review.

use crate::models::{
    ActionTask, ApprovalMode, CaseSnapshot, GovernanceDecision, TaskKind, Verdict,
};
use chrono::Utc;

/// Highest risk score allowed to run.
pub const MAX_RISK_SCORE: i32 = 75;

/// Lowest readiness allowed for autonomous execution.
pub const MIN_READINESS: i32 = 70;

/// Reviewer name for approved decisions.
pub const REVIEWER_AUTO: &str = "auto";

/// Reviewer name for rejected or held decisions.
pub const REVIEWER_POLICY: &str = "policy";

/// Stateless policy gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct GovernanceGate;

impl GovernanceGate {
    /// Evaluate one task against the case.
    pub fn evaluate(&self, task: &ActionTask, case: &CaseSnapshot) -> GovernanceDecision {
        let projection_pass = task.projection_recommends_proceed();
        let risk_pass = task.risk_score <= MAX_RISK_SCORE;
        let readiness_pass = case.readiness_score >= MIN_READINESS;
        let gap_pass = !(task.kind == TaskKind::ReportPreflight && case.has_critical_gaps());

        let policy_checks = vec![
            check_line("Projection recommends proceeding", projection_pass),
            check_line(&format!("Risk score <= {}", MAX_RISK_SCORE), risk_pass),
            check_line(&format!("Readiness >= {}", MIN_READINESS), readiness_pass),
            check_line("No critical gaps blocking report preflight", gap_pass),
        ];

        let mut reasons = Vec::new();
        if !projection_pass {
            reasons.push("Projection recommends review before proceeding".to_string());
        }
        if !risk_pass {
            reasons.push("Task risk score exceeds policy threshold".to_string());
        }
        if !readiness_pass {
            reasons.push("Readiness is below the autonomous execution threshold".to_string());
        }
        if !gap_pass {
            reasons.push("Critical gaps block report preflight execution".to_string());
        }

        let mut decision = Verdict::Approved;
        if task.approval_mode == ApprovalMode::Manual {
            decision = Verdict::ReviewRequired;
            reasons.push("Task marked for manual approval by the planner".to_string());
        }

        if !risk_pass || !readiness_pass {
            decision = Verdict::Rejected;
        } else if !projection_pass || !gap_pass {
            decision = Verdict::ReviewRequired;
        }

        if reasons.is_empty() {
            reasons.push("All governance checks passed".to_string());
        }

        tracing::debug!(task = %task.task_id, kind = %task.kind, %decision, "governance decision");

        GovernanceDecision {
            task_id: task.task_id.clone(),
            policy_checks,
            decision,
            reasons,
            reviewer: if decision == Verdict::Approved {
                REVIEWER_AUTO
            } else {
                REVIEWER_POLICY
            }
            .to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Evaluate every task in plan order.
    pub fn evaluate_plan(&self, tasks: &[ActionTask], case: &CaseSnapshot) -> Vec<GovernanceDecision> {
        tasks.iter().map(|task| self.evaluate(task, case)).collect()
    }
}

fn check_line(name: &str, passed: bool) -> String {
    format!("{}: {}", name, if passed { "pass" } else { "fail" })
}
