//! Outcome verification and replan adjustments.

use crate::models::{
    ActionTask, ApprovalMode, CaseSnapshot, GovernanceDecision, OutcomeRecord, OutcomeVerdict,
    TaskKind, TaskStatus, VerificationSummary, Verdict,
};
use crate::storage::generate_id;
use serde_json::json;

/// Thresholds for verification and replanning.
pub mod thresholds {
    /// Mean absolute variance above which a replan is triggered.
    pub const MAX_AVG_VARIANCE: f64 = 3.0;

    /// Lowest adaptation score a verified cycle can report.
    pub const MIN_ADAPTATION: f64 = 5.0;

    /// Highest adaptation score a verified cycle can report.
    pub const MAX_ADAPTATION: f64 = 98.0;

    /// Tasks at or above this risk need manual approval after a replan.
    pub const REPLAN_MANUAL_RISK: i32 = 50;

    /// Tasks projected below this base need manual approval after a replan.
    pub const REPLAN_MANUAL_BASE: i32 = 65;
}

/// Stateless verifier comparing expected and observed outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationEngine;

impl VerificationEngine {
    /// Summarize how well the cycle's outcomes matched expectation.
    pub fn verify(
        &self,
        outcomes: &[OutcomeRecord],
        decisions: &[GovernanceDecision],
        case: &CaseSnapshot,
    ) -> VerificationSummary {
        let gaps = case.critical_gap_count;

        if outcomes.is_empty() {
            let blocked = gaps > 0;
            return VerificationSummary {
                adaptation_score: f64::from(case.readiness_score.clamp(0, 100)),
                requires_replan: blocked,
                replan_signals: if blocked {
                    vec!["No executed outcomes yet; critical gaps still block progress".to_string()]
                } else {
                    Vec::new()
                },
                strategy_adjustments: if blocked {
                    vec!["Prioritize gap-resolution tasks first".to_string()]
                } else {
                    Vec::new()
                },
            };
        }

        let missed = outcomes
            .iter()
            .filter(|o| o.verdict == OutcomeVerdict::Missed)
            .count();
        let avg_variance = outcomes
            .iter()
            .map(|o| f64::from(o.variance.unsigned_abs()))
            .sum::<f64>()
            / outcomes.len() as f64;
        let rejected = count_verdict(decisions, Verdict::Rejected);
        let review = count_verdict(decisions, Verdict::ReviewRequired);

        let adaptation_score = (100.0
            - avg_variance * 6.0
            - missed as f64 * 14.0
            - rejected as f64 * 10.0
            - review as f64 * 5.0
            - f64::from(gaps) * 4.0)
            .clamp(thresholds::MIN_ADAPTATION, thresholds::MAX_ADAPTATION);

        let mut replan_signals = Vec::new();
        let mut strategy_adjustments = Vec::new();

        if missed > 0 {
            replan_signals.push(format!("{} task(s) missed expected KPI deltas", missed));
            strategy_adjustments.push("Increase evidence strengthening before execution".to_string());
        }
        if avg_variance > thresholds::MAX_AVG_VARIANCE {
            replan_signals.push(format!("High KPI variance detected ({:.1})", avg_variance));
            strategy_adjustments
                .push("Tighten projection thresholds and narrow auto-approval scope".to_string());
        }
        if rejected > 0 {
            replan_signals.push(format!("{} task(s) rejected by governance policy", rejected));
            strategy_adjustments.push("Split tasks into smaller low-risk increments".to_string());
        }
        if gaps > 0 {
            replan_signals.push(format!("Critical gaps remaining: {}", gaps));
            strategy_adjustments.push("Route the mission back to discovery for gap closure".to_string());
        }

        let requires_replan = missed > 0
            || avg_variance > thresholds::MAX_AVG_VARIANCE
            || rejected > 0
            || gaps > 0;

        if !requires_replan {
            strategy_adjustments
                .push("Maintain current execution strategy and monitor drift".to_string());
        }

        tracing::info!(
            adaptation_score,
            requires_replan,
            missed,
            rejected,
            review,
            "verified cycle outcomes"
        );

        VerificationSummary {
            adaptation_score,
            requires_replan,
            replan_signals,
            strategy_adjustments,
        }
    }

    /// Demote and tighten the plan when `summary` calls for a replan.
    ///
    /// Ready tasks drop back to pending, risky or weakly projected tasks need
    /// manual approval, and a single recalibration task is appended if the plan
    /// does not already carry one.
    pub fn apply_replan_adjustments(
        &self,
        tasks: Vec<ActionTask>,
        summary: &VerificationSummary,
    ) -> Vec<ActionTask> {
        if !summary.requires_replan {
            return tasks;
        }

        let mut adjusted: Vec<ActionTask> = tasks
            .into_iter()
            .map(|mut task| {
                if task.status == TaskStatus::Ready {
                    task.status = TaskStatus::Pending;
                }
                if task.risk_score >= thresholds::REPLAN_MANUAL_RISK
                    || task.projected_base() < thresholds::REPLAN_MANUAL_BASE
                {
                    task.approval_mode = ApprovalMode::Manual;
                }
                task
            })
            .collect();

        if adjusted
            .iter()
            .any(|t| t.kind == TaskKind::StrategyRecalibration)
        {
            return adjusted;
        }
        let Some(anchor_goal) = adjusted.first().map(|t| t.goal_id.clone()) else {
            return adjusted;
        };

        tracing::info!(goal = %anchor_goal, "injecting strategy recalibration task");
        adjusted.push(ActionTask {
            task_id: generate_id("task", TaskKind::StrategyRecalibration.as_str()),
            goal_id: anchor_goal,
            kind: TaskKind::StrategyRecalibration,
            input: json!({
                "reason": summary.replan_signals,
                "adaptation_score": summary.adaptation_score,
            }),
            expected_outcome: "Rebalanced plan with lower execution risk and higher confidence"
                .to_string(),
            preconditions: vec!["Verification summary available".to_string()],
            postconditions: vec!["Plan thresholds and governance posture updated".to_string()],
            rollback_plan: "Restore the prior plan ordering and approval modes".to_string(),
            risk_score: 25,
            approval_mode: ApprovalMode::Manual,
            status: TaskStatus::Ready,
            projection: None,
        });
        adjusted
    }
}

fn count_verdict(decisions: &[GovernanceDecision], verdict: Verdict) -> usize {
    decisions.iter().filter(|d| d.decision == verdict).count()
}
