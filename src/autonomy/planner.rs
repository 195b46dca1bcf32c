//! Task planning: goals plus case readiness in, prioritized action tasks out.

use super::projector::OutcomeProjector;
use crate::models::{ActionTask, ApprovalMode, CaseSnapshot, Goal, TaskKind, TaskStatus};
use crate::storage::generate_id;
use serde_json::json;

/// Readiness at which the report path is considered low-risk.
pub const REPORT_READY_THRESHOLD: i32 = 80;

/// Turns an ordered goal list into a projected, prioritized task plan.
pub struct TaskPlanner<'a> {
    projector: &'a dyn OutcomeProjector,
}

impl<'a> TaskPlanner<'a> {
    pub fn new(projector: &'a dyn OutcomeProjector) -> Self {
        Self { projector }
    }

    /// Build the plan anchored on the highest-priority goal.
    ///
    /// `goals` must already be sorted by descending priority. Each task is
    /// projected; an unfavorable projection forces manual approval and holds a
    /// ready task back to pending. The result is ordered by `base - risk`,
    /// best first.
    pub fn plan(&self, goals: &[Goal], case: &CaseSnapshot) -> Vec<ActionTask> {
        let Some(anchor) = goals.first() else {
            return Vec::new();
        };

        let mut tasks: Vec<ActionTask> = base_tasks(&anchor.goal_id, case)
            .into_iter()
            .map(|mut task| {
                let projection = self.projector.project(&task.task_id, task.kind, case);
                if !projection.recommended_proceed {
                    task.approval_mode = ApprovalMode::Manual;
                    if task.status == TaskStatus::Ready {
                        task.status = TaskStatus::Pending;
                    }
                }
                task.projection = Some(projection);
                task
            })
            .collect();

        tasks.sort_by_key(|t| std::cmp::Reverse(t.projected_base() - t.risk_score));

        tracing::debug!(
            anchor = %anchor.goal_id,
            tasks = tasks.len(),
            "planned action tasks"
        );
        tasks
    }
}

fn base_tasks(goal_id: &str, case: &CaseSnapshot) -> Vec<ActionTask> {
    let has_gaps = case.has_critical_gaps();
    let report_ready = case.readiness_score >= REPORT_READY_THRESHOLD;

    let mut tasks = vec![
        ActionTask {
            task_id: generate_id("task", TaskKind::GapResolution.as_str()),
            goal_id: goal_id.to_string(),
            kind: TaskKind::GapResolution,
            input: json!({
                "top_critical_gap": case.top_critical_gap,
                "readiness_score": case.readiness_score,
                "critical_gap_count": case.critical_gap_count,
            }),
            expected_outcome: "Critical gaps reduced and readiness improved".to_string(),
            preconditions: vec!["Case context available".to_string()],
            postconditions: vec!["Gap tracker updated".to_string()],
            rollback_plan: "Reopen discovery prompts and revert the latest autofill decisions"
                .to_string(),
            risk_score: if has_gaps { 70 } else { 35 },
            approval_mode: if has_gaps {
                ApprovalMode::Manual
            } else {
                ApprovalMode::Conditional
            },
            status: if has_gaps {
                TaskStatus::Ready
            } else {
                TaskStatus::Pending
            },
            projection: None,
        },
        ActionTask {
            task_id: generate_id("task", TaskKind::ReportPreflight.as_str()),
            goal_id: goal_id.to_string(),
            kind: TaskKind::ReportPreflight,
            input: json!({
                "recommended_titles": first_titles(case, 3),
                "decision_deadline": case.decision_deadline,
                "target_audience": case.target_audience,
            }),
            expected_outcome: "Validated report path with governance readiness".to_string(),
            preconditions: vec!["Readiness >= 80".to_string(), "No critical gaps".to_string()],
            postconditions: vec!["Report payload can be generated".to_string()],
            rollback_plan: "Return to discovery and request the missing evidence".to_string(),
            risk_score: if report_ready { 30 } else { 65 },
            approval_mode: ApprovalMode::Conditional,
            status: if report_ready && !has_gaps {
                TaskStatus::Ready
            } else {
                TaskStatus::Pending
            },
            projection: None,
        },
    ];

    if !case.recommended_titles.is_empty() {
        tasks.push(ActionTask {
            task_id: generate_id("task", TaskKind::EvidenceStrengthening.as_str()),
            goal_id: goal_id.to_string(),
            kind: TaskKind::EvidenceStrengthening,
            input: json!({
                "recommended_titles": first_titles(case, 2),
                "top_critical_gap": case.top_critical_gap,
            }),
            expected_outcome: "Higher confidence recommendations backed by stronger evidence"
                .to_string(),
            preconditions: vec!["At least one recommendation available".to_string()],
            postconditions: vec!["Evidence quality notes attached".to_string()],
            rollback_plan: "Discard the evidence pass and keep the baseline recommendations"
                .to_string(),
            risk_score: 40,
            approval_mode: ApprovalMode::Auto,
            status: TaskStatus::Ready,
            projection: None,
        });
    }

    tasks
}

fn first_titles(case: &CaseSnapshot, n: usize) -> Vec<&str> {
    case.recommended_titles
        .iter()
        .take(n)
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autonomy::projector::HeuristicProjector;
    use crate::test_utils::{sample_case, sample_goal};

    fn plan(case: &CaseSnapshot) -> Vec<ActionTask> {
        let projector = HeuristicProjector::new();
        TaskPlanner::new(&projector).plan(&[sample_goal()], case)
    }

    fn find(tasks: &[ActionTask], kind: TaskKind) -> &ActionTask {
        tasks.iter().find(|t| t.kind == kind).unwrap()
    }

    #[test]
    fn test_no_goals_no_tasks() {
        let projector = HeuristicProjector::new();
        let tasks = TaskPlanner::new(&projector).plan(&[], &sample_case(90, 0));
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_ready_case_plan() {
        let tasks = plan(&sample_case(90, 0));
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.goal_id == "goal-top"));
        assert!(tasks.iter().all(|t| t.projection.is_some()));

        let gap = find(&tasks, TaskKind::GapResolution);
        assert_eq!(gap.risk_score, 35);
        assert_eq!(gap.approval_mode, ApprovalMode::Conditional);
        assert_eq!(gap.status, TaskStatus::Pending);

        let preflight = find(&tasks, TaskKind::ReportPreflight);
        assert_eq!(preflight.risk_score, 30);
        assert_eq!(preflight.approval_mode, ApprovalMode::Conditional);
        assert_eq!(preflight.status, TaskStatus::Ready);

        let evidence = find(&tasks, TaskKind::EvidenceStrengthening);
        assert_eq!(evidence.risk_score, 40);
        assert_eq!(evidence.approval_mode, ApprovalMode::Auto);
        assert_eq!(evidence.status, TaskStatus::Ready);
    }

    #[test]
    fn test_plan_sorted_by_base_minus_risk() {
        let tasks = plan(&sample_case(90, 0));
        // preflight 89-30=59, gap 87-35=52, evidence 79-40=39
        let kinds: Vec<TaskKind> = tasks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TaskKind::ReportPreflight,
                TaskKind::GapResolution,
                TaskKind::EvidenceStrengthening
            ]
        );
        let scores: Vec<i32> = tasks
            .iter()
            .map(|t| t.projected_base() - t.risk_score)
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_gapped_case_plan() {
        let mut case = sample_case(40, 2);
        case.recommended_titles.clear();
        let tasks = plan(&case);
        assert_eq!(tasks.len(), 2);

        let gap = find(&tasks, TaskKind::GapResolution);
        assert_eq!(gap.risk_score, 70);
        assert_eq!(gap.approval_mode, ApprovalMode::Manual);
        // Would start ready, but the projection says no
        assert_eq!(gap.status, TaskStatus::Pending);

        let preflight = find(&tasks, TaskKind::ReportPreflight);
        assert_eq!(preflight.risk_score, 65);
        assert_eq!(preflight.status, TaskStatus::Pending);
    }

    #[test]
    fn test_unfavorable_projection_forces_manual() {
        // Evidence base = 72 - 11 = 61: below the proceed threshold
        let tasks = plan(&sample_case(72, 0));
        let evidence = find(&tasks, TaskKind::EvidenceStrengthening);
        assert!(!evidence.projection_recommends_proceed());
        assert_eq!(evidence.approval_mode, ApprovalMode::Manual);
        assert_eq!(evidence.status, TaskStatus::Pending);
    }

    #[test]
    fn test_payload_title_limits() {
        let mut case = sample_case(90, 0);
        case.recommended_titles = (1..=5).map(|i| format!("Doc {}", i)).collect();
        let tasks = plan(&case);
        let preflight = find(&tasks, TaskKind::ReportPreflight);
        assert_eq!(preflight.input["recommended_titles"].as_array().unwrap().len(), 3);
        let evidence = find(&tasks, TaskKind::EvidenceStrengthening);
        assert_eq!(evidence.input["recommended_titles"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_task_ids_are_unique() {
        let tasks = plan(&sample_case(90, 0));
        assert_ne!(tasks[0].task_id, tasks[1].task_id);
        assert_ne!(tasks[1].task_id, tasks[2].task_id);
        for t in &tasks {
            assert_eq!(t.projection.as_ref().unwrap().task_id, t.task_id);
        }
    }
}
