//! Pure routing functions. No side channels: every function here takes
//! `&WorkflowState` and returns the next node name. Two applications of
//! any router function to equal state snapshots always produce the same
//! outcome.

use crate::state::{AssessorVerdict, TaskPlannerAction, WorkflowState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeName {
    ScopeAgent,
    TaskPlanner,
    Implementor,
    Qa,
    Assessor,
    MarkComplete,
    MarkFailed,
    IncrementAttempt,
    Report,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouterError {
    #[error("node {node:?} has no task_planner_action to route on")]
    MissingPlannerAction { node: NodeName },
    #[error("node {node:?} has no qa result to route on")]
    MissingQaResult { node: NodeName },
    #[error("node {node:?} has no assessor verdict to route on")]
    MissingVerdict { node: NodeName },
}

pub fn after_scope_agent(state: &WorkflowState) -> NodeName {
    if state.milestones.is_empty() {
        NodeName::Report
    } else {
        NodeName::TaskPlanner
    }
}

pub fn after_task_planner(state: &WorkflowState) -> Result<NodeName, RouterError> {
    match &state.task_planner_action {
        Some(TaskPlannerAction::Implement { .. }) => Ok(NodeName::Implementor),
        Some(TaskPlannerAction::Skip) => Ok(NodeName::MarkComplete),
        Some(TaskPlannerAction::Abort { .. }) => Ok(NodeName::MarkFailed),
        Some(TaskPlannerAction::MilestoneDone) => Ok(NodeName::Assessor),
        None => Err(RouterError::MissingPlannerAction {
            node: NodeName::TaskPlanner,
        }),
    }
}

pub fn after_implementor(_state: &WorkflowState) -> NodeName {
    NodeName::Qa
}

pub fn after_qa(state: &WorkflowState) -> Result<NodeName, RouterError> {
    let qa = state
        .current_qa_result
        .as_ref()
        .ok_or(RouterError::MissingQaResult { node: NodeName::Qa })?;
    if qa.passed {
        Ok(NodeName::MarkComplete)
    } else if state.attempt_count < state.max_attempts {
        Ok(NodeName::IncrementAttempt)
    } else {
        Ok(NodeName::MarkFailed)
    }
}

pub fn after_mark_complete(state: &WorkflowState) -> NodeName {
    if state.tasks_since_last_review >= state.review_interval || state.urgency >= 1.0 {
        NodeName::Assessor
    } else {
        NodeName::TaskPlanner
    }
}

/// `mark_failed` always routes to `assessor` so strategic impact is
/// evaluated.
pub fn after_mark_failed(_state: &WorkflowState) -> NodeName {
    NodeName::Assessor
}

/// Single dispatch point the engine calls after folding a node's
/// `StateUpdate` into state: given the node just executed, decide the
/// next one by delegating to the matching `after_*` function.
pub fn next(state: &WorkflowState, current: NodeName) -> Result<NodeName, RouterError> {
    match current {
        NodeName::ScopeAgent => Ok(after_scope_agent(state)),
        NodeName::TaskPlanner => after_task_planner(state),
        NodeName::Implementor => Ok(after_implementor(state)),
        NodeName::Qa => after_qa(state),
        NodeName::Assessor => after_assessor(state),
        NodeName::MarkComplete => Ok(after_mark_complete(state)),
        NodeName::MarkFailed => Ok(after_mark_failed(state)),
        NodeName::IncrementAttempt => Ok(NodeName::Implementor),
        NodeName::Report => Ok(NodeName::Report),
    }
}

pub fn after_assessor(state: &WorkflowState) -> Result<NodeName, RouterError> {
    // The verdict is read from state, not passed in, to keep this a pure
    // function of `&WorkflowState` like every other router function.
    let verdict = state
        .last_assessor_verdict
        .as_ref()
        .ok_or(RouterError::MissingVerdict {
            node: NodeName::Assessor,
        })?;
    match verdict {
        AssessorVerdict::Aligned | AssessorVerdict::MinorDrift { .. } => Ok(NodeName::TaskPlanner),
        AssessorVerdict::MilestoneComplete => {
            if state.active_milestone_index + 1 < state.milestones.len() {
                Ok(NodeName::TaskPlanner)
            } else {
                Ok(NodeName::Report)
            }
        }
        AssessorVerdict::MajorDivergence { .. } => Ok(NodeName::ScopeAgent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Milestone, QaResult, WorkflowState};
    use std::path::PathBuf;

    fn base_state() -> WorkflowState {
        let mut s = WorkflowState::new("req", PathBuf::from("."), 5, 3);
        s.milestones = vec![Milestone::new("m0", "sketch")];
        s
    }

    #[test]
    fn after_scope_agent_routes_to_report_when_no_milestones() {
        let state = WorkflowState::new("req", PathBuf::from("."), 5, 3);
        assert_eq!(after_scope_agent(&state), NodeName::Report);
    }

    #[test]
    fn after_scope_agent_routes_to_planner_when_milestones_exist() {
        assert_eq!(after_scope_agent(&base_state()), NodeName::TaskPlanner);
    }

    #[test]
    fn after_task_planner_covers_all_four_actions() {
        let mut state = base_state();
        state.task_planner_action = Some(TaskPlannerAction::Implement {
            plan: "p".into(),
            carry_forward: vec![],
        });
        assert_eq!(after_task_planner(&state).unwrap(), NodeName::Implementor);

        state.task_planner_action = Some(TaskPlannerAction::Skip);
        assert_eq!(after_task_planner(&state).unwrap(), NodeName::MarkComplete);

        state.task_planner_action = Some(TaskPlannerAction::Abort {
            escalation_context: "infeasible".into(),
        });
        assert_eq!(after_task_planner(&state).unwrap(), NodeName::MarkFailed);

        state.task_planner_action = Some(TaskPlannerAction::MilestoneDone);
        assert_eq!(after_task_planner(&state).unwrap(), NodeName::Assessor);
    }

    #[test]
    fn after_qa_routes_by_pass_and_attempt_count() {
        let mut state = base_state();
        state.current_qa_result = Some(QaResult {
            passed: true,
            feedback: "ok".into(),
            issues: vec![],
        });
        assert_eq!(after_qa(&state).unwrap(), NodeName::MarkComplete);

        state.current_qa_result = Some(QaResult {
            passed: false,
            feedback: "missing registration".into(),
            issues: vec!["missing registration".into()],
        });
        state.attempt_count = 0;
        assert_eq!(after_qa(&state).unwrap(), NodeName::IncrementAttempt);

        state.attempt_count = 3;
        assert_eq!(after_qa(&state).unwrap(), NodeName::MarkFailed);
    }

    #[test]
    fn after_mark_complete_triggers_assessor_on_review_interval_or_urgency() {
        let mut state = base_state();
        state.tasks_since_last_review = 4;
        assert_eq!(after_mark_complete(&state), NodeName::TaskPlanner);

        state.tasks_since_last_review = 5;
        assert_eq!(after_mark_complete(&state), NodeName::Assessor);

        state.tasks_since_last_review = 0;
        state.urgency = 1.0;
        assert_eq!(after_mark_complete(&state), NodeName::Assessor);
    }

    #[test]
    fn after_mark_failed_always_routes_to_assessor() {
        assert_eq!(after_mark_failed(&base_state()), NodeName::Assessor);
    }

    #[test]
    fn after_assessor_milestone_complete_advances_or_reports() {
        let mut state = base_state();
        state.milestones.push(Milestone::new("m1", "sketch"));
        state.last_assessor_verdict = Some(AssessorVerdict::MilestoneComplete);
        assert_eq!(after_assessor(&state).unwrap(), NodeName::TaskPlanner);

        state.active_milestone_index = 1;
        assert_eq!(after_assessor(&state).unwrap(), NodeName::Report);
    }

    #[test]
    fn after_assessor_major_divergence_routes_to_scope_agent() {
        let mut state = base_state();
        state.last_assessor_verdict = Some(AssessorVerdict::MajorDivergence {
            divergence_analysis: "scope drifted".into(),
        });
        assert_eq!(after_assessor(&state).unwrap(), NodeName::ScopeAgent);
    }

    #[test]
    fn routing_is_pure_same_snapshot_same_outcome() {
        let mut state = base_state();
        state.current_qa_result = Some(QaResult {
            passed: false,
            feedback: "x".into(),
            issues: vec![],
        });
        let snapshot = state.clone();
        assert_eq!(after_qa(&state).unwrap(), after_qa(&snapshot).unwrap());
    }

    proptest::proptest! {
        #[test]
        fn router_never_panics_on_arbitrary_valid_states(
            attempt_count in 0u32..=3,
            max_attempts in 1u32..=5,
            tasks_since_last_review in 0u32..=10,
            review_interval in 1u32..=10,
            urgency in 0.0f64..=3.0,
            milestone_count in 1usize..=4,
            active_milestone_index in 0usize..4,
        ) {
            let mut state = WorkflowState::new("req", PathBuf::from("."), review_interval, max_attempts);
            state.milestones = (0..milestone_count).map(|i| Milestone::new(format!("m{i}"), "sketch")).collect();
            state.active_milestone_index = active_milestone_index.min(milestone_count - 1);
            state.attempt_count = attempt_count.min(max_attempts);
            state.tasks_since_last_review = tasks_since_last_review;
            state.urgency = urgency;

            prop_assert!(state.check_invariants().is_ok());

            let _ = after_scope_agent(&state);
            let _ = after_mark_complete(&state);
            let _ = after_mark_failed(&state);

            state.current_qa_result = Some(QaResult { passed: urgency < 1.0, feedback: String::new(), issues: vec![] });
            prop_assert!(after_qa(&state).is_ok());

            state.task_planner_action = Some(TaskPlannerAction::Skip);
            prop_assert!(after_task_planner(&state).is_ok());

            state.last_assessor_verdict = Some(AssessorVerdict::Aligned);
            prop_assert!(after_assessor(&state).is_ok());
        }
    }
}
