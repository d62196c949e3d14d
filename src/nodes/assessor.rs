//! Assessor node. Judges alignment between accumulated work and the
//! remit, resolving to one of four verdicts. Triggered periodically, on
//! `milestone_done`, on task abort, or when urgency crosses 1.0.

use crate::agent::{system_turn, user_turn, Role};
use crate::errors::NodeError;
use crate::nodes::{budgets, NodeContext, NodeHandler};
use crate::normaliser::TargetSchema;
use crate::state::{AssessorVerdict, StateUpdate, WorkflowState};
use async_trait::async_trait;

fn schema() -> TargetSchema {
    TargetSchema {
        name: "AssessorOutput",
        required_fields: vec!["verdict"],
        optional_field_defaults: vec![
            ("correction_hint", serde_json::json!("")),
            ("divergence_analysis", serde_json::json!("")),
        ],
        max_field_chars: vec![("correction_hint", 200)],
    }
}

pub(crate) fn rollup_done_list(state: &WorkflowState) -> String {
    state
        .done_list
        .iter()
        .map(|e| {
            if e.failed {
                format!("- FAILED: {} ({})", e.task_description, e.escalation_context.clone().unwrap_or_default())
            } else {
                format!("- {}: {}", e.task_description, e.result_summary)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_verdict(value: &serde_json::Value) -> Result<AssessorVerdict, NodeError> {
    let verdict = value.get("verdict").and_then(|v| v.as_str()).ok_or_else(|| {
        crate::errors::ToolError::InvalidInput {
            name: "assessor".into(),
            message: "missing 'verdict' field".into(),
        }
    })?;
    Ok(match verdict {
        "aligned" => AssessorVerdict::Aligned,
        "minor_drift" => AssessorVerdict::MinorDrift {
            correction_hint: value.get("correction_hint").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        },
        "major_divergence" => AssessorVerdict::MajorDivergence {
            divergence_analysis: value
                .get("divergence_analysis")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        },
        "milestone_complete" => AssessorVerdict::MilestoneComplete,
        other => {
            return Err(crate::errors::ToolError::InvalidInput {
                name: "assessor".into(),
                message: format!("unknown verdict '{other}'"),
            }
            .into())
        }
    })
}

pub struct AssessorNode;

#[async_trait]
impl NodeHandler for AssessorNode {
    fn name(&self) -> &'static str {
        "assessor"
    }

    async fn run(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StateUpdate, NodeError> {
        let milestone = state.active_milestone().map(|m| m.description.as_str()).unwrap_or("(none)");
        let turns = vec![
            system_turn(
                "You are the assessor. Judge whether recent work remains aligned with the remit. \
                 Respond with JSON {\"verdict\": \"aligned\"|\"minor_drift\"|\"major_divergence\"|\"milestone_complete\", \
                 \"correction_hint\": \"...\" (if minor_drift), \"divergence_analysis\": \"...\" (if major_divergence)}.",
            ),
            user_turn(format!(
                "Remit: {}\nCurrent milestone: {milestone}\nWork since last review:\n{}\nCarry-forward: {:?}\nEscalation context (if any): {}\nAborts within this milestone: {}/{}",
                state.remit,
                rollup_done_list(state),
                state.carry_forward,
                state.escalation_context.clone().unwrap_or_default(),
                state.aborts_in_milestone,
                crate::retry::MAX_ABORTS_PER_MILESTONE,
            )),
        ];

        let output = ctx
            .invoker
            .invoke(Role::Primary, turns, &schema(), budgets::ASSESSOR)
            .await
            .map_err(|e| crate::errors::ToolError::Failed {
                name: "assessor".into(),
                message: e.to_string(),
            })?;

        let mut verdict = parse_verdict(&output.value)?;

        // Two aborts within the same milestone escalate to a scope
        // re-plan regardless of what the model itself judged.
        if state.aborts_in_milestone >= crate::retry::MAX_ABORTS_PER_MILESTONE && !matches!(verdict, AssessorVerdict::MajorDivergence { .. }) {
            verdict = AssessorVerdict::MajorDivergence {
                divergence_analysis: format!(
                    "escalated: {} aborts reached within the current milestone, forcing a scope re-plan",
                    state.aborts_in_milestone
                ),
            };
        }

        let mut update = StateUpdate {
            reset_tasks_since_review: true,
            reset_urgency: true,
            last_assessor_verdict: Some(verdict.clone()),
            ..Default::default()
        };

        match &verdict {
            AssessorVerdict::Aligned => {}
            AssessorVerdict::MinorDrift { correction_hint } => {
                update.correction_hint = Some(correction_hint.clone());
                update.clear_carry_forward = true;
                // Carry a standing urgency bump into the next review cycle
                // instead of zeroing out: a minor-drift verdict still
                // counts toward the next escalation.
                update.reset_urgency = false;
                update.urgency_delta = crate::retry::UrgencyWeights::PRIOR_MINOR_DRIFT;
            }
            AssessorVerdict::MajorDivergence { divergence_analysis } => {
                update.divergence_analysis = Some(divergence_analysis.clone());
                update.prior_work = Some(rollup_done_list(state));
            }
            AssessorVerdict::MilestoneComplete => {
                if state.active_milestone_index + 1 < state.milestones.len() {
                    update.advance_milestone = true;
                    update.clear_carry_forward = true;
                } else {
                    update.status = Some(crate::state::WorkflowStatus::Complete);
                }
            }
        }

        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::backend::MockBackend;
    use crate::retrieval::LexicalIndex;
    use crate::stream::StreamDispatcher;
    use crate::tools::ToolRegistry;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn ctx_with_response(response: &str) -> NodeContext {
        let mut backends: HashMap<Role, Arc<dyn crate::agent::backend::AgentBackend>> = HashMap::new();
        backends.insert(Role::Primary, Arc::new(MockBackend::new(vec![response.to_string()])));
        NodeContext {
            invoker: Arc::new(crate::agent::AgentInvoker::new(backends)),
            tools: Arc::new(ToolRegistry::new()),
            retrieval: Arc::new(LexicalIndex::new(".")),
            repo_root: PathBuf::from("."),
            streams: Arc::new(StreamDispatcher::new()),
        }
    }

    #[tokio::test]
    async fn two_aborts_in_milestone_forces_major_divergence_regardless_of_model_verdict() {
        let mut state = WorkflowState::new("req", PathBuf::from("."), 5, 3);
        state.milestones = vec![crate::state::Milestone::new("m", "s")];
        state.aborts_in_milestone = crate::retry::MAX_ABORTS_PER_MILESTONE;
        let ctx = ctx_with_response(r#"{"verdict": "aligned"}"#);

        let update = AssessorNode.run(&state, &ctx).await.unwrap();
        assert!(matches!(update.last_assessor_verdict, Some(AssessorVerdict::MajorDivergence { .. })));
    }

    #[tokio::test]
    async fn minor_drift_carries_urgency_forward_instead_of_resetting() {
        let mut state = WorkflowState::new("req", PathBuf::from("."), 5, 3);
        state.milestones = vec![crate::state::Milestone::new("m", "s")];
        let ctx = ctx_with_response(r#"{"verdict": "minor_drift", "correction_hint": "tighten scope"}"#);

        let update = AssessorNode.run(&state, &ctx).await.unwrap();
        assert!(!update.reset_urgency);
        assert_eq!(update.urgency_delta, crate::retry::UrgencyWeights::PRIOR_MINOR_DRIFT);
    }

    #[test]
    fn parse_verdict_minor_drift_carries_hint() {
        let value = serde_json::json!({"verdict": "minor_drift", "correction_hint": "focus on recipe"});
        let verdict = parse_verdict(&value).unwrap();
        match verdict {
            AssessorVerdict::MinorDrift { correction_hint } => assert_eq!(correction_hint, "focus on recipe"),
            _ => panic!("expected MinorDrift"),
        }
    }

    #[test]
    fn parse_verdict_rejects_unknown() {
        let value = serde_json::json!({"verdict": "shrug"});
        assert!(parse_verdict(&value).is_err());
    }
}
