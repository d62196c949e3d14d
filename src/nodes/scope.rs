//! ScopeAgent node: produces `remit` and `milestones`, or, on entry from
//! a major-divergence re-plan, revises them from the active milestone
//! forward while leaving completed milestones untouched.

use crate::agent::{system_turn, user_turn, Role};
use crate::errors::{NodeError, ScopeError};
use crate::nodes::{budgets, NodeContext, NodeHandler};
use crate::normaliser::TargetSchema;
use crate::state::{Milestone, StateUpdate, WorkflowState};
use async_trait::async_trait;

fn schema() -> TargetSchema {
    TargetSchema {
        name: "ScopeAgentOutput",
        required_fields: vec!["remit", "milestones"],
        optional_field_defaults: vec![],
        max_field_chars: vec![("remit", 1_000)],
    }
}

fn parse_milestones(value: &serde_json::Value) -> Result<Vec<Milestone>, ScopeError> {
    let items = value
        .get("milestones")
        .and_then(|v| v.as_array())
        .ok_or(ScopeError::NoMilestones)?;
    if items.is_empty() {
        return Err(ScopeError::NoMilestones);
    }
    let mut milestones = Vec::with_capacity(items.len());
    for item in items {
        let description = item
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let sketch = item.get("sketch").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let milestone = Milestone::new(description, sketch);
        if !milestone.is_within_limit() {
            return Err(ScopeError::MilestoneTooLong {
                len: milestone.description.chars().count(),
            });
        }
        milestones.push(milestone);
    }
    Ok(milestones)
}

pub struct ScopeAgentNode;

#[async_trait]
impl NodeHandler for ScopeAgentNode {
    fn name(&self) -> &'static str {
        "scope_agent"
    }

    async fn run(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StateUpdate, NodeError> {
        let mut turns = vec![system_turn(
            "You are the scope agent. Respond with JSON {\"remit\": \"...\", \"milestones\": [{\"description\": \"...\", \"sketch\": \"...\"}]}.",
        )];

        if let Some(prior_work) = &state.prior_work {
            turns.push(user_turn(format!(
                "Re-plan from divergence.\nUser request: {}\nPrior work:\n{}\nDivergence analysis:\n{}\nCompleted milestones (immutable, keep as-is): {:?}\nRewrite the remit if needed and the milestones from the active index forward only.",
                state.user_request,
                prior_work,
                state.divergence_analysis.clone().unwrap_or_default(),
                &state.milestones[..state.active_milestone_index.min(state.milestones.len())],
            )));
        } else {
            turns.push(user_turn(format!(
                "User request: {}\nProduce the remit and an ordered list of user-observable milestones.",
                state.user_request
            )));
        }

        let output = ctx
            .invoker
            .invoke(Role::Primary, turns, &schema(), budgets::SCOPE_AGENT)
            .await
            .map_err(|e| ScopeError::Normaliser(crate::errors::NormaliserError {
                schema: "ScopeAgentOutput".into(),
                attempted: vec![],
                reason: e.to_string(),
            }))?;

        let remit = output.value["remit"].as_str().unwrap_or_default().to_string();
        if remit.chars().count() > 1_000 {
            return Err(ScopeError::RemitTooLong { len: remit.chars().count() }.into());
        }

        let new_milestones = parse_milestones(&output.value)?;

        let update = if state.prior_work.is_some() {
            StateUpdate {
                remit: Some(remit),
                reset_milestones_from_current: Some(new_milestones),
                clear_carry_forward: true,
                reset_attempt_count: true,
                reset_tasks_since_review: true,
                reset_urgency: true,
                ..Default::default()
            }
        } else {
            StateUpdate {
                remit: Some(remit),
                milestones: Some(new_milestones),
                ..Default::default()
            }
        };

        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_milestones_rejects_empty_list() {
        let value = serde_json::json!({"milestones": []});
        assert!(matches!(parse_milestones(&value), Err(ScopeError::NoMilestones)));
    }

    #[test]
    fn parse_milestones_rejects_overlong_description() {
        let value = serde_json::json!({
            "milestones": [{"description": "x".repeat(201), "sketch": "s"}]
        });
        assert!(matches!(
            parse_milestones(&value),
            Err(ScopeError::MilestoneTooLong { .. })
        ));
    }

    #[test]
    fn parse_milestones_accepts_valid_list() {
        let value = serde_json::json!({
            "milestones": [{"description": "titanium resource usable by player", "sketch": "add item, recipe, tests"}]
        });
        let milestones = parse_milestones(&value).unwrap();
        assert_eq!(milestones.len(), 1);
        assert_eq!(milestones[0].description, "titanium resource usable by player");
    }
}
