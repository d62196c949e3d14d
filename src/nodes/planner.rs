//! TaskPlanner node. On every entry it re-derives `carry_forward` from
//! current knowledge, selects at most one cohesive task to detail, and
//! resolves to exactly one of `implement`, `skip`, `abort`,
//! `milestone_done`.

use crate::agent::{system_turn, user_turn, Role};
use crate::errors::{NodeError, PlannerError};
use crate::nodes::{budgets, NodeContext, NodeHandler};
use crate::normaliser::TargetSchema;
use crate::state::{Directive, DirectiveKind, StateUpdate, TaskPlannerAction, WorkflowState};
use async_trait::async_trait;

const MAX_CARRY_FORWARD: usize = 10;
const MAX_RECENT_DONE_ENTRIES: usize = 7;

fn schema() -> TargetSchema {
    TargetSchema {
        name: "TaskPlannerOutput",
        required_fields: vec!["action"],
        optional_field_defaults: vec![
            ("carry_forward", serde_json::json!([])),
            ("plan", serde_json::json!("")),
            ("research_requests", serde_json::json!([])),
        ],
        max_field_chars: vec![],
    }
}

/// One of the planner's own requested research calls — `explain_code`,
/// `ask`, `web_search`, `rag_search`, `find_files_by_name`, or
/// `read_file_lines`. The planner decides whether to ask for any of
/// these and how many; this node just carries the request to the
/// registry and feeds the answer back for a second, final round.
struct ResearchRequest {
    tool: String,
    query: String,
}

fn parse_research_requests(value: &serde_json::Value) -> Vec<ResearchRequest> {
    value["research_requests"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|r| {
                    let tool = r.get("tool")?.as_str()?.to_string();
                    let query = r.get("query")?.as_str().unwrap_or_default().to_string();
                    Some(ResearchRequest { tool, query })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn tool_input(tool: &str, query: &str) -> serde_json::Value {
    match tool {
        "find_files_by_name" => serde_json::json!({"pattern": query}),
        "read_file_lines" => serde_json::json!({"path": query}),
        _ => serde_json::json!({"query": query}),
    }
}

const MAX_RESEARCH_CALLS_PER_ROUND: usize = 3;

/// Runs at most one research round: executes every tool the planner
/// asked for (bounded) and renders the findings as a prompt block, or
/// `None` if nothing was requested.
async fn run_research(ctx: &NodeContext, requests: Vec<ResearchRequest>) -> Option<String> {
    if requests.is_empty() {
        return None;
    }
    let mut findings = String::from("Research findings:\n");
    for request in requests.into_iter().take(MAX_RESEARCH_CALLS_PER_ROUND) {
        let input = tool_input(&request.tool, &request.query);
        match ctx.tools.call(&request.tool, input).await {
            Ok(value) => findings.push_str(&format!("- {}({}): {value}\n", request.tool, request.query)),
            Err(e) => findings.push_str(&format!("- {}({}) failed: {e}\n", request.tool, request.query)),
        }
    }
    Some(findings)
}

fn build_prompt(state: &WorkflowState) -> String {
    let milestone = state.active_milestone().map(|m| m.description.as_str()).unwrap_or("(no active milestone)");
    let recent_done: Vec<&str> = state
        .done_list
        .iter()
        .rev()
        .take(MAX_RECENT_DONE_ENTRIES)
        .map(|e| e.task_description.as_str())
        .collect();

    let mut prompt = format!(
        "Current milestone: {milestone}\nRecent completed tasks: {recent_done:?}\nCarry-forward (re-evaluate every item, do not assume any survive unchanged): {:?}\n",
        state.carry_forward
    );

    if let Some(qa) = &state.current_qa_result {
        if !qa.passed {
            prompt.push_str(&format!("Last QA feedback (this is a retry): {}\nIssues: {:?}\n", qa.feedback, qa.issues));
        }
    }
    if let Some(hint) = &state.correction_hint {
        prompt.push_str(&format!("Assessor correction hint: {hint}\n"));
    }
    if !state.pending_directives.is_empty() {
        prompt.push_str(&format!("Pending directives: {:?}\n", state.pending_directives));
    }

    prompt.push_str(
        "Respond with JSON: {\"action\": \"implement\"|\"skip\"|\"abort\"|\"milestone_done\", \
        \"plan\": \"...\" (if implement), \"carry_forward\": [\"...\"], \
        \"escalation_context\": \"...\" (if abort)}.",
    );
    prompt
}

fn apply_directives(carry_forward: Vec<String>, directives: &[Directive]) -> (Vec<String>, Vec<usize>) {
    let mut result = carry_forward;
    let mut consumed = Vec::new();
    for (idx, directive) in directives.iter().enumerate() {
        match directive.kind {
            DirectiveKind::Functional => result.insert(0, directive.description.clone()),
            DirectiveKind::Cleanup => result.push(directive.description.clone()),
        }
        consumed.push(idx);
    }
    (result, consumed)
}

fn parse_action(value: &serde_json::Value) -> Result<TaskPlannerAction, PlannerError> {
    let action = value.get("action").and_then(|v| v.as_str()).ok_or_else(|| PlannerError::UnresolvedAction {
        reason: "missing 'action' field".into(),
    })?;
    match action {
        "implement" => {
            let plan = value.get("plan").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            if plan.is_empty() {
                return Err(PlannerError::UnresolvedAction {
                    reason: "'implement' action missing a plan".into(),
                });
            }
            let carry_forward: Vec<String> = value
                .get("carry_forward")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default();
            Ok(TaskPlannerAction::Implement { plan, carry_forward })
        }
        "skip" => Ok(TaskPlannerAction::Skip),
        "abort" => {
            let escalation_context = value
                .get("escalation_context")
                .and_then(|v| v.as_str())
                .unwrap_or("planner judged task infeasible within milestone scope")
                .to_string();
            Ok(TaskPlannerAction::Abort { escalation_context })
        }
        "milestone_done" => Ok(TaskPlannerAction::MilestoneDone),
        other => Err(PlannerError::UnresolvedAction {
            reason: format!("unknown action '{other}'"),
        }),
    }
}

pub struct TaskPlannerNode;

#[async_trait]
impl NodeHandler for TaskPlannerNode {
    fn name(&self) -> &'static str {
        "task_planner"
    }

    async fn run(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StateUpdate, NodeError> {
        let system = system_turn(
            "You are the task planner. You select at most one cohesive task per round and \
             re-derive the carry-forward list from current knowledge every round. If you need more \
             context before deciding, respond with {\"action\": \"implement\", \"research_requests\": \
             [{\"tool\": \"explain_code\"|\"ask\"|\"web_search\"|\"rag_search\"|\"find_files_by_name\"|\
             \"read_file_lines\", \"query\": \"...\"}]} — you'll be asked again with the findings.",
        );
        let turns = vec![system, user_turn(build_prompt(state))];

        let output = ctx
            .invoker
            .invoke(Role::Primary, turns.clone(), &schema(), budgets::TASK_PLANNER)
            .await
            .map_err(|e| PlannerError::UnresolvedAction { reason: e.to_string() })?;

        let requests = parse_research_requests(&output.value);
        let output = match run_research(ctx, requests).await {
            Some(findings) => {
                let mut follow_up_turns = turns;
                follow_up_turns.push(user_turn(format!("{findings}\nNow give your final decision.")));
                ctx.invoker
                    .invoke(Role::Primary, follow_up_turns, &schema(), budgets::TASK_PLANNER)
                    .await
                    .map_err(|e| PlannerError::UnresolvedAction { reason: e.to_string() })?
            }
            None => output,
        };

        let action = parse_action(&output.value)?;

        let (consumed_directives, mut update) = match &action {
            TaskPlannerAction::Implement { plan, carry_forward } => {
                let (new_carry_forward, consumed) = apply_directives(carry_forward.clone(), &state.pending_directives);
                let mut new_carry_forward = new_carry_forward;
                new_carry_forward.truncate(MAX_CARRY_FORWARD);
                let urgency_delta = if crate::retry::UrgencyWeights::churn_exceeds_half(&state.carry_forward, &new_carry_forward) {
                    crate::retry::UrgencyWeights::CARRY_FORWARD_CHURN
                } else {
                    0.0
                };
                (
                    consumed,
                    StateUpdate {
                        current_task_description: Some(plan.clone()),
                        current_implementation_plan: Some(plan.clone()),
                        carry_forward: Some(new_carry_forward),
                        task_planner_action: Some(action.clone()),
                        clear_correction_hint: true,
                        urgency_delta,
                        ..Default::default()
                    },
                )
            }
            TaskPlannerAction::Skip => (
                Vec::new(),
                StateUpdate {
                    task_planner_action: Some(action.clone()),
                    clear_correction_hint: true,
                    ..Default::default()
                },
            ),
            TaskPlannerAction::Abort { escalation_context } => (
                Vec::new(),
                StateUpdate {
                    escalation_context: Some(escalation_context.clone()),
                    task_planner_action: Some(action.clone()),
                    urgency_delta: crate::retry::UrgencyWeights::ABORT,
                    increment_milestone_aborts: true,
                    ..Default::default()
                },
            ),
            TaskPlannerAction::MilestoneDone => (
                Vec::new(),
                StateUpdate {
                    task_planner_action: Some(action.clone()),
                    ..Default::default()
                },
            ),
        };

        update.consume_directives = consumed_directives;
        Ok(update)
    }
}
