//! Implementor node. Executes `current_implementation_plan` using the
//! file-edit/read/search tools and emits `current_implementation_result`.
//! Never claims a file modification without a successful `edit_file`
//! call — the tool call result, not the agent's prose, is the source of
//! truth for `files_modified`.

use crate::agent::{system_turn, user_turn, Role};
use crate::errors::NodeError;
use crate::nodes::{budgets, NodeContext, NodeHandler};
use crate::normaliser::TargetSchema;
use crate::state::{ImplementationResult, StateUpdate, WorkflowState};
use async_trait::async_trait;
use std::path::PathBuf;

fn schema() -> TargetSchema {
    TargetSchema {
        name: "ImplementorOutput",
        required_fields: vec!["result_summary", "success"],
        optional_field_defaults: vec![("issues_noticed", serde_json::json!([])), ("edits", serde_json::json!([]))],
        max_field_chars: vec![],
    }
}

struct ProposedEdit {
    path: String,
    content: String,
}

fn parse_edits(value: &serde_json::Value) -> Vec<ProposedEdit> {
    value["edits"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|e| {
                    let path = e.get("path")?.as_str()?.to_string();
                    let content = e.get("content")?.as_str()?.to_string();
                    Some(ProposedEdit { path, content })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub struct ImplementorNode;

#[async_trait]
impl NodeHandler for ImplementorNode {
    fn name(&self) -> &'static str {
        "implementor"
    }

    async fn run(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StateUpdate, NodeError> {
        let plan = state.current_implementation_plan.clone().unwrap_or_default();

        let turns = vec![
            system_turn(
                "You are the implementor. Propose the plan's file changes as an \"edits\" array of \
                 {\"path\", \"content\"}; each one is applied through the edit_file tool. Only files the \
                 tool actually wrote may be reported as modified.",
            ),
            user_turn(format!(
                "Repo root: {}\nPlan:\n{plan}\nWhen finished, respond with JSON {{\"edits\": \
                 [{{\"path\": \"...\", \"content\": \"...\"}}], \"result_summary\": \"...\", \
                 \"issues_noticed\": [\"...\"], \"success\": true|false}}.",
                ctx.repo_root.display()
            )),
        ];

        let output = ctx
            .invoker
            .invoke(Role::Primary, turns, &schema(), budgets::IMPLEMENTOR)
            .await
            .map_err(|e| crate::errors::ToolError::Failed {
                name: "implementor".into(),
                message: e.to_string(),
            })?;

        let result_summary = output.value["result_summary"].as_str().unwrap_or_default().to_string();
        let mut issues_noticed: Vec<String> = output.value["issues_noticed"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let reported_success = output.value["success"].as_bool().unwrap_or(false);

        let proposed = parse_edits(&output.value);
        let mut files_modified = Vec::with_capacity(proposed.len());
        let mut all_edits_applied = true;
        for edit in proposed {
            match ctx
                .tools
                .call("edit_file", serde_json::json!({"path": edit.path, "content": edit.content}))
                .await
            {
                Ok(_) => files_modified.push(PathBuf::from(edit.path)),
                Err(e) => {
                    all_edits_applied = false;
                    issues_noticed.push(format!("edit_file failed for {}: {e}", edit.path));
                }
            }
        }

        let result = ImplementationResult {
            files_modified,
            result_summary,
            issues_noticed,
            success: reported_success && all_edits_applied,
        };

        Ok(StateUpdate {
            current_implementation_result: Some(result),
            ..Default::default()
        })
    }
}
