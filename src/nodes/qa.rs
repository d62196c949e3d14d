//! QA node. Two-phase validation: a deterministic filesystem pre-step
//! (no LLM tokens spent) followed by an LLM assessment against the plan.
//! Any pre-step failure short-circuits straight to a failed result.

use crate::agent::{system_turn, user_turn, Role};
use crate::errors::NodeError;
use crate::nodes::{budgets, NodeContext, NodeHandler};
use crate::normaliser::TargetSchema;
use crate::state::{QaResult, StateUpdate, WorkflowState};
use async_trait::async_trait;
use std::path::Path;

const MAX_LINES_PER_FILE: usize = 50;
const MAX_FILES_READ: usize = 10;

fn schema() -> TargetSchema {
    TargetSchema {
        name: "QaOutput",
        required_fields: vec!["passed", "feedback"],
        optional_field_defaults: vec![("issues", serde_json::json!([]))],
        max_field_chars: vec![("feedback", 500)],
    }
}

/// Checks a reported file path: exists, is a regular file, is readable,
/// and is non-empty. Spends no LLM tokens.
fn deterministic_check(repo_root: &Path, relative: &Path) -> Result<(), String> {
    let path = repo_root.join(relative);
    let metadata = std::fs::metadata(&path).map_err(|_| format!("{} does not exist", relative.display()))?;
    if !metadata.is_file() {
        return Err(format!("{} is not a regular file", relative.display()));
    }
    if metadata.len() == 0 {
        return Err(format!("{} is empty", relative.display()));
    }
    std::fs::read_to_string(&path).map_err(|_| format!("{} is not readable", relative.display()))?;
    Ok(())
}

pub struct QaNode;

#[async_trait]
impl NodeHandler for QaNode {
    fn name(&self) -> &'static str {
        "qa"
    }

    async fn run(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StateUpdate, NodeError> {
        let implementation = state.current_implementation_result.clone().unwrap_or_default();

        let mut pre_step_issues = Vec::new();
        for path in &implementation.files_modified {
            if let Err(issue) = deterministic_check(&ctx.repo_root, path) {
                pre_step_issues.push(issue);
            }
        }

        if !pre_step_issues.is_empty() {
            return Ok(StateUpdate {
                current_qa_result: Some(QaResult {
                    passed: false,
                    feedback: "deterministic pre-step failed".into(),
                    issues: pre_step_issues,
                }),
                urgency_delta: crate::retry::UrgencyWeights::QA_FAIL,
                ..Default::default()
            });
        }

        let mut excerpts = String::new();
        for path in implementation.files_modified.iter().take(MAX_FILES_READ) {
            let full = ctx.repo_root.join(path);
            if let Ok(content) = std::fs::read_to_string(&full) {
                let snippet: String = content.lines().take(MAX_LINES_PER_FILE).collect::<Vec<_>>().join("\n");
                excerpts.push_str(&format!("--- {} ---\n{snippet}\n", path.display()));
            }
        }

        let plan = state.current_implementation_plan.clone().unwrap_or_default();
        let turns = vec![
            system_turn("You are QA. Compare the plan to the file excerpts and judge whether the measurable outcome is met."),
            user_turn(format!(
                "Plan:\n{plan}\nReported result summary: {}\nFile excerpts:\n{excerpts}\nRespond with JSON \
                 {{\"passed\": true|false, \"feedback\": \"...\", \"issues\": [\"...\"]}}.",
                implementation.result_summary
            )),
        ];

        let output = ctx
            .invoker
            .invoke(Role::Primary, turns, &schema(), budgets::QA)
            .await
            .map_err(|e| crate::errors::ToolError::Failed {
                name: "qa".into(),
                message: e.to_string(),
            })?;

        let passed = output.value["passed"].as_bool().unwrap_or(false);
        let feedback = output.value["feedback"].as_str().unwrap_or_default().to_string();
        let issues: Vec<String> = output.value["issues"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        Ok(StateUpdate {
            current_qa_result: Some(QaResult { passed, feedback, issues }),
            urgency_delta: if passed { 0.0 } else { crate::retry::UrgencyWeights::QA_FAIL },
            ..Default::default()
        })
    }
}
