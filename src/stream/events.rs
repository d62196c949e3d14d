//! Event payload shapes for the four streams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form agent prose: thinking, reasoning, final text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub node_name: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Task lifecycle: started, completed, failed, milestone advanced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskLifecycle {
    Started { description: String },
    Completed { description: String, summary: String },
    Failed { description: String, escalation_context: String },
    MilestoneAdvanced { from_index: usize, to_index: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub lifecycle: TaskLifecycle,
    pub timestamp: DateTime<Utc>,
}

/// Node lifecycle: start, end, error. Keyed on the outermost chain run
/// with inputs shape equal to the workflow state — nested invocations
/// (subagent, LLM, tool) do not emit node events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeLifecycle {
    Start,
    End,
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEvent {
    pub node_name: String,
    pub lifecycle: NodeLifecycle,
    pub timestamp: DateTime<Utc>,
}

/// Tool invocation start/end (reserved for future UIs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolLifecycle {
    Start,
    End { success: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEvent {
    pub tool_name: String,
    pub lifecycle: ToolLifecycle,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_lifecycle_serde_round_trip() {
        let event = TaskLifecycle::Completed {
            description: "add resource".into(),
            summary: "done".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: TaskLifecycle = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn node_lifecycle_error_carries_message() {
        let event = NodeLifecycle::Error {
            message: "tool failed".into(),
        };
        match event {
            NodeLifecycle::Error { message } => assert_eq!(message, "tool failed"),
            _ => panic!("expected Error variant"),
        }
    }
}
