//! The three pure bookkeeping nodes: `mark_complete`, `mark_failed`,
//! `increment_attempt`. None of these call an agent — they fold the
//! ephemeral task fields into a `DoneEntry` (or preserve them for
//! retry) deterministically.

use crate::errors::NodeError;
use crate::nodes::{NodeContext, NodeHandler};
use crate::state::{DoneEntry, StateUpdate, WorkflowState};
use async_trait::async_trait;

pub struct MarkCompleteNode;

#[async_trait]
impl NodeHandler for MarkCompleteNode {
    fn name(&self) -> &'static str {
        "mark_complete"
    }

    async fn run(&self, state: &WorkflowState, _ctx: &NodeContext) -> Result<StateUpdate, NodeError> {
        let task_description = state.current_task_description.clone().unwrap_or_else(|| "(skipped)".into());
        let result_summary = state
            .current_implementation_result
            .as_ref()
            .map(|r| r.result_summary.clone())
            .unwrap_or_else(|| "gap already closed, no implementation needed".into());
        let qa_feedback = state.current_qa_result.as_ref().map(|r| r.feedback.clone());

        let entry = DoneEntry::completed(task_description, result_summary, qa_feedback, state.active_milestone_index);

        Ok(StateUpdate {
            push_done_entry: Some(entry),
            clear_ephemeral: true,
            increment_tasks_since_review: true,
            reset_attempt_count: true,
            clear_escalation_context: true,
            ..Default::default()
        })
    }
}

pub struct MarkFailedNode;

#[async_trait]
impl NodeHandler for MarkFailedNode {
    fn name(&self) -> &'static str {
        "mark_failed"
    }

    async fn run(&self, state: &WorkflowState, _ctx: &NodeContext) -> Result<StateUpdate, NodeError> {
        let task_description = state.current_task_description.clone().unwrap_or_else(|| "(unknown task)".into());
        let escalation_context = state
            .escalation_context
            .clone()
            .or_else(|| state.current_qa_result.as_ref().map(|r| r.feedback.clone()))
            .unwrap_or_else(|| "exhausted retry attempts".into());

        let entry = DoneEntry::failed(task_description, escalation_context, state.active_milestone_index);

        Ok(StateUpdate {
            push_done_entry: Some(entry),
            clear_ephemeral: true,
            reset_attempt_count: true,
            clear_escalation_context: true,
            ..Default::default()
        })
    }
}

pub struct IncrementAttemptNode;

#[async_trait]
impl NodeHandler for IncrementAttemptNode {
    fn name(&self) -> &'static str {
        "increment_attempt"
    }

    async fn run(&self, _state: &WorkflowState, _ctx: &NodeContext) -> Result<StateUpdate, NodeError> {
        Ok(StateUpdate {
            increment_attempt: true,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateStore;
    use std::path::PathBuf;

    fn test_ctx() -> NodeContext {
        use crate::agent::backend::MockBackend;
        use crate::agent::AgentInvoker;
        use crate::retrieval::LexicalIndex;
        use crate::stream::StreamDispatcher;
        use crate::tools::ToolRegistry;
        use std::collections::HashMap;
        use std::sync::Arc;

        let mut backends: HashMap<crate::agent::Role, Arc<dyn crate::agent::backend::AgentBackend>> = HashMap::new();
        backends.insert(crate::agent::Role::Primary, Arc::new(MockBackend::new(vec![])));
        NodeContext {
            invoker: Arc::new(AgentInvoker::new(backends)),
            tools: Arc::new(ToolRegistry::new()),
            retrieval: Arc::new(LexicalIndex::new(".")),
            repo_root: PathBuf::from("."),
            streams: Arc::new(StreamDispatcher::new()),
        }
    }

    #[tokio::test]
    async fn mark_complete_appends_entry_and_clears_ephemeral() {
        let mut state = WorkflowState::new("req", PathBuf::from("."), 5, 3);
        state.current_task_description = Some("do thing".into());
        state.current_implementation_result = Some(crate::state::ImplementationResult {
            files_modified: vec![],
            result_summary: "done".into(),
            issues_noticed: vec![],
            success: true,
        });
        state.milestones = vec![crate::state::Milestone::new("m", "s")];

        let update = MarkCompleteNode.run(&state, &test_ctx()).await.unwrap();
        StateStore::apply(&mut state, update).unwrap();

        assert_eq!(state.done_list.len(), 1);
        assert!(!state.done_list[0].failed);
        assert!(state.current_task_description.is_none());
        assert_eq!(state.tasks_since_last_review, 1);
    }

    #[tokio::test]
    async fn mark_failed_appends_failed_entry() {
        let mut state = WorkflowState::new("req", PathBuf::from("."), 5, 3);
        state.current_task_description = Some("do thing".into());
        state.escalation_context = Some("infeasible".into());
        state.milestones = vec![crate::state::Milestone::new("m", "s")];

        let update = MarkFailedNode.run(&state, &test_ctx()).await.unwrap();
        StateStore::apply(&mut state, update).unwrap();

        assert_eq!(state.done_list.len(), 1);
        assert!(state.done_list[0].failed);
    }

    #[tokio::test]
    async fn mark_failed_clears_escalation_context_after_consuming_it() {
        let mut state = WorkflowState::new("req", PathBuf::from("."), 5, 3);
        state.current_task_description = Some("do thing".into());
        state.escalation_context = Some("stale abort from an earlier task".into());
        state.milestones = vec![crate::state::Milestone::new("m", "s")];

        let update = MarkFailedNode.run(&state, &test_ctx()).await.unwrap();
        StateStore::apply(&mut state, update).unwrap();

        assert_eq!(state.done_list[0].escalation_context.as_deref(), Some("stale abort from an earlier task"));
        assert!(state.escalation_context.is_none());
    }

    #[tokio::test]
    async fn increment_attempt_bumps_counter() {
        let mut state = WorkflowState::new("req", PathBuf::from("."), 5, 3);
        state.milestones = vec![crate::state::Milestone::new("m", "s")];

        let update = IncrementAttemptNode.run(&state, &test_ctx()).await.unwrap();
        StateStore::apply(&mut state, update).unwrap();

        assert_eq!(state.attempt_count, 1);
    }
}
