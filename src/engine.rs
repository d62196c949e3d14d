//! `Engine` — the single-threaded driver loop: select node, invoke,
//! apply update, route, emit events, repeat until terminal.

use crate::checkpoint::CheckpointHook;
use crate::errors::{EngineError, NodeError};
use crate::nodes::{
    assessor::AssessorNode, bookkeeping::{IncrementAttemptNode, MarkCompleteNode, MarkFailedNode},
    implementor::ImplementorNode, planner::TaskPlannerNode, qa::QaNode, scope::ScopeAgentNode, NodeContext, NodeHandler,
};
use crate::router::{self, NodeName, RouterError};
use crate::state::{StateStore, StateUpdate, WorkflowState, WorkflowStatus};
use crate::stream::events::{NodeLifecycle, TaskLifecycle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, instrument};

/// Cooperative cancellation flag, checked at node boundaries only.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Engine {
    ctx: NodeContext,
    checkpoint: Arc<dyn CheckpointHook>,
    cancellation: CancellationToken,
    max_iterations: u32,
}

impl Engine {
    pub fn new(ctx: NodeContext, checkpoint: Arc<dyn CheckpointHook>, cancellation: CancellationToken, max_iterations: u32) -> Self {
        Self {
            ctx,
            checkpoint,
            cancellation,
            max_iterations,
        }
    }

    fn handler_for(&self, node: NodeName) -> Box<dyn NodeHandler> {
        match node {
            NodeName::ScopeAgent => Box::new(ScopeAgentNode),
            NodeName::TaskPlanner => Box::new(TaskPlannerNode),
            NodeName::Implementor => Box::new(ImplementorNode),
            NodeName::Qa => Box::new(QaNode),
            NodeName::Assessor => Box::new(AssessorNode),
            NodeName::MarkComplete => Box::new(MarkCompleteNode),
            NodeName::MarkFailed => Box::new(MarkFailedNode),
            NodeName::IncrementAttempt => Box::new(IncrementAttemptNode),
            NodeName::Report => unreachable!("Report is a terminal marker, never dispatched as a handler"),
        }
    }

    #[instrument(skip(self, state), fields(user_request = %state.user_request))]
    pub async fn run(&self, mut state: WorkflowState) -> Result<WorkflowState, EngineError> {
        let mut current = NodeName::ScopeAgent;
        let mut iterations: u32 = 0;

        loop {
            if self.cancellation.is_cancelled() {
                state.status = WorkflowStatus::Failed;
                state.error = Some("cancelled".into());
                return Err(crate::errors::CancellationSignal {
                    reason: "external cancellation flag observed at node boundary".into(),
                }
                .into());
            }

            if current == NodeName::Report {
                break;
            }

            iterations += 1;
            if iterations > self.max_iterations {
                state.status = WorkflowStatus::Failed;
                state.error = Some(format!("max_iterations ({}) exceeded", self.max_iterations));
                break;
            }

            let handler = self.handler_for(current);
            let node_name = handler.name().to_string();
            let started_at = chrono::Utc::now();
            self.ctx.streams.emit_node(node_name.clone(), NodeLifecycle::Start, started_at);

            let outcome = handler.run(&state, &self.ctx).await;
            let update = match outcome {
                Ok(update) => update,
                Err(err) => {
                    let ended_at = chrono::Utc::now();
                    self.ctx.streams.emit_node(
                        node_name.clone(),
                        NodeLifecycle::Error { message: err.to_string() },
                        ended_at,
                    );
                    match Self::recover(current, &state, &err) {
                        Some(update) => update,
                        None => return Err(Self::terminal(&state, err)),
                    }
                }
            };

            Self::emit_task_event(&self.ctx.streams, current, &state, &update, chrono::Utc::now());

            StateStore::apply(&mut state, update).map_err(|reason| EngineError::Routing(reason))?;
            self.ctx.streams.emit_node(node_name, NodeLifecycle::End, chrono::Utc::now());

            if matches!(state.status, WorkflowStatus::Complete | WorkflowStatus::Failed) {
                self.checkpoint.on_checkpoint(&state);
                current = NodeName::Report;
                continue;
            }

            self.checkpoint.on_checkpoint(&state);

            current = router::next(&state, current).map_err(|e: RouterError| EngineError::Routing(e.to_string()))?;
        }

        Ok(state)
    }

    /// Node-level failures are folded into a `StateUpdate` rather than
    /// propagated, except for the two terminal kinds. A recoverable
    /// failure mid-QA or mid-Assessor invoke must still populate the
    /// result the router expects downstream, or the router fails the
    /// whole run with a missing-result error instead of routing a retry.
    fn recover(current: NodeName, state: &WorkflowState, err: &NodeError) -> Option<StateUpdate> {
        match err {
            NodeError::Scope(_) => None,
            NodeError::Planner(_) => Some(StateUpdate {
                task_planner_action: Some(crate::state::TaskPlannerAction::Abort {
                    escalation_context: format!("planner error: {err}"),
                }),
                escalation_context: Some(format!("planner error: {err}")),
                ..Default::default()
            }),
            NodeError::Tool(_) | NodeError::Normaliser(_) | NodeError::Budget(_) => {
                let mut update = StateUpdate {
                    error: Some(err.to_string()),
                    ..Default::default()
                };
                match current {
                    NodeName::Qa => {
                        update.current_qa_result = Some(crate::state::QaResult {
                            passed: false,
                            feedback: format!("qa invocation failed: {err}"),
                            issues: vec![err.to_string()],
                        });
                        update.urgency_delta = crate::retry::UrgencyWeights::QA_FAIL;
                    }
                    NodeName::Assessor => {
                        let divergence_analysis = format!("assessor invocation failed: {err}");
                        update.last_assessor_verdict = Some(crate::state::AssessorVerdict::MajorDivergence {
                            divergence_analysis: divergence_analysis.clone(),
                        });
                        update.divergence_analysis = Some(divergence_analysis);
                        update.prior_work = Some(crate::nodes::assessor::rollup_done_list(state));
                    }
                    _ => {}
                }
                Some(update)
            }
        }
    }

    fn terminal(state: &WorkflowState, err: NodeError) -> EngineError {
        error!(error = %err, "terminal node error");
        let _ = state;
        match err {
            NodeError::Scope(scope_err) => EngineError::Scope(scope_err),
            other => EngineError::Other(anyhow::anyhow!(other.to_string())),
        }
    }

    fn emit_task_event(
        streams: &crate::stream::StreamDispatcher,
        current: NodeName,
        state: &WorkflowState,
        update: &StateUpdate,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) {
        match current {
            NodeName::MarkComplete => {
                if let Some(entry) = &update.push_done_entry {
                    streams.emit_task(
                        TaskLifecycle::Completed {
                            description: entry.task_description.clone(),
                            summary: entry.result_summary.clone(),
                        },
                        timestamp,
                    );
                }
            }
            NodeName::MarkFailed => {
                if let Some(entry) = &update.push_done_entry {
                    streams.emit_task(
                        TaskLifecycle::Failed {
                            description: entry.task_description.clone(),
                            escalation_context: entry.escalation_context.clone().unwrap_or_default(),
                        },
                        timestamp,
                    );
                }
            }
            NodeName::TaskPlanner => {
                if let Some(crate::state::TaskPlannerAction::Implement { plan, .. }) = &update.task_planner_action {
                    streams.emit_task(TaskLifecycle::Started { description: plan.clone() }, timestamp);
                }
            }
            _ => {}
        }
        if update.advance_milestone {
            streams.emit_task(
                TaskLifecycle::MilestoneAdvanced {
                    from_index: state.active_milestone_index,
                    to_index: state.active_milestone_index + 1,
                },
                timestamp,
            );
        }
    }
}
