//! The eight node handlers: five agent-backed nodes plus three pure
//! bookkeeping nodes. Each implements [`NodeHandler`]; the engine drives
//! them uniformly, dispatching on [`crate::router::NodeName`].

pub mod assessor;
pub mod bookkeeping;
pub mod implementor;
pub mod planner;
pub mod qa;
pub mod scope;

use crate::agent::AgentInvoker;
use crate::errors::NodeError;
use crate::retrieval::RetrievalIndex;
use crate::state::{StateUpdate, WorkflowState};
use crate::stream::StreamDispatcher;
use crate::tools::ToolRegistry;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Per-node input token ceilings, advisory (the summarisation middleware
/// absorbs most overages before a `BudgetError` is ever raised).
pub mod budgets {
    pub const SCOPE_AGENT: usize = 15_000;
    pub const TASK_PLANNER: usize = 12_000;
    pub const IMPLEMENTOR: usize = 15_000;
    pub const QA: usize = 10_000;
    pub const ASSESSOR: usize = 5_000;
}

/// Shared, read-only collaborators every agent-backed node needs. Handed
/// to nodes by reference; resolved once at engine construction and never
/// mutated after start.
pub struct NodeContext {
    pub invoker: Arc<AgentInvoker>,
    pub tools: Arc<ToolRegistry>,
    pub retrieval: Arc<dyn RetrievalIndex>,
    pub repo_root: PathBuf,
    pub streams: Arc<StreamDispatcher>,
}

/// Common shape for all eight nodes. Bookkeeping nodes ignore `ctx`
/// entirely (no agent call, no tool use) but still implement this trait
/// so the engine can dispatch on one type.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StateUpdate, NodeError>;
}
