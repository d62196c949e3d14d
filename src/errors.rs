//! Typed error hierarchy for the scopeward engine.
//!
//! Each node/tier in the workflow graph raises its own error kind. Most
//! of these never propagate as Rust `Err`s out of the engine — the
//! router folds them into a `StateUpdate` instead. Only
//! `ScopeError` and `CancellationSignal` are terminal and surface through
//! `EngineError`.

use thiserror::Error;

/// Raised by a `SubagentTool` when invocation fails.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolError {
    #[error("tool '{name}' is unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("tool '{name}' failed: {message}")]
    Failed { name: String, message: String },

    #[error("tool '{name}' received invalid input: {message}")]
    InvalidInput { name: String, message: String },
}

/// Raised by the Normaliser after all repair strategies have been tried
/// and the output still cannot be coerced to the target schema.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("could not normalise output to schema '{schema}' after repairs {attempted:?}: {reason}")]
pub struct NormaliserError {
    pub schema: String,
    pub attempted: Vec<String>,
    pub reason: String,
}

/// Raised by the ScopeAgent node. Terminal — the engine ends with
/// `status = failed`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScopeError {
    #[error("scope agent produced zero milestones")]
    NoMilestones,

    #[error("milestone description exceeds 200 chars after normalisation: {len} chars")]
    MilestoneTooLong { len: usize },

    #[error("remit exceeds 1000 chars after normalisation: {len} chars")]
    RemitTooLong { len: usize },

    #[error(transparent)]
    Normaliser(#[from] NormaliserError),
}

/// Raised by the TaskPlanner node. Treated as an abort with synthetic
/// escalation context; routes to `mark_failed` then `assessor`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlannerError {
    #[error("planner output did not resolve to a valid action: {reason}")]
    UnresolvedAction { reason: String },

    #[error(transparent)]
    Normaliser(#[from] NormaliserError),
}

/// Not an exception — the QA node's result type. Routed through the
/// retry/urgency accounting, never raised as a Rust error.
#[derive(Debug, Clone, PartialEq)]
pub struct QaFailure {
    pub feedback: String,
    pub issues: Vec<String>,
}

/// Raised by the AgentInvoker when a token budget is exceeded and
/// summarisation still does not bring the input under budget.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("token budget exceeded for role '{role}': {used} > {limit} (after summarisation: {summarised})")]
pub struct BudgetError {
    pub role: String,
    pub used: usize,
    pub limit: usize,
    pub summarised: bool,
}

/// Raised by the engine when an external cancellation flag is observed at
/// a node boundary. Terminal — `status = failed` with this as the reason.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("cancelled: {reason}")]
pub struct CancellationSignal {
    pub reason: String,
}

/// Per-node failure, returned by a `NodeHandler` instead of a panic. Every
/// node returns either a success update or one of these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Normaliser(#[from] NormaliserError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error(transparent)]
    Budget(#[from] BudgetError),
}

/// Top-level error returned from `Engine::run`. Only the truly terminal
/// kinds reach here; everything else is absorbed into
/// `WorkflowState.status = failed` with `error` populated.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("scope error: {0}")]
    Scope(#[from] ScopeError),

    #[error("cancelled: {0}")]
    Cancelled(#[from] CancellationSignal),

    #[error("router produced an invalid transition: {0}")]
    Routing(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
