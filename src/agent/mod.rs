//! AgentInvoker: invokes an agent by role, binds its tool set, enforces
//! token budget, returns structured output, repairing malformed output
//! via the Normaliser.

pub mod backend;
pub mod middleware;

use crate::errors::{BudgetError, NormaliserError, ToolError};
use crate::normaliser::{NormalisedOutput, Normaliser, TargetSchema};
use backend::{AgentBackend, BackendError, Turn, TurnRole};
use middleware::SummarizationMiddleware;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Model roles, each with its own per-invocation token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Primary,
    Summarizer,
    Research,
    Supervisor,
}

impl Role {
    /// Default input token ceiling when a caller has no node-specific
    /// budget of its own (used by tool-delegated research/ask calls).
    pub fn token_budget(self) -> usize {
        match self {
            Role::Primary => 15_000,
            Role::Summarizer => 15_000,
            Role::Research => 15_000,
            Role::Supervisor => 5_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvokerError {
    #[error(transparent)]
    Budget(#[from] BudgetError),
    #[error(transparent)]
    Normaliser(#[from] NormaliserError),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Binds role-tagged backends plus the summarization middleware, and
/// enforces graceful degradation: on role-model unavailability, fall
/// back to primary; on repeated tool error, surface as a structured
/// `ToolError`, never swallowed.
pub struct AgentInvoker {
    backends: HashMap<Role, Arc<dyn AgentBackend>>,
    middleware: SummarizationMiddleware,
    normaliser: Normaliser,
}

impl AgentInvoker {
    pub fn new(backends: HashMap<Role, Arc<dyn AgentBackend>>) -> Self {
        let summariser = backends
            .get(&Role::Summarizer)
            .or_else(|| backends.get(&Role::Primary))
            .expect("a primary backend must always be configured")
            .clone();
        Self {
            backends,
            middleware: SummarizationMiddleware::new(summariser.clone()),
            normaliser: Normaliser::new(summariser),
        }
    }

    fn backend_for(&self, role: Role) -> Arc<dyn AgentBackend> {
        self.backends
            .get(&role)
            .or_else(|| self.backends.get(&Role::Primary))
            .expect("a primary backend must always be configured")
            .clone()
    }

    /// Invokes `role` with `turns` against `max_tokens` (the caller's
    /// own budget ceiling — each node carries a different one, see
    /// `nodes::budgets`), applying summarisation once if exceeded and
    /// raising `BudgetError` if a hard exceed remains, then normalises
    /// the result against `schema`.
    pub async fn invoke(
        &self,
        role: Role,
        mut turns: Vec<Turn>,
        schema: &TargetSchema,
        max_tokens: usize,
    ) -> Result<NormalisedOutput, InvokerError> {
        if self.middleware.should_compact(&turns) {
            let before = turns.clone();
            match self.middleware.compact(turns).await {
                Ok(compacted) => turns = compacted,
                Err(_) => {
                    warn!(?role, "summarisation attempt failed, proceeding with uncompacted turns");
                    turns = before;
                }
            }
        }

        let estimated = estimate_tokens(&turns);
        let limit = max_tokens;
        if estimated > limit {
            return Err(BudgetError {
                role: format!("{role:?}"),
                used: estimated,
                limit,
                summarised: true,
            }
            .into());
        }

        let backend = self.backend_for(role);
        let output = match backend.invoke(&turns).await {
            Ok(output) => output,
            Err(BackendError::SpawnFailed(_)) | Err(BackendError::NonZeroExit(_)) if role != Role::Primary => {
                warn!(?role, "role backend unavailable, falling back to primary");
                self.backend_for(Role::Primary).invoke(&turns).await.map_err(|e| ToolError::Failed {
                    name: format!("{role:?}"),
                    message: e.to_string(),
                })?
            }
            Err(e) => {
                return Err(ToolError::Failed {
                    name: format!("{role:?}"),
                    message: e.to_string(),
                }
                .into());
            }
        };

        Ok(self.normaliser.normalise(&output.text, schema).await?)
    }
}

fn estimate_tokens(turns: &[Turn]) -> usize {
    turns.iter().map(|t| t.content.chars().count()).sum::<usize>() / 4
}

pub fn user_turn(content: impl Into<String>) -> Turn {
    Turn {
        role: TurnRole::User,
        content: content.into(),
    }
}

pub fn system_turn(content: impl Into<String>) -> Turn {
    Turn {
        role: TurnRole::System,
        content: content.into(),
    }
}
