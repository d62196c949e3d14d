//! `scopeward run <request>` — builds the engine's collaborators and
//! drives one workflow to completion.

use crate::agent::backend::{AgentBackend, MockBackend, ProcessBackend};
use crate::agent::{AgentInvoker, Role};
use crate::checkpoint::{CheckpointHook, FileCheckpointHook, NullCheckpointHook};
use crate::config::Config;
use crate::engine::{CancellationToken, Engine};
use crate::nodes::NodeContext;
use crate::reporter::{ConsoleReporter, Reporter};
use crate::retrieval::LexicalIndex;
use crate::state::WorkflowState;
use crate::stream::StreamDispatcher;
use crate::tools::fs_tools::{EditFileTool, FindFilesByNameTool, ReadFileLinesTool};
use crate::tools::research_tools::{AskTool, ExplainCodeTool, RagSearchTool, WebSearchTool};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Process exit codes, exactly as specified: 0 complete, 1 failed
/// (scope unsatisfied after abort cascade), 2 scope/engine error, 130
/// external cancellation.
pub const EXIT_COMPLETE: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ENGINE_ERROR: i32 = 2;
pub const EXIT_CANCELLED: i32 = 130;

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    request: String,
    repo_root: Option<PathBuf>,
    max_iterations: Option<u32>,
    review_interval: Option<u32>,
    max_attempts: Option<u32>,
    checkpoint_path: Option<PathBuf>,
    dry_run: bool,
    verbose: bool,
) -> Result<i32> {
    let repo_root = match repo_root {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };

    let mut config = Config::load_or_default(&repo_root.join("scopeward.toml"))?.apply_env();
    if let Some(n) = max_iterations {
        config.budgets.max_iterations = n;
    }
    if let Some(n) = review_interval {
        config.budgets.review_interval = n;
    }
    if let Some(n) = max_attempts {
        config.budgets.max_attempts = n;
    }
    config.validate()?;

    let mut streams = StreamDispatcher::new();
    ConsoleReporter::attach(&mut streams, verbose);
    let streams = Arc::new(streams);

    let invoker = Arc::new(AgentInvoker::new(build_backends(&config, dry_run)));
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(ReadFileLinesTool { repo_root: repo_root.clone() }));
    tools.register(Arc::new(FindFilesByNameTool { repo_root: repo_root.clone() }));
    tools.register(Arc::new(EditFileTool { repo_root: repo_root.clone() }));
    tools.register(Arc::new(ExplainCodeTool { invoker: invoker.clone() }));
    tools.register(Arc::new(AskTool { invoker: invoker.clone() }));
    tools.register(Arc::new(WebSearchTool));

    let retrieval: Arc<dyn crate::retrieval::RetrievalIndex> = Arc::new(LexicalIndex::new(config.paths.rag_root.clone()));
    tools.register(Arc::new(RagSearchTool { index: retrieval.clone() }));

    let ctx = NodeContext {
        invoker,
        tools: Arc::new(tools),
        retrieval,
        repo_root: repo_root.clone(),
        streams,
    };

    let checkpoint: Arc<dyn CheckpointHook> = match checkpoint_path.or(config.paths.checkpoint_path.clone()) {
        Some(path) => Arc::new(FileCheckpointHook::open(&path).with_context(|| format!("failed to open checkpoint file: {}", path.display()))?),
        None => Arc::new(NullCheckpointHook),
    };

    let cancellation = CancellationToken::new();
    let cancel_for_signal = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_for_signal.cancel();
        }
    });

    let engine = Engine::new(ctx, checkpoint, cancellation, config.budgets.max_iterations);
    let state = WorkflowState::new(request, repo_root, config.budgets.review_interval, config.budgets.max_attempts);

    match engine.run(state).await {
        Ok(final_state) => {
            println!("{}", Reporter::summarize(&final_state));
            match final_state.status {
                crate::state::WorkflowStatus::Complete => Ok(EXIT_COMPLETE),
                crate::state::WorkflowStatus::Failed => Ok(EXIT_FAILED),
                crate::state::WorkflowStatus::Running => Ok(EXIT_ENGINE_ERROR),
            }
        }
        Err(crate::errors::EngineError::Cancelled(_)) => {
            info!("run cancelled");
            Ok(EXIT_CANCELLED)
        }
        Err(e) => {
            eprintln!("engine error: {e}");
            Ok(EXIT_ENGINE_ERROR)
        }
    }
}

fn build_backends(config: &Config, dry_run: bool) -> HashMap<Role, Arc<dyn AgentBackend>> {
    let mut backends: HashMap<Role, Arc<dyn AgentBackend>> = HashMap::new();
    if dry_run {
        backends.insert(Role::Primary, Arc::new(MockBackend::new(vec![])));
        return backends;
    }
    backends.insert(Role::Primary, Arc::new(ProcessBackend::new(config.models.primary_cmd.clone(), vec![])));
    if let Some(cmd) = &config.models.summarizer_cmd {
        backends.insert(Role::Summarizer, Arc::new(ProcessBackend::new(cmd.clone(), vec![])));
    }
    if let Some(cmd) = &config.models.research_cmd {
        backends.insert(Role::Research, Arc::new(ProcessBackend::new(cmd.clone(), vec![])));
    }
    if let Some(cmd) = &config.models.supervisor_cmd {
        backends.insert(Role::Supervisor, Arc::new(ProcessBackend::new(cmd.clone(), vec![])));
    }
    backends
}
