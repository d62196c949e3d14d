//! Research-oriented subagent tools: `explain_code`, `ask`, `web_search`,
//! `rag_search`. `explain_code`/`ask` are self-contained LLM loops modeled
//! as synchronous call/return — they delegate back into the
//! `AgentInvoker` with the research role rather than being graph nodes
//! themselves.

use crate::agent::{AgentInvoker, Role};
use crate::errors::ToolError;
use crate::normaliser::TargetSchema;
use crate::retrieval::RetrievalIndex;
use crate::tools::SubagentTool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

fn free_text_schema(name: &'static str) -> TargetSchema {
    TargetSchema {
        name,
        required_fields: vec!["answer"],
        optional_field_defaults: vec![],
        max_field_chars: vec![],
    }
}

#[derive(Deserialize)]
struct QueryInput {
    query: String,
}

/// Answers a question about the codebase by delegating to the research
/// role.
pub struct ExplainCodeTool {
    pub invoker: Arc<AgentInvoker>,
}

#[async_trait]
impl SubagentTool for ExplainCodeTool {
    fn name(&self) -> &'static str {
        "explain_code"
    }

    async fn call(&self, input: Value) -> Result<Value, ToolError> {
        let input: QueryInput = serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
            name: self.name().into(),
            message: e.to_string(),
        })?;
        let turns = vec![crate::agent::user_turn(format!(
            "Explain the following codebase question as a JSON object {{\"answer\": \"...\"}}: {}",
            input.query
        ))];
        let result = self
            .invoker
            .invoke(Role::Research, turns, &free_text_schema("ExplainCode"), Role::Research.token_budget())
            .await
            .map_err(|e| ToolError::Failed {
                name: self.name().into(),
                message: e.to_string(),
            })?;
        Ok(result.value)
    }
}

/// General open-ended question, same shape as `explain_code` but without
/// a codebase-specific framing.
pub struct AskTool {
    pub invoker: Arc<AgentInvoker>,
}

#[async_trait]
impl SubagentTool for AskTool {
    fn name(&self) -> &'static str {
        "ask"
    }

    async fn call(&self, input: Value) -> Result<Value, ToolError> {
        let input: QueryInput = serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
            name: self.name().into(),
            message: e.to_string(),
        })?;
        let turns = vec![crate::agent::user_turn(format!(
            "Answer as a JSON object {{\"answer\": \"...\"}}: {}",
            input.query
        ))];
        let result = self
            .invoker
            .invoke(Role::Research, turns, &free_text_schema("Ask"), Role::Research.token_budget())
            .await
            .map_err(|e| ToolError::Failed {
                name: self.name().into(),
                message: e.to_string(),
            })?;
        Ok(result.value)
    }
}

/// Reference implementation returns `ToolError::Unavailable` — no search
/// backend is fabricated. Wiring a real provider is a configuration
/// concern, not a hardcoded network call.
pub struct WebSearchTool;

#[async_trait]
impl SubagentTool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    async fn call(&self, _input: Value) -> Result<Value, ToolError> {
        Err(ToolError::Unavailable {
            name: self.name().into(),
            reason: "no web search backend configured".into(),
        })
    }
}

/// Direct retrieval over the knowledge store / repo tree.
pub struct RagSearchTool {
    pub index: Arc<dyn RetrievalIndex>,
}

#[async_trait]
impl SubagentTool for RagSearchTool {
    fn name(&self) -> &'static str {
        "rag_search"
    }

    async fn call(&self, input: Value) -> Result<Value, ToolError> {
        let input: QueryInput = serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
            name: self.name().into(),
            message: e.to_string(),
        })?;
        let snippets = self.index.search(&input.query, 10).await;
        let payload: Vec<Value> = snippets
            .into_iter()
            .map(|s| serde_json::json!({"path": s.path, "text": s.text, "score": s.score}))
            .collect();
        Ok(serde_json::json!({ "snippets": payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::backend::{AgentBackend, MockBackend};
    use crate::retrieval::LexicalIndex;
    use std::collections::HashMap;

    fn invoker(response: &str) -> Arc<AgentInvoker> {
        let mut backends: HashMap<Role, Arc<dyn AgentBackend>> = HashMap::new();
        backends.insert(Role::Primary, Arc::new(MockBackend::new(vec![response.to_string()])));
        Arc::new(AgentInvoker::new(backends))
    }

    #[tokio::test]
    async fn explain_code_delegates_to_research_role() {
        let tool = ExplainCodeTool {
            invoker: invoker("{\"answer\": \"it's a router\"}"),
        };
        let result = tool.call(serde_json::json!({"query": "what is router.rs?"})).await.unwrap();
        assert_eq!(result["answer"], "it's a router");
    }

    #[tokio::test]
    async fn web_search_is_unavailable_by_default() {
        let tool = WebSearchTool;
        let result = tool.call(serde_json::json!({"query": "anything"})).await;
        assert!(matches!(result, Err(ToolError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn rag_search_returns_snippets_from_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("design.md"), "The engine is single-threaded.").unwrap();
        let tool = RagSearchTool {
            index: Arc::new(LexicalIndex::new(dir.path())),
        };
        let result = tool.call(serde_json::json!({"query": "single-threaded engine"})).await.unwrap();
        let snippets = result["snippets"].as_array().unwrap();
        assert!(!snippets.is_empty());
    }
}
