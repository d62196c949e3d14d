//! Subagent tools: opaque capabilities with declared input/output shapes.
//! The planner and implementor call into these through a `ToolRegistry`;
//! none of them are graph nodes.

pub mod fs_tools;
pub mod research_tools;

use crate::errors::ToolError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait SubagentTool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn call(&self, input: Value) -> Result<Value, ToolError>;
}

/// Binds tool name to implementation; a node's declared tool set is a
/// subset of this registry.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn SubagentTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn SubagentTool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub async fn call(&self, name: &str, input: Value) -> Result<Value, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::Unavailable {
            name: name.to_string(),
            reason: "not registered in this node's tool set".into(),
        })?;
        tool.call(input).await
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl SubagentTool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }
        async fn call(&self, input: Value) -> Result<Value, ToolError> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn registry_dispatches_to_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let result = registry.call("echo", serde_json::json!({"x": 1})).await.unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn registry_errors_on_unregistered_tool() {
        let registry = ToolRegistry::new();
        let result = registry.call("missing_tool", serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::Unavailable { .. })));
    }
}
