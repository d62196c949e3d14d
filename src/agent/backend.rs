//! `AgentBackend` — the capability-tagged invocation interface the engine
//! uses to reach LLM backends. The engine never talks to a model
//! provider directly; it calls this trait.
//!
//! [`ProcessBackend`] spawns a configured command template and parses a
//! line-delimited JSON event stream from its stdout, rather than
//! hardcoding a single binary.

use crate::errors::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// A single turn in a conversation sent to an `AgentBackend`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// Raw output from a backend invocation, before normalisation.
#[derive(Debug, Clone)]
pub struct BackendOutput {
    pub text: String,
    pub prompt_chars: usize,
    pub output_chars: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend process failed to start: {0}")]
    SpawnFailed(String),
    #[error("backend process exited with status {0}")]
    NonZeroExit(i32),
    #[error("backend produced no output")]
    EmptyOutput,
}

/// The capability-tagged invocation interface. One implementation per
/// transport; the engine is generic over this trait.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn invoke(&self, turns: &[Turn]) -> Result<BackendOutput, BackendError>;
}

/// Spawns a configured shell command, feeds it the conversation as a
/// single prompt on stdin, and reads line-delimited JSON assistant-text
/// events from stdout.
pub struct ProcessBackend {
    command: String,
    args: Vec<String>,
}

impl ProcessBackend {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    fn render_prompt(turns: &[Turn]) -> String {
        turns
            .iter()
            .map(|t| format!("[{:?}] {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, Deserialize)]
struct ProcessEvent {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl AgentBackend for ProcessBackend {
    async fn invoke(&self, turns: &[Turn]) -> Result<BackendOutput, BackendError> {
        let prompt = Self::render_prompt(turns);
        let prompt_chars = prompt.chars().count();

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BackendError::SpawnFailed(e.to_string()))?;

        {
            use tokio::io::AsyncWriteExt;
            let mut stdin = child.stdin.take().expect("stdin was piped");
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| BackendError::SpawnFailed(e.to_string()))?;
        }

        let stdout = child.stdout.take().expect("stdout was piped");
        let mut lines = BufReader::new(stdout).lines();
        let mut collected = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Ok(event) = serde_json::from_str::<ProcessEvent>(&line) {
                if let Some(text) = event.text {
                    collected.push_str(&text);
                }
            } else {
                collected.push_str(&line);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| BackendError::SpawnFailed(e.to_string()))?;
        if !status.success() {
            return Err(BackendError::NonZeroExit(status.code().unwrap_or(-1)));
        }
        if collected.trim().is_empty() {
            return Err(BackendError::EmptyOutput);
        }

        let output_chars = collected.chars().count();
        Ok(BackendOutput {
            text: collected,
            prompt_chars,
            output_chars,
        })
    }
}

/// In-memory backend used by tests and `scopeward run --dry-run`. Returns
/// canned responses from a queue, popping one per invocation.
pub struct MockBackend {
    responses: std::sync::Mutex<std::collections::VecDeque<String>>,
}

impl MockBackend {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl AgentBackend for MockBackend {
    async fn invoke(&self, turns: &[Turn]) -> Result<BackendOutput, BackendError> {
        let prompt_chars = turns.iter().map(|t| t.content.chars().count()).sum();
        let mut queue = self.responses.lock().expect("mock backend lock poisoned");
        let text = queue.pop_front().ok_or(BackendError::EmptyOutput)?;
        let output_chars = text.chars().count();
        Ok(BackendOutput {
            text,
            prompt_chars,
            output_chars,
        })
    }
}

/// Converts a backend error to a structured `ToolError`, so it surfaces
/// rather than being swallowed.
pub fn backend_error_to_tool_error(name: &str, err: &BackendError) -> ToolError {
    ToolError::Failed {
        name: name.to_string(),
        message: err.to_string(),
    }
}
