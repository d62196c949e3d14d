//! File-system-bound subagent tools: `read_file_lines`, `find_files_by_name`,
//! `edit_file`.

use crate::errors::ToolError;
use crate::retrieval::is_within_root;
use crate::tools::SubagentTool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use walkdir::WalkDir;

fn resolve(root: &std::path::Path, relative: &str) -> Result<PathBuf, ToolError> {
    let candidate = root.join(relative);
    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let canonical_candidate = candidate.canonicalize().unwrap_or_else(|_| candidate.clone());
    if !is_within_root(&canonical_root, &canonical_candidate) {
        return Err(ToolError::InvalidInput {
            name: "fs_tool".into(),
            message: format!("path '{relative}' escapes repo_root"),
        });
    }
    Ok(candidate)
}

#[derive(Deserialize)]
struct ReadFileLinesInput {
    path: String,
    #[serde(default)]
    start_line: usize,
    #[serde(default = "default_max_lines")]
    max_lines: usize,
}

fn default_max_lines() -> usize {
    50
}

pub struct ReadFileLinesTool {
    pub repo_root: PathBuf,
}

#[async_trait]
impl SubagentTool for ReadFileLinesTool {
    fn name(&self) -> &'static str {
        "read_file_lines"
    }

    async fn call(&self, input: Value) -> Result<Value, ToolError> {
        let input: ReadFileLinesInput = serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
            name: self.name().into(),
            message: e.to_string(),
        })?;
        let path = resolve(&self.repo_root, &input.path)?;
        let content = std::fs::read_to_string(&path).map_err(|e| ToolError::Failed {
            name: self.name().into(),
            message: format!("could not read {}: {e}", path.display()),
        })?;
        let lines: Vec<&str> = content
            .lines()
            .skip(input.start_line)
            .take(input.max_lines)
            .collect();
        Ok(serde_json::json!({ "lines": lines }))
    }
}

#[derive(Deserialize)]
struct FindFilesByNameInput {
    pattern: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

pub struct FindFilesByNameTool {
    pub repo_root: PathBuf,
}

#[async_trait]
impl SubagentTool for FindFilesByNameTool {
    fn name(&self) -> &'static str {
        "find_files_by_name"
    }

    async fn call(&self, input: Value) -> Result<Value, ToolError> {
        let input: FindFilesByNameInput = serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
            name: self.name().into(),
            message: e.to_string(),
        })?;
        let matcher = glob::Pattern::new(&input.pattern).map_err(|e| ToolError::InvalidInput {
            name: self.name().into(),
            message: e.to_string(),
        })?;

        let matches: Vec<String> = WalkDir::new(&self.repo_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .is_some_and(|name| matcher.matches(name))
            })
            .take(input.limit)
            .map(|e| e.path().display().to_string())
            .collect();

        Ok(serde_json::json!({ "paths": matches }))
    }
}

#[derive(Deserialize)]
struct EditFileInput {
    path: String,
    content: String,
}

/// The implementor node's sole write path. File edits serialise through
/// this one tool.
pub struct EditFileTool {
    pub repo_root: PathBuf,
}

#[async_trait]
impl SubagentTool for EditFileTool {
    fn name(&self) -> &'static str {
        "edit_file"
    }

    async fn call(&self, input: Value) -> Result<Value, ToolError> {
        let input: EditFileInput = serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
            name: self.name().into(),
            message: e.to_string(),
        })?;
        let path = resolve(&self.repo_root, &input.path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ToolError::Failed {
                name: self.name().into(),
                message: e.to_string(),
            })?;
        }
        std::fs::write(&path, &input.content).map_err(|e| ToolError::Failed {
            name: self.name().into(),
            message: format!("could not write {}: {e}", path.display()),
        })?;
        Ok(serde_json::json!({ "path": input.path, "bytes_written": input.content.len() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn read_file_lines_returns_requested_window() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "one\ntwo\nthree\nfour\n").unwrap();
        let tool = ReadFileLinesTool {
            repo_root: dir.path().to_path_buf(),
        };
        let result = tool
            .call(serde_json::json!({"path": "a.rs", "start_line": 1, "max_lines": 2}))
            .await
            .unwrap();
        assert_eq!(result["lines"], serde_json::json!(["two", "three"]));
    }

    #[tokio::test]
    async fn read_file_lines_rejects_path_escape() {
        let dir = tempdir().unwrap();
        let tool = ReadFileLinesTool {
            repo_root: dir.path().to_path_buf(),
        };
        let result = tool.call(serde_json::json!({"path": "../../etc/passwd"})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn find_files_by_name_matches_glob_pattern() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();

        let tool = FindFilesByNameTool {
            repo_root: dir.path().to_path_buf(),
        };
        let result = tool.call(serde_json::json!({"pattern": "*.rs"})).await.unwrap();
        let paths = result["paths"].as_array().unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[tokio::test]
    async fn edit_file_writes_content_and_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let tool = EditFileTool {
            repo_root: dir.path().to_path_buf(),
        };
        tool.call(serde_json::json!({"path": "nested/new.rs", "content": "fn main() {}"}))
            .await
            .unwrap();
        let written = std::fs::read_to_string(dir.path().join("nested/new.rs")).unwrap();
        assert_eq!(written, "fn main() {}");
    }
}
