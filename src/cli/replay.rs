//! `scopeward replay <checkpoint-path>` — re-renders a previously
//! recorded checkpoint trail without invoking any agent backend.

use crate::reporter::Reporter;
use crate::state::WorkflowState;
use anyhow::{Context, Result};
use console::style;
use std::path::Path;

pub fn execute(checkpoint_path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(checkpoint_path)
        .with_context(|| format!("failed to read checkpoint file: {}", checkpoint_path.display()))?;

    let mut previous_done = 0usize;
    let mut last_state: Option<WorkflowState> = None;

    for (line_number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let state: WorkflowState = serde_json::from_str(line)
            .with_context(|| format!("malformed checkpoint at line {}", line_number + 1))?;

        for entry in state.done_list.iter().skip(previous_done) {
            if entry.failed {
                println!("{} {} — {}", style("✗").red(), entry.task_description, entry.escalation_context.clone().unwrap_or_default());
            } else {
                println!("{} {} — {}", style("✓").green(), entry.task_description, entry.result_summary);
            }
        }
        previous_done = state.done_list.len();
        last_state = Some(state);
    }

    if let Some(state) = last_state {
        println!("\n{}", Reporter::summarize(&state));
    } else {
        println!("checkpoint file contained no snapshots.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointHook, FileCheckpointHook};
    use crate::state::{DoneEntry, WorkflowState};
    use std::path::PathBuf;

    #[test]
    fn replay_reads_every_snapshot_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.jsonl");
        let hook = FileCheckpointHook::open(&path).unwrap();

        let mut state = WorkflowState::new("add a widget", PathBuf::from("."), 5, 3);
        hook.on_checkpoint(&state);
        state.done_list.push(DoneEntry::completed("task a", "did it", None, 0));
        hook.on_checkpoint(&state);

        assert!(execute(&path).is_ok());
    }

    #[test]
    fn replay_errors_on_missing_file() {
        assert!(execute(Path::new("/nonexistent/checkpoints.jsonl")).is_err());
    }
}
