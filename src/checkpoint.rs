//! Checkpointing: a write-only hook the engine calls after every applied
//! `StateUpdate`, so a crash or kill mid-run leaves a replayable trail.

use crate::state::WorkflowState;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

pub trait CheckpointHook: Send + Sync {
    fn on_checkpoint(&self, state: &WorkflowState);
}

/// Default hook: does nothing. Used unless `--checkpoint-path` is passed.
pub struct NullCheckpointHook;

impl CheckpointHook for NullCheckpointHook {
    fn on_checkpoint(&self, _state: &WorkflowState) {}
}

/// Appends one newline-delimited JSON snapshot of `WorkflowState` per
/// checkpoint. Never reads the file back — replay is `replay.rs`'s job,
/// driven from the event log, not this snapshot trail.
pub struct FileCheckpointHook {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl FileCheckpointHook {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }
}

impl CheckpointHook for FileCheckpointHook {
    fn on_checkpoint(&self, state: &WorkflowState) {
        let line = match serde_json::to_string(state) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to serialise checkpoint, skipping");
                return;
            }
        };
        let mut file = self.file.lock().expect("checkpoint file lock poisoned");
        if let Err(e) = writeln!(file, "{line}") {
            warn!(error = %e, path = %self.path.display(), "failed to write checkpoint");
        }
    }
}
