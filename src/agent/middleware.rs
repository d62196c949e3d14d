//! `SummarizationMiddleware`: on threshold (~30k tokens of conversation),
//! replaces the older half of the conversation with a summariser-produced
//! digest, keeping the last 10 turns verbatim.
//!
//! Accumulates an estimated char count, compares it to a threshold,
//! applies compaction when crossed.

use crate::agent::backend::{AgentBackend, BackendError, Turn, TurnRole};
use std::sync::Arc;

/// Rough chars-per-token estimate.
const CHARS_PER_TOKEN_ESTIMATE: usize = 4;

pub const SUMMARIZATION_THRESHOLD_TOKENS: usize = 30_000;
const KEEP_RECENT_TURNS: usize = 10;

fn estimate_tokens(turns: &[Turn]) -> usize {
    let chars: usize = turns.iter().map(|t| t.content.chars().count()).sum();
    chars / CHARS_PER_TOKEN_ESTIMATE
}

pub struct SummarizationMiddleware {
    summariser: Arc<dyn AgentBackend>,
}

impl SummarizationMiddleware {
    pub fn new(summariser: Arc<dyn AgentBackend>) -> Self {
        Self { summariser }
    }

    pub fn should_compact(&self, turns: &[Turn]) -> bool {
        estimate_tokens(turns) >= SUMMARIZATION_THRESHOLD_TOKENS
    }

    /// Replaces the older half of `turns` with a single summariser-produced
    /// digest turn, keeping the last `KEEP_RECENT_TURNS` verbatim.
    pub async fn compact(&self, turns: Vec<Turn>) -> Result<Vec<Turn>, BackendError> {
        if turns.len() <= KEEP_RECENT_TURNS {
            return Ok(turns);
        }
        let split = turns.len() - KEEP_RECENT_TURNS;
        let (older, recent) = turns.split_at(split);

        let digest_prompt = vec![Turn {
            role: TurnRole::User,
            content: format!(
                "Summarize the following conversation history into a compact digest \
                 preserving goals, decisions, and unresolved issues:\n\n{}",
                older
                    .iter()
                    .map(|t| t.content.clone())
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
        }];
        let output = self.summariser.invoke(&digest_prompt).await?;

        let mut result = Vec::with_capacity(1 + recent.len());
        result.push(Turn {
            role: TurnRole::System,
            content: format!("[compacted history digest]\n{}", output.text),
        });
        result.extend(recent.iter().cloned());
        Ok(result)
    }
}
