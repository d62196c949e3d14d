//! Final narrative reporting: a plain-text summary built from
//! `done_list` once the engine reaches a terminal state, plus a console
//! subscriber that prints task/node events as they stream in.

use crate::state::WorkflowState;
use crate::stream::{NodeLifecycle, StreamDispatcher, TaskLifecycle};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Builds the work report handed back to the caller (and stashed on
/// `WorkflowState.work_report`) once the run reaches a terminal status.
pub struct Reporter;

impl Reporter {
    pub fn summarize(state: &WorkflowState) -> String {
        let mut out = String::new();
        out.push_str(&format!("Run: {}\n", state.run_id));
        out.push_str(&format!("Request: {}\n", state.user_request));
        out.push_str(&format!("Remit: {}\n\n", state.remit));

        let completed = state.done_list.iter().filter(|e| !e.failed).count();
        let failed = state.done_list.iter().filter(|e| e.failed).count();
        out.push_str(&format!(
            "{completed} task(s) completed, {failed} failed, across {} milestone(s).\n\n",
            state.milestones.len()
        ));

        for entry in &state.done_list {
            if entry.failed {
                out.push_str(&format!(
                    "- [FAILED] {}: {}\n",
                    entry.task_description,
                    entry.escalation_context.clone().unwrap_or_default()
                ));
            } else {
                out.push_str(&format!("- [done] {}: {}\n", entry.task_description, entry.result_summary));
            }
        }

        if let Some(error) = &state.error {
            out.push_str(&format!("\nTerminated with error: {error}\n"));
        }

        out
    }
}

/// Subscribes to the task and node streams and prints human-readable
/// lines as the run progresses. Purely cosmetic — never reads state back.
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Subscribes to the task (and, if `verbose`, node) streams. Must be
    /// called on a `StreamDispatcher` still owned uniquely — before it is
    /// wrapped in the `Arc` handed to the engine and its nodes.
    pub fn attach(streams: &mut StreamDispatcher, verbose: bool) {
        streams.task.subscribe(move |event| {
            Self::print_task(&event.lifecycle);
        });
        if verbose {
            streams.node.subscribe(move |event| {
                println!("{} {:?}", style("node").dim(), event);
            });
        } else {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}").unwrap());
            spinner.enable_steady_tick(Duration::from_millis(120));
            streams.node.subscribe(move |event| match &event.lifecycle {
                NodeLifecycle::Start => spinner.set_message(event.node_name.clone()),
                NodeLifecycle::End => spinner.tick(),
                NodeLifecycle::Error { message } => spinner.set_message(format!("{} failed: {message}", event.node_name)),
            });
        }
    }

    fn print_task(lifecycle: &TaskLifecycle) {
        match lifecycle {
            TaskLifecycle::Started { description } => println!("{} {description}", style("▶").blue()),
            TaskLifecycle::Completed { description, summary } => {
                println!("{} {description} — {summary}", style("✓").green())
            }
            TaskLifecycle::Failed {
                description,
                escalation_context,
            } => println!("{} {description} — {escalation_context}", style("✗").red()),
            TaskLifecycle::MilestoneAdvanced { from_index, to_index } => {
                println!("{} milestone {from_index} → {to_index}", style("»").yellow())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DoneEntry, WorkflowState};
    use std::path::PathBuf;

    #[test]
    fn summary_counts_completed_and_failed() {
        let mut state = WorkflowState::new("add a widget", PathBuf::from("."), 5, 3);
        state.remit = "add the widget module".into();
        state.milestones = vec![crate::state::Milestone::new("m0", "sketch")];
        state.done_list.push(DoneEntry::completed("task a", "did it", None, 0));
        state.done_list.push(DoneEntry::failed("task b", "infeasible", 0));

        let summary = Reporter::summarize(&state);
        assert!(summary.contains("1 task(s) completed, 1 failed"));
        assert!(summary.contains("[done] task a"));
        assert!(summary.contains("[FAILED] task b"));
    }
}
