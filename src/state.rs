//! `WorkflowState` — the single record owned exclusively by the engine.
//!
//! Nodes never mutate this struct directly; they return a [`StateUpdate`]
//! patch, and [`StateStore::apply`] is the one place invariants are
//! enforced.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// A user-observable interim outcome, not an implementation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub description: String,
    pub sketch: String,
}

impl Milestone {
    pub const MAX_DESCRIPTION_CHARS: usize = 200;

    pub fn new(description: impl Into<String>, sketch: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            sketch: sketch.into(),
        }
    }

    pub fn is_within_limit(&self) -> bool {
        self.description.chars().count() <= Self::MAX_DESCRIPTION_CHARS
    }
}

/// An entry in the monotonic done-list. Appended exactly once per task
/// completion; never removed, never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoneEntry {
    pub task_description: String,
    pub result_summary: String,
    pub qa_feedback: Option<String>,
    pub milestone_index: usize,
    pub failed: bool,
    pub escalation_context: Option<String>,
}

impl DoneEntry {
    pub const MAX_RESULT_SUMMARY_CHARS: usize = 300;
    pub const MAX_QA_FEEDBACK_CHARS: usize = 500;

    pub fn completed(
        task_description: impl Into<String>,
        result_summary: impl Into<String>,
        qa_feedback: Option<String>,
        milestone_index: usize,
    ) -> Self {
        Self {
            task_description: task_description.into(),
            result_summary: result_summary.into(),
            qa_feedback,
            milestone_index,
            failed: false,
            escalation_context: None,
        }
    }

    pub fn failed(
        task_description: impl Into<String>,
        escalation_context: impl Into<String>,
        milestone_index: usize,
    ) -> Self {
        Self {
            task_description: task_description.into(),
            result_summary: String::new(),
            qa_feedback: None,
            milestone_index,
            failed: true,
            escalation_context: Some(escalation_context.into()),
        }
    }
}

/// The result the Implementor node emits for the current task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ImplementationResult {
    pub files_modified: Vec<PathBuf>,
    pub result_summary: String,
    pub issues_noticed: Vec<String>,
    pub success: bool,
}

/// The result the QA node emits for the current task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaResult {
    pub passed: bool,
    pub feedback: String,
    pub issues: Vec<String>,
}

/// The four actions the TaskPlanner node can resolve to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TaskPlannerAction {
    Implement {
        plan: String,
        carry_forward: Vec<String>,
    },
    Skip,
    Abort {
        escalation_context: String,
    },
    MilestoneDone,
}

/// The four verdicts the Assessor node can resolve to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum AssessorVerdict {
    Aligned,
    MinorDrift { correction_hint: String },
    MajorDivergence { divergence_analysis: String },
    MilestoneComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Functional,
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub source: String,
    pub description: String,
    pub rationale: String,
    pub priority: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Running,
    Complete,
    Failed,
}

/// The single mutable record owned exclusively by the engine. All
/// fields are reachable only through accessor methods that keep
/// construction centralized; mutation only ever happens through
/// [`StateStore::apply`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    // Identity.
    pub run_id: Uuid,

    // Immutable inputs.
    pub user_request: String,
    pub repo_root: PathBuf,

    // Scope.
    pub remit: String,
    pub milestones: Vec<Milestone>,
    pub active_milestone_index: usize,

    // Sliding window.
    pub done_list: Vec<DoneEntry>,
    pub carry_forward: Vec<String>,

    // Current task (ephemeral; cleared on task boundary).
    pub current_task_description: Option<String>,
    pub current_implementation_plan: Option<String>,
    pub current_implementation_result: Option<ImplementationResult>,
    pub current_qa_result: Option<QaResult>,

    // Routing controls.
    pub task_planner_action: Option<TaskPlannerAction>,
    pub escalation_context: Option<String>,
    pub correction_hint: Option<String>,
    pub divergence_analysis: Option<String>,
    pub prior_work: Option<String>,
    /// The Assessor node's most recent verdict, consumed by
    /// `router::after_assessor` on the same tick it was produced and
    /// cleared by the bookkeeping the router's destination node performs.
    pub last_assessor_verdict: Option<AssessorVerdict>,

    // Counters.
    pub tasks_since_last_review: u32,
    pub review_interval: u32,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub urgency: f64,
    /// Aborts accumulated within the current milestone. Reset whenever the
    /// milestone advances or is re-planned from a divergence; consumed by
    /// the assessor to force a scope escalation at
    /// `retry::MAX_ABORTS_PER_MILESTONE`.
    pub aborts_in_milestone: u32,

    // Directives.
    pub pending_directives: Vec<Directive>,

    // Status.
    pub status: WorkflowStatus,
    pub error: Option<String>,
    pub work_report: Option<String>,
}

impl WorkflowState {
    pub fn new(user_request: impl Into<String>, repo_root: PathBuf, review_interval: u32, max_attempts: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            user_request: user_request.into(),
            repo_root,
            remit: String::new(),
            milestones: Vec::new(),
            active_milestone_index: 0,
            done_list: Vec::new(),
            carry_forward: Vec::new(),
            current_task_description: None,
            current_implementation_plan: None,
            current_implementation_result: None,
            current_qa_result: None,
            task_planner_action: None,
            escalation_context: None,
            correction_hint: None,
            divergence_analysis: None,
            prior_work: None,
            last_assessor_verdict: None,
            tasks_since_last_review: 0,
            review_interval,
            attempt_count: 0,
            max_attempts,
            urgency: 0.0,
            aborts_in_milestone: 0,
            pending_directives: Vec::new(),
            status: WorkflowStatus::Running,
            error: None,
            work_report: None,
        }
    }

    pub fn active_milestone(&self) -> Option<&Milestone> {
        self.milestones.get(self.active_milestone_index)
    }

    /// Clears the ephemeral fields that belong to exactly one task.
    fn clear_ephemeral(&mut self) {
        self.current_task_description = None;
        self.current_implementation_plan = None;
        self.current_implementation_result = None;
        self.current_qa_result = None;
        self.task_planner_action = None;
    }

    /// Checks the structural invariants. Used by `StateStore::apply`
    /// after every update and by the property tests in `router.rs`.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.status == WorkflowStatus::Running && self.active_milestone_index >= self.milestones.len() && !self.milestones.is_empty() {
            return Err(format!(
                "active_milestone_index {} out of range for {} milestones",
                self.active_milestone_index,
                self.milestones.len()
            ));
        }
        if self.attempt_count > self.max_attempts {
            return Err(format!(
                "attempt_count {} exceeds max_attempts {}",
                self.attempt_count, self.max_attempts
            ));
        }
        Ok(())
    }
}

/// A patch a node returns instead of mutating [`WorkflowState`] in place.
/// `StateStore::apply` is the only place a patch is folded into the
/// record.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub remit: Option<String>,
    pub milestones: Option<Vec<Milestone>>,
    pub advance_milestone: bool,
    pub reset_milestones_from_current: Option<Vec<Milestone>>,

    pub push_done_entry: Option<DoneEntry>,
    pub carry_forward: Option<Vec<String>>,
    pub clear_carry_forward: bool,

    pub current_task_description: Option<String>,
    pub current_implementation_plan: Option<String>,
    pub current_implementation_result: Option<ImplementationResult>,
    pub current_qa_result: Option<QaResult>,

    pub task_planner_action: Option<TaskPlannerAction>,
    pub escalation_context: Option<String>,
    pub clear_escalation_context: bool,
    pub correction_hint: Option<String>,
    pub clear_correction_hint: bool,
    pub divergence_analysis: Option<String>,
    pub prior_work: Option<String>,
    pub last_assessor_verdict: Option<AssessorVerdict>,
    pub clear_last_assessor_verdict: bool,

    pub increment_attempt: bool,
    pub reset_attempt_count: bool,
    pub increment_tasks_since_review: bool,
    pub reset_tasks_since_review: bool,
    pub urgency_delta: f64,
    pub reset_urgency: bool,
    pub increment_milestone_aborts: bool,

    pub consume_directives: Vec<usize>,
    pub prepend_directive: Option<Directive>,
    pub append_directive: Option<Directive>,

    pub status: Option<WorkflowStatus>,
    pub error: Option<String>,
    pub work_report: Option<String>,

    pub clear_ephemeral: bool,
}

/// Applies [`StateUpdate`] patches to a [`WorkflowState`], enforcing the
/// invariants centrally rather than scattering checks across every node.
pub struct StateStore;

impl StateStore {
    pub fn apply(state: &mut WorkflowState, update: StateUpdate) -> Result<(), String> {
        if let Some(remit) = update.remit {
            state.remit = remit;
        }
        if let Some(milestones) = update.milestones {
            state.milestones = milestones;
        }
        if let Some(from_current) = update.reset_milestones_from_current {
            state.milestones.truncate(state.active_milestone_index);
            state.milestones.extend(from_current);
            state.aborts_in_milestone = 0;
        }
        if update.advance_milestone {
            state.active_milestone_index += 1;
            state.aborts_in_milestone = 0;
        }
        if update.increment_milestone_aborts {
            state.aborts_in_milestone += 1;
        }

        if let Some(entry) = update.push_done_entry {
            state.done_list.push(entry);
        }
        if update.clear_carry_forward {
            state.carry_forward.clear();
        }
        if let Some(carry_forward) = update.carry_forward {
            state.carry_forward = carry_forward;
        }

        if let Some(v) = update.current_task_description {
            state.current_task_description = Some(v);
        }
        if let Some(v) = update.current_implementation_plan {
            state.current_implementation_plan = Some(v);
        }
        if let Some(v) = update.current_implementation_result {
            state.current_implementation_result = Some(v);
        }
        if let Some(v) = update.current_qa_result {
            state.current_qa_result = Some(v);
        }

        if let Some(action) = update.task_planner_action {
            state.task_planner_action = Some(action);
        }
        if update.clear_escalation_context {
            state.escalation_context = None;
        }
        if let Some(v) = update.escalation_context {
            state.escalation_context = Some(v);
        }
        if update.clear_correction_hint {
            state.correction_hint = None;
        }
        if let Some(v) = update.correction_hint {
            state.correction_hint = Some(v);
        }
        if let Some(v) = update.divergence_analysis {
            state.divergence_analysis = Some(v);
        }
        if let Some(v) = update.prior_work {
            state.prior_work = Some(v);
        }
        if update.clear_last_assessor_verdict {
            state.last_assessor_verdict = None;
        }
        if let Some(v) = update.last_assessor_verdict {
            state.last_assessor_verdict = Some(v);
        }

        if update.increment_attempt {
            state.attempt_count += 1;
        }
        if update.reset_attempt_count {
            state.attempt_count = 0;
        }
        if update.increment_tasks_since_review {
            state.tasks_since_last_review += 1;
        }
        if update.reset_tasks_since_review {
            state.tasks_since_last_review = 0;
        }
        state.urgency = (state.urgency + update.urgency_delta).max(0.0);
        if update.reset_urgency {
            state.urgency = 0.0;
        }

        let mut consume = update.consume_directives.clone();
        consume.sort_unstable();
        consume.dedup();
        for idx in consume.into_iter().rev() {
            if idx < state.pending_directives.len() {
                state.pending_directives.remove(idx);
            }
        }
        if let Some(directive) = update.prepend_directive {
            state.pending_directives.insert(0, directive);
        }
        if let Some(directive) = update.append_directive {
            state.pending_directives.push(directive);
        }

        if let Some(status) = update.status {
            state.status = status;
        }
        if let Some(v) = update.error {
            state.error = Some(v);
        }
        if let Some(v) = update.work_report {
            state.work_report = Some(v);
        }

        if update.clear_ephemeral {
            state.clear_ephemeral();
        }

        state.check_invariants()
    }
}
