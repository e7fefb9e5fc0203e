//! The persisted record of one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::steps::{Step, StepList};

/// Everything needed to resume, abort or undo a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Name of the command that produced this run (e.g. `sync`).
    pub command: String,

    /// Resumed form of the failing step, run first on `--continue`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_step: Option<Step>,

    /// Steps after the failing one.
    #[serde(default)]
    pub remaining_steps: StepList,

    /// Steps that back out the unfinished run, in execution order.
    #[serde(default)]
    pub abort_steps: StepList,

    /// Steps that reverse the completed steps, most recent first.
    #[serde(default)]
    pub undo_steps: StepList,

    /// Whether the run stopped before completing.
    pub is_unfinished: bool,

    /// Branch that was checked out when the run started.
    pub initial_branch: String,

    /// Whether `--skip` may be used on the failing step.
    #[serde(default)]
    pub can_skip: bool,

    /// The failing step itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<Step>,

    /// Undo step of the failing step, captured before it ran. Joins the undo
    /// steps once the failing step is continued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_undo_step: Option<Step>,

    /// Whether the failing step leads `remaining_steps` and runs again on
    /// `--continue`. Set for failures that left nothing to resolve.
    #[serde(default)]
    pub retries_failed_step: bool,

    /// What went wrong.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl RunState {
    /// Record of a run that completed; keeps its undo steps.
    pub fn finished(
        command: impl Into<String>,
        initial_branch: impl Into<String>,
        undo_steps: StepList,
    ) -> Self {
        Self {
            command: command.into(),
            continue_step: None,
            remaining_steps: StepList::new(),
            abort_steps: StepList::new(),
            undo_steps,
            is_unfinished: false,
            initial_branch: initial_branch.into(),
            can_skip: false,
            failed_step: None,
            pending_undo_step: None,
            retries_failed_step: false,
            message: None,
            created_at: Utc::now(),
        }
    }

    /// Record of a run that stopped at `failed_step`.
    ///
    /// The abort list is the failing step's abort step followed by the undo
    /// steps of everything that already completed.
    pub fn interrupted(
        command: impl Into<String>,
        initial_branch: impl Into<String>,
        failed_step: Step,
        remaining_steps: StepList,
        undo_steps: StepList,
        can_skip: bool,
        message: impl Into<String>,
    ) -> Self {
        let mut abort_steps = StepList::new();
        let abort = failed_step.abort_step();
        if !abort.is_noop() {
            abort_steps.append(abort);
        }
        abort_steps.append_list(undo_steps.clone());

        let continue_step = Some(failed_step.continue_step()).filter(|s| !s.is_noop());

        Self {
            command: command.into(),
            continue_step,
            remaining_steps,
            abort_steps,
            undo_steps,
            is_unfinished: true,
            initial_branch: initial_branch.into(),
            can_skip,
            failed_step: Some(failed_step),
            pending_undo_step: None,
            retries_failed_step: false,
            message: Some(message.into()),
            created_at: Utc::now(),
        }
    }

    /// Remember the undo step of the failing step.
    pub fn with_pending_undo(mut self, undo: Step) -> Self {
        if !self.retries_failed_step {
            self.pending_undo_step = Some(undo).filter(|s| !s.is_noop());
        }
        self
    }

    /// Queue the failing step to run again on `--continue`.
    ///
    /// Used when the step failed without leaving a merge or rebase behind,
    /// e.g. a rejected push or a blocked checkout. The step changed nothing,
    /// so it has no abort step and no pending undo step.
    pub fn retry_failed_step(mut self) -> Self {
        if let Some(failed) = &self.failed_step {
            self.remaining_steps.prepend(failed.clone());
        }
        self.retries_failed_step = true;
        self.continue_step = None;
        self.pending_undo_step = None;
        self.abort_steps = self.undo_steps.clone();
        self
    }
}
