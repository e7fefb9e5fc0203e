//! Step list execution.
//!
//! The [`Runner`] executes a freshly built [`StepList`](crate::steps::StepList)
//! or resumes a persisted [`RunState`](crate::state::RunState), depending on
//! the [`RunMode`] chosen from the command line.

pub mod recovery;
pub mod workflow;

pub use recovery::{print_guidance, run_best_effort};
pub use workflow::{RunOptions, Runner, SkipCheck, SkipMessage, StepBuilder};

/// How an invocation treats the run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Build a new step list and run it.
    #[default]
    Normal,
    /// Back out the interrupted run.
    Abort,
    /// Resume the interrupted run after conflicts were resolved.
    Continue,
    /// Reverse the last run, finished or not.
    Undo,
    /// Drop the failing step and resume with the rest.
    Skip,
}

impl RunMode {
    /// Mode selected by mutually exclusive command-line flags.
    pub fn from_flags(abort: bool, continue_: bool, undo: bool, skip: bool) -> Self {
        if abort {
            Self::Abort
        } else if continue_ {
            Self::Continue
        } else if undo {
            Self::Undo
        } else if skip {
            Self::Skip
        } else {
            Self::Normal
        }
    }

    /// Verb used in messages ("Nothing to continue").
    pub fn action(&self) -> &'static str {
        match self {
            Self::Normal => "run",
            Self::Abort => "abort",
            Self::Continue => "continue",
            Self::Undo => "undo",
            Self::Skip => "skip",
        }
    }

    /// Command-line flag selecting this mode.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Normal => "",
            Self::Abort => "--abort",
            Self::Continue => "--continue",
            Self::Undo => "--undo",
            Self::Skip => "--skip",
        }
    }
}
