//! Status command implementation.
//!
//! The `branchline status` command shows the last recorded run.

use std::path::{Path, PathBuf};

use crate::cli::args::StatusArgs;
use crate::error::Result;
use crate::git::{GitRepository, Repository};
use crate::runner::print_guidance;
use crate::state::{RunState, RunStateStore};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The status command implementation.
pub struct StatusCommand {
    workdir: PathBuf,
    args: StatusArgs,
}

impl StatusCommand {
    /// Create a new status command.
    pub fn new(workdir: &Path, args: StatusArgs) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            args,
        }
    }

    /// Report the run state of `repo`.
    pub fn run(&self, repo: &dyn Repository, ui: &mut dyn UserInterface) -> Result<()> {
        let store = RunStateStore::for_repository(repo)?;
        let state = store.load()?;

        if self.args.json {
            let json = serde_json::to_string_pretty(&state).map_err(anyhow::Error::from)?;
            ui.message(&json);
            return Ok(());
        }

        match state {
            None => ui.message("No branchline run recorded for this repository."),
            Some(state) => show_state(ui, &state),
        }
        Ok(())
    }
}

impl Command for StatusCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let repo = GitRepository::open(&self.workdir)?;
        self.run(&repo, ui)?;
        Ok(CommandResult::success())
    }
}

fn show_state(ui: &mut dyn UserInterface, state: &RunState) {
    ui.message(&format!(
        "Last run: {} (started on '{}', {})",
        state.command,
        state.initial_branch,
        state.created_at.format("%Y-%m-%d %H:%M")
    ));

    if !state.is_unfinished {
        ui.success("Finished");
        ui.show_hint(&format!(
            "To undo it, run \"branchline {} --undo\".",
            state.command
        ));
        return;
    }

    ui.warning("Unfinished");
    if let Some(message) = &state.message {
        ui.message(&format!("Stopped at: {}", message));
    }
    if !state.remaining_steps.is_empty() {
        ui.message("Remaining steps:");
        for step in state.remaining_steps.iter() {
            ui.message(&format!("  {}", step));
        }
    }
    print_guidance(ui, &state.command, state.can_skip);
}
