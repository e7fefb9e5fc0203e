//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands
//! - [`report_error`] for printing a failed command's error

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands};
use crate::error::{BranchlineError, Result};
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Arguments
    ///
    /// * `ui` - User interface for displaying output and prompts
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    workdir: PathBuf,
}

impl CommandDispatcher {
    /// Create a new dispatcher running in `workdir`.
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }

    /// Directory the commands run in.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        match &cli.command {
            Commands::Hack(args) => {
                let cmd = super::hack::HackCommand::new(&self.workdir, args.clone());
                cmd.execute(ui)
            }
            Commands::Sync(args) => {
                let cmd = super::sync::SyncCommand::new(&self.workdir, args.clone());
                cmd.execute(ui)
            }
            Commands::Ship(args) => {
                let cmd = super::ship::ShipCommand::new(&self.workdir, args.clone());
                cmd.execute(ui)
            }
            Commands::Kill(args) => {
                let cmd = super::kill::KillCommand::new(&self.workdir, args.clone());
                cmd.execute(ui)
            }
            Commands::RenameBranch(args) => {
                let cmd = super::rename::RenameBranchCommand::new(&self.workdir, args.clone());
                cmd.execute(ui)
            }
            Commands::Status(args) => {
                let cmd = super::status::StatusCommand::new(&self.workdir, args.clone());
                cmd.execute(ui)
            }
            Commands::Completions(args) => {
                let cmd = super::completions::CompletionsCommand::new(args.clone());
                cmd.execute(ui)
            }
        }
    }
}

/// Print a command's terminal error.
///
/// Interrupted runs have already printed their failure and recovery
/// guidance, so only the other errors are written here.
pub fn report_error(ui: &mut dyn UserInterface, error: &BranchlineError) {
    match error {
        BranchlineError::RunInterrupted { .. } => {}
        BranchlineError::Precondition {
            message,
            hint: Some(hint),
        } => {
            ui.error(message);
            ui.show_hint(hint);
        }
        other => ui.error(&other.to_string()),
    }
}
