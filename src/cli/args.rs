//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::runner::RunMode;

/// Branchline - Resumable branch workflows on top of git.
#[derive(Debug, Parser)]
#[command(name = "branchline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show every git command as it runs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Never prompt; use defaults or BRANCHLINE_PROMPT_* variables
    #[arg(long, global = true)]
    pub non_interactive: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a new feature branch off the main branch
    Hack(HackArgs),

    /// Update the current branch with all relevant changes
    Sync(SyncArgs),

    /// Squash-merge a completed feature branch into its parent
    Ship(ShipArgs),

    /// Remove an obsolete feature branch
    Kill(KillArgs),

    /// Rename a feature branch and keep its place in the hierarchy
    RenameBranch(RenameBranchArgs),

    /// Show the last recorded run
    Status(StatusArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Flags that resume or revert the last run instead of starting a new one.
#[derive(Debug, Clone, Copy, Default, clap::Args)]
pub struct RecoveryArgs {
    /// Abort the interrupted run and restore the state before it
    #[arg(long, group = "recovery")]
    pub abort: bool,

    /// Continue the interrupted run after resolving conflicts
    #[arg(long = "continue", group = "recovery")]
    pub continue_: bool,

    /// Undo the last run
    #[arg(long, group = "recovery")]
    pub undo: bool,
}

impl RecoveryArgs {
    pub fn mode(&self) -> RunMode {
        RunMode::from_flags(self.abort, self.continue_, self.undo, false)
    }
}

/// Arguments for the `hack` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct HackArgs {
    /// Name of the branch to create
    #[arg(required_unless_present_any = ["abort", "continue_", "undo"])]
    pub branch: Option<String>,

    #[command(flatten)]
    pub recovery: RecoveryArgs,
}

/// Arguments for the `sync` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct SyncArgs {
    /// Sync every local branch
    #[arg(long)]
    pub all: bool,

    /// Skip the branch that failed to sync and continue with the rest
    #[arg(long, group = "recovery")]
    pub skip: bool,

    #[command(flatten)]
    pub recovery: RecoveryArgs,
}

impl SyncArgs {
    pub fn mode(&self) -> RunMode {
        RunMode::from_flags(
            self.recovery.abort,
            self.recovery.continue_,
            self.recovery.undo,
            self.skip,
        )
    }
}

/// Arguments for the `ship` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ShipArgs {
    /// Branch to ship (defaults to the current branch)
    pub branch: Option<String>,

    /// Commit message for the squash commit
    #[arg(short, long)]
    pub message: Option<String>,

    #[command(flatten)]
    pub recovery: RecoveryArgs,
}

/// Arguments for the `kill` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct KillArgs {
    /// Branch to remove (defaults to the current branch)
    pub branch: Option<String>,

    #[command(flatten)]
    pub recovery: RecoveryArgs,
}

/// Arguments for the `rename-branch` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RenameBranchArgs {
    /// Current name of the branch
    #[arg(required_unless_present_any = ["abort", "continue_", "undo"])]
    pub old_name: Option<String>,

    /// New name of the branch
    #[arg(required_unless_present_any = ["abort", "continue_", "undo"])]
    pub new_name: Option<String>,

    #[command(flatten)]
    pub recovery: RecoveryArgs,
}

/// Arguments for the `status` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
