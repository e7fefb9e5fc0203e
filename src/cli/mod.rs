//! Command-line interface for branchline.
//!
//! This module provides the CLI argument parsing using clap's derive macros
//! and command implementations.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{
    Cli, Commands, CompletionsArgs, HackArgs, KillArgs, RecoveryArgs, RenameBranchArgs, ShipArgs,
    StatusArgs, SyncArgs,
};
pub use commands::{report_error, Command, CommandDispatcher, CommandResult};
