//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. The workflow commands (`hack`,
//! `sync`, `ship`, `kill`, `rename-branch`) check their preconditions, build
//! a step list and hand it to the [`Runner`](crate::runner::Runner); the
//! building blocks they share live in [`shared`].

pub mod completions;
pub mod dispatcher;
pub mod hack;
pub mod kill;
pub mod rename;
pub mod shared;
pub mod ship;
pub mod status;
pub mod sync;

pub use dispatcher::{report_error, Command, CommandDispatcher, CommandResult};
