//! Durable run state.
//!
//! When a step fails, the runner records what is left to do and how to back
//! out in a [`RunState`] and persists it through a [`RunStateStore`]. A later
//! invocation with `--continue`, `--abort`, `--undo` or `--skip` picks it up.
//!
//! There is one slot per repository: the file
//! `<git-dir>/branchline/runstate.json`.

pub mod run_state;
pub mod store;

pub use run_state::RunState;
pub use store::{RunStateStore, RUN_STATE_FILE};
