//! Repository driver.
//!
//! Every workflow step talks to the repository through the [`Repository`]
//! capability trait. Two implementations exist:
//!
//! - [`GitRepository`] shells out to the `git` executable
//! - [`MemoryRepository`] keeps branches, commits and configuration in memory
//!   and is used by the test suite
//!
//! Queries take `&self`; mutations take `&mut self`. All calls are
//! synchronous and run to completion.

pub mod command;
pub mod memory;

use std::path::{Path, PathBuf};

use crate::error::Result;

pub use command::GitRepository;
pub use memory::MemoryRepository;

/// Name of the remote used when nothing else is configured.
pub const DEFAULT_REMOTE: &str = "origin";

/// Message of the stash entries branchline creates.
pub const STASH_MESSAGE: &str = "branchline: open changes";

/// Capability set the workflow engine needs from a repository.
pub trait Repository {
    // --- Queries ---

    /// Top-level directory of the working tree.
    fn root_directory(&self) -> Result<PathBuf>;

    /// Directory commands currently run in.
    fn working_directory(&self) -> Result<PathBuf>;

    /// Directory for repository-local tool state (inside the git directory).
    fn state_directory(&self) -> Result<PathBuf>;

    /// Name of the remote pushes and tracking branches refer to.
    fn remote_name(&self) -> &str;

    /// Name of the checked-out branch.
    fn current_branch(&self) -> Result<String>;

    /// Commit the checked-out branch points to.
    fn current_sha(&self) -> Result<String>;

    /// Commit a local branch points to.
    fn branch_sha(&self, branch: &str) -> Result<String>;

    /// Commit the remote tracking branch of `branch` points to, if it exists.
    fn remote_branch_sha(&self, branch: &str) -> Result<Option<String>>;

    /// All local branch names.
    fn local_branches(&self) -> Result<Vec<String>>;

    /// Whether a local branch exists.
    fn has_local_branch(&self, branch: &str) -> Result<bool> {
        Ok(self.local_branches()?.iter().any(|b| b == branch))
    }

    /// Whether the named remote is configured.
    fn has_remote(&self, remote: &str) -> Result<bool>;

    /// Whether `branch` has a remote tracking branch.
    fn has_tracking_branch(&self, branch: &str) -> Result<bool> {
        Ok(self.remote_branch_sha(branch)?.is_some())
    }

    /// Name of the remote tracking branch for `branch`.
    fn tracking_branch(&self, branch: &str) -> String {
        format!("{}/{}", self.remote_name(), branch)
    }

    /// Whether the working tree has uncommitted changes.
    fn has_open_changes(&self) -> Result<bool>;

    /// Whether the most recent stash entry was created by [`Repository::stash`].
    fn has_own_stash(&self) -> Result<bool>;

    /// Whether the index contains unresolved conflicts.
    fn has_conflicts(&self) -> Result<bool>;

    /// Whether a merge is waiting to be committed or aborted.
    fn is_merge_in_progress(&self) -> Result<bool>;

    /// Whether a rebase is waiting to be continued or aborted.
    fn is_rebase_in_progress(&self) -> Result<bool>;

    /// Whether `branch` contains changes that `target` does not.
    fn has_shippable_changes(&self, branch: &str, target: &str) -> Result<bool>;

    /// Read one configuration value.
    fn config_value(&self, key: &str) -> Result<Option<String>>;

    /// All configuration entries whose key starts with `prefix`.
    fn config_entries(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    // --- Mutations ---

    /// Change the directory subsequent commands run in.
    fn change_directory(&mut self, directory: &Path) -> Result<()>;

    /// Fetch updates from the remote.
    fn fetch(&mut self) -> Result<()>;

    /// Check out an existing local branch.
    fn checkout(&mut self, branch: &str) -> Result<()>;

    /// Create a local branch at `starting_point` (a branch, ref or commit).
    fn create_branch(&mut self, branch: &str, starting_point: &str) -> Result<()>;

    /// Delete a local branch.
    fn delete_local_branch(&mut self, branch: &str, force: bool) -> Result<()>;

    /// Delete a branch on the remote.
    fn delete_remote_branch(&mut self, branch: &str) -> Result<()>;

    /// Merge `reference` into the current branch.
    fn merge(&mut self, reference: &str) -> Result<()>;

    /// Abort the merge in progress.
    fn abort_merge(&mut self) -> Result<()>;

    /// Commit the merge in progress, if there is one.
    fn continue_merge(&mut self) -> Result<()>;

    /// Rebase the current branch onto `reference`.
    fn rebase(&mut self, reference: &str) -> Result<()>;

    /// Abort the rebase in progress.
    fn abort_rebase(&mut self) -> Result<()>;

    /// Continue the rebase in progress, if there is one.
    fn continue_rebase(&mut self) -> Result<()>;

    /// Squash all changes of `branch` onto the current branch as one commit.
    fn squash_merge(&mut self, branch: &str, message: Option<&str>) -> Result<()>;

    /// Stage and commit all open changes.
    fn commit_all(&mut self, message: &str) -> Result<()>;

    /// Throw away uncommitted changes, including a half-done squash merge.
    fn discard_open_changes(&mut self) -> Result<()>;

    /// Move the current branch to `sha`.
    fn reset_to_sha(&mut self, sha: &str, hard: bool) -> Result<()>;

    /// Push a local branch to the remote.
    fn push(&mut self, branch: &str, force: bool) -> Result<()>;

    /// Point the remote branch `branch` at `sha`.
    fn push_sha(&mut self, sha: &str, branch: &str, force: bool) -> Result<()>;

    /// Push a local branch and set it up to track the remote.
    fn create_tracking_branch(&mut self, branch: &str) -> Result<()>;

    /// Stash all open changes, including untracked files, under
    /// [`STASH_MESSAGE`].
    fn stash(&mut self) -> Result<()>;

    /// Restore the most recent stash.
    fn pop_stash(&mut self) -> Result<()>;

    /// Write one configuration value.
    fn set_config(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove one configuration value. Missing keys are not an error.
    fn unset_config(&mut self, key: &str) -> Result<()>;
}
