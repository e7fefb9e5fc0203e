//! The unit of work.
//!
//! A [`Step`] wraps exactly one repository mutation. Besides running, every
//! step knows how to produce its counterparts:
//!
//! - [`Step::abort_step`] backs out a half-finished execution of the step
//! - [`Step::continue_step`] finishes the step after the user resolved a conflict
//! - [`Step::undo_step`] reverses a successful execution; it is built from the
//!   repository state *before* the step runs
//!
//! Steps are plain data. They are serialized into the run state so that an
//! interrupted run can be resumed by a later process.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BranchlineError, Result};
use crate::git::Repository;
use crate::hierarchy::{parent_key, read_links};

/// A single unit of work against the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Step {
    AbortMerge,
    AbortRebase,
    ChangeDirectory {
        directory: PathBuf,
    },
    CheckoutBranch {
        branch: String,
    },
    CommitOpenChanges {
        message: String,
    },
    ContinueMerge,
    ContinueRebase,
    CreateBranch {
        branch: String,
        starting_point: String,
    },
    CreateRemoteBranch {
        branch: String,
        sha: String,
    },
    CreateTrackingBranch {
        branch: String,
    },
    /// Remove parent links of branches that no longer exist.
    DeleteAncestorBranches,
    DeleteLocalBranch {
        branch: String,
        force: bool,
    },
    DeleteParentBranch {
        branch: String,
    },
    DeleteRemoteBranch {
        branch: String,
        is_tracking: bool,
    },
    DiscardOpenChanges,
    /// Fail unless `branch` has changes that `target` does not.
    EnsureHasShippableChanges {
        branch: String,
        target: String,
    },
    MergeBranch {
        branch: String,
    },
    /// Merge the current branch's remote tracking branch, if it has one.
    MergeTrackingBranch,
    NoOp,
    PushBranch {
        branch: String,
        force: bool,
        undoable: bool,
    },
    /// Rebase the current branch onto its remote tracking branch, if it has one.
    RebaseTrackingBranch,
    ResetRemoteBranchToSha {
        branch: String,
        sha: String,
    },
    ResetToSha {
        sha: String,
        hard: bool,
    },
    /// Pop the stash entry on top, if branchline created it.
    RestoreOpenChanges,
    RestoreParentBranches {
        links: BTreeMap<String, String>,
    },
    SetParentBranch {
        branch: String,
        parent: String,
    },
    SquashMergeBranch {
        branch: String,
        message: Option<String>,
    },
    /// Stash open changes, if there are any.
    StashOpenChanges,
}

impl Step {
    /// Perform the step's mutation.
    pub fn run(&self, repo: &mut dyn Repository) -> Result<()> {
        debug!(step = %self, "Running step");
        match self {
            Step::AbortMerge => repo.abort_merge(),
            Step::AbortRebase => repo.abort_rebase(),
            Step::ChangeDirectory { directory } => {
                if directory.exists() {
                    repo.change_directory(directory)
                } else {
                    debug!("Directory {} does not exist, staying put", directory.display());
                    Ok(())
                }
            }
            Step::CheckoutBranch { branch } => {
                if repo.current_branch()? == *branch {
                    return Ok(());
                }
                repo.checkout(branch)
            }
            Step::CommitOpenChanges { message } => repo.commit_all(message),
            Step::ContinueMerge => repo.continue_merge(),
            Step::ContinueRebase => repo.continue_rebase(),
            Step::CreateBranch {
                branch,
                starting_point,
            } => repo.create_branch(branch, starting_point),
            Step::CreateRemoteBranch { branch, sha } => repo.push_sha(sha, branch, false),
            Step::CreateTrackingBranch { branch } => repo.create_tracking_branch(branch),
            Step::DeleteAncestorBranches => {
                for branch in stale_links(repo)?.keys() {
                    repo.unset_config(&parent_key(branch))?;
                }
                Ok(())
            }
            Step::DeleteLocalBranch { branch, force } => repo.delete_local_branch(branch, *force),
            Step::DeleteParentBranch { branch } => repo.unset_config(&parent_key(branch)),
            Step::DeleteRemoteBranch { branch, .. } => repo.delete_remote_branch(branch),
            Step::DiscardOpenChanges => repo.discard_open_changes(),
            Step::EnsureHasShippableChanges { branch, target } => {
                if repo.has_shippable_changes(branch, target)? {
                    Ok(())
                } else {
                    Err(BranchlineError::NothingToShip {
                        branch: branch.clone(),
                    })
                }
            }
            Step::MergeBranch { branch } => repo.merge(branch),
            Step::MergeTrackingBranch => {
                let current = repo.current_branch()?;
                if repo.has_tracking_branch(&current)? {
                    let tracking = repo.tracking_branch(&current);
                    repo.merge(&tracking)?;
                }
                Ok(())
            }
            Step::NoOp => Ok(()),
            Step::PushBranch { branch, force, .. } => repo.push(branch, *force),
            Step::RebaseTrackingBranch => {
                let current = repo.current_branch()?;
                if repo.has_tracking_branch(&current)? {
                    let tracking = repo.tracking_branch(&current);
                    repo.rebase(&tracking)?;
                }
                Ok(())
            }
            Step::ResetRemoteBranchToSha { branch, sha } => repo.push_sha(sha, branch, true),
            Step::ResetToSha { sha, hard } => repo.reset_to_sha(sha, *hard),
            Step::RestoreOpenChanges => {
                if repo.has_own_stash()? {
                    repo.pop_stash()?;
                }
                Ok(())
            }
            Step::RestoreParentBranches { links } => {
                for (branch, parent) in links {
                    repo.set_config(&parent_key(branch), parent)?;
                }
                Ok(())
            }
            Step::SetParentBranch { branch, parent } => {
                repo.set_config(&parent_key(branch), parent)
            }
            Step::SquashMergeBranch { branch, message } => {
                repo.squash_merge(branch, message.as_deref())
            }
            Step::StashOpenChanges => {
                if repo.has_open_changes()? {
                    repo.stash()?;
                }
                Ok(())
            }
        }
    }

    /// Step that backs out a failed execution of this step.
    pub fn abort_step(&self) -> Step {
        match self {
            Step::MergeBranch { .. } | Step::MergeTrackingBranch => Step::AbortMerge,
            Step::RebaseTrackingBranch => Step::AbortRebase,
            Step::SquashMergeBranch { .. } => Step::DiscardOpenChanges,
            _ => Step::NoOp,
        }
    }

    /// Step that finishes this step once its conflicts are resolved.
    pub fn continue_step(&self) -> Step {
        match self {
            Step::MergeBranch { .. } | Step::MergeTrackingBranch => Step::ContinueMerge,
            Step::RebaseTrackingBranch => Step::ContinueRebase,
            Step::SquashMergeBranch { branch, message } => Step::CommitOpenChanges {
                message: message.clone().unwrap_or_else(|| branch.clone()),
            },
            _ => Step::NoOp,
        }
    }

    /// Step that reverses this step. Must be called before [`Step::run`].
    pub fn undo_step(&self, repo: &dyn Repository) -> Result<Step> {
        let step = match self {
            Step::CheckoutBranch { .. } => Step::CheckoutBranch {
                branch: repo.current_branch()?,
            },
            Step::CommitOpenChanges { .. } => Step::ResetToSha {
                sha: repo.current_sha()?,
                hard: false,
            },
            Step::CreateBranch { branch, .. } => Step::DeleteLocalBranch {
                branch: branch.clone(),
                force: true,
            },
            Step::CreateTrackingBranch { branch } => Step::DeleteRemoteBranch {
                branch: branch.clone(),
                is_tracking: true,
            },
            Step::DeleteAncestorBranches => Step::RestoreParentBranches {
                links: stale_links(repo)?,
            },
            Step::DeleteLocalBranch { branch, .. } => Step::CreateBranch {
                branch: branch.clone(),
                starting_point: repo.branch_sha(branch)?,
            },
            Step::DeleteParentBranch { branch } => {
                match repo.config_value(&parent_key(branch))? {
                    Some(parent) => Step::SetParentBranch {
                        branch: branch.clone(),
                        parent,
                    },
                    None => Step::NoOp,
                }
            }
            Step::DeleteRemoteBranch { branch, .. } => match repo.remote_branch_sha(branch)? {
                Some(sha) => Step::CreateRemoteBranch {
                    branch: branch.clone(),
                    sha,
                },
                None => Step::NoOp,
            },
            Step::MergeBranch { .. }
            | Step::MergeTrackingBranch
            | Step::RebaseTrackingBranch
            | Step::SquashMergeBranch { .. } => Step::ResetToSha {
                sha: repo.current_sha()?,
                hard: true,
            },
            Step::PushBranch {
                branch, undoable, ..
            } => {
                if !undoable {
                    Step::NoOp
                } else {
                    match repo.remote_branch_sha(branch)? {
                        Some(sha) => Step::ResetRemoteBranchToSha {
                            branch: branch.clone(),
                            sha,
                        },
                        None => Step::DeleteRemoteBranch {
                            branch: branch.clone(),
                            is_tracking: true,
                        },
                    }
                }
            }
            Step::RestoreOpenChanges => Step::StashOpenChanges,
            Step::SetParentBranch { branch, .. } => {
                match repo.config_value(&parent_key(branch))? {
                    Some(parent) => Step::SetParentBranch {
                        branch: branch.clone(),
                        parent,
                    },
                    None => Step::DeleteParentBranch {
                        branch: branch.clone(),
                    },
                }
            }
            Step::StashOpenChanges => Step::RestoreOpenChanges,
            _ => Step::NoOp,
        };
        Ok(step)
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Step::NoOp)
    }
}

/// Parent links whose branch no longer exists locally.
fn stale_links(repo: &dyn Repository) -> Result<BTreeMap<String, String>> {
    let existing = repo.local_branches()?;
    Ok(read_links(repo)?
        .into_iter()
        .filter(|(branch, _)| !existing.contains(branch))
        .collect())
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::AbortMerge => write!(f, "git merge --abort"),
            Step::AbortRebase => write!(f, "git rebase --abort"),
            Step::ChangeDirectory { directory } => write!(f, "cd {}", directory.display()),
            Step::CheckoutBranch { branch } => write!(f, "git checkout {}", branch),
            Step::CommitOpenChanges { message } => write!(f, "git commit -am \"{}\"", message),
            Step::ContinueMerge => write!(f, "git commit --no-edit"),
            Step::ContinueRebase => write!(f, "git rebase --continue"),
            Step::CreateBranch {
                branch,
                starting_point,
            } => write!(f, "git branch {} {}", branch, starting_point),
            Step::CreateRemoteBranch { branch, sha } => {
                write!(f, "git push {}:refs/heads/{}", sha, branch)
            }
            Step::CreateTrackingBranch { branch } => write!(f, "git push -u {}", branch),
            Step::DeleteAncestorBranches => write!(f, "remove stale parent links"),
            Step::DeleteLocalBranch { branch, force } => {
                write!(f, "git branch {} {}", if *force { "-D" } else { "-d" }, branch)
            }
            Step::DeleteParentBranch { branch } => write!(f, "forget parent of {}", branch),
            Step::DeleteRemoteBranch { branch, .. } => write!(f, "git push --delete {}", branch),
            Step::DiscardOpenChanges => write!(f, "git reset --hard"),
            Step::EnsureHasShippableChanges { branch, target } => {
                write!(f, "ensure {} has changes not in {}", branch, target)
            }
            Step::MergeBranch { branch } => write!(f, "git merge --no-edit {}", branch),
            Step::MergeTrackingBranch => write!(f, "git merge --no-edit <tracking branch>"),
            Step::NoOp => write!(f, "nothing"),
            Step::PushBranch { branch, force, .. } => {
                if *force {
                    write!(f, "git push --force-with-lease {}", branch)
                } else {
                    write!(f, "git push {}", branch)
                }
            }
            Step::RebaseTrackingBranch => write!(f, "git rebase <tracking branch>"),
            Step::ResetRemoteBranchToSha { branch, sha } => {
                write!(f, "git push --force {}:refs/heads/{}", sha, branch)
            }
            Step::ResetToSha { sha, hard } => {
                if *hard {
                    write!(f, "git reset --hard {}", sha)
                } else {
                    write!(f, "git reset {}", sha)
                }
            }
            Step::RestoreOpenChanges => write!(f, "git stash pop"),
            Step::RestoreParentBranches { links } => {
                write!(f, "restore {} parent link(s)", links.len())
            }
            Step::SetParentBranch { branch, parent } => {
                write!(f, "set parent of {} to {}", branch, parent)
            }
            Step::SquashMergeBranch { branch, .. } => write!(f, "git merge --squash {}", branch),
            Step::StashOpenChanges => write!(f, "git stash"),
        }
    }
}
