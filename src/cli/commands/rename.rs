//! Rename-branch command implementation.
//!
//! `branchline rename-branch <old> <new>` renames a feature branch locally
//! and on the remote while keeping its parent and children.

use std::path::{Path, PathBuf};

use crate::cli::args::RenameBranchArgs;
use crate::config::RepoConfig;
use crate::error::{BranchlineError, Result};
use crate::git::Repository;
use crate::hierarchy::BranchHierarchy;
use crate::runner::RunOptions;
use crate::steps::{Step, StepList};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::shared::{
    ensure_has_branch, ensure_knows_parents, ensure_no_branch, fetch, open_repository,
    run_workflow, uses_remote,
};

/// The rename-branch command implementation.
pub struct RenameBranchCommand {
    workdir: PathBuf,
    args: RenameBranchArgs,
}

impl RenameBranchCommand {
    /// Create a new rename-branch command.
    pub fn new(workdir: &Path, args: RenameBranchArgs) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            args,
        }
    }

    /// Run the command against an opened repository.
    pub fn run(
        &self,
        repo: &mut dyn Repository,
        ui: &mut dyn UserInterface,
        config: &RepoConfig,
    ) -> Result<()> {
        let options = RunOptions::new("rename-branch", self.args.recovery.mode(), |repo, ui| {
            let (old, new) = match (&self.args.old_name, &self.args.new_name) {
                (Some(old), Some(new)) => (old.as_str(), new.as_str()),
                _ => {
                    return Err(BranchlineError::precondition(
                        "Please provide the current and the new branch name",
                    ))
                }
            };
            if old == new {
                return Err(BranchlineError::precondition(
                    "Cannot rename a branch to its current name",
                ));
            }
            ensure_has_branch(&*repo, old)?;
            if config.is_main_or_perennial(old) {
                return Err(BranchlineError::precondition(format!(
                    "The branch '{}' is not a feature branch. Only feature branches can be renamed.",
                    old
                )));
            }
            ensure_no_branch(&*repo, new)?;
            let remote = uses_remote(&*repo, config)?;
            if remote {
                fetch(repo, ui)?;
                if repo.has_tracking_branch(new)? {
                    return Err(BranchlineError::precondition(format!(
                        "A branch named '{}' already exists on the remote",
                        new
                    )));
                }
            }
            let hierarchy = ensure_knows_parents(repo, ui, config, &[old.to_string()])?;
            rename_steps(repo, &hierarchy, old, new, remote)
        });
        run_workflow(repo, ui, options)
    }
}

impl Command for RenameBranchCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let (mut repo, config) = open_repository(&self.workdir)?;
        self.run(&mut repo, ui, &config)?;
        Ok(CommandResult::success())
    }
}

/// Steps that move `old` to `new`.
pub fn rename_steps(
    repo: &dyn Repository,
    hierarchy: &BranchHierarchy,
    old: &str,
    new: &str,
    remote: bool,
) -> Result<StepList> {
    let mut steps = StepList::new();
    steps.append(Step::CreateBranch {
        branch: new.to_string(),
        starting_point: old.to_string(),
    });
    if repo.current_branch()? == old {
        steps.append(Step::CheckoutBranch {
            branch: new.to_string(),
        });
    }
    for child in hierarchy.children_of(old) {
        steps.append(Step::SetParentBranch {
            branch: child,
            parent: new.to_string(),
        });
    }
    if let Some(parent) = hierarchy.parent_of(old) {
        steps.append(Step::SetParentBranch {
            branch: new.to_string(),
            parent: parent.to_string(),
        });
    }
    steps.append(Step::DeleteParentBranch {
        branch: old.to_string(),
    });
    if remote && repo.has_tracking_branch(old)? {
        steps.append(Step::CreateTrackingBranch {
            branch: new.to_string(),
        });
        steps.append(Step::DeleteRemoteBranch {
            branch: old.to_string(),
            is_tracking: true,
        });
    }
    steps.append(Step::DeleteLocalBranch {
        branch: old.to_string(),
        force: true,
    });
    Ok(steps)
}
