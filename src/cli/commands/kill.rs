//! Kill command implementation.
//!
//! `branchline kill [branch]` removes an obsolete feature branch locally and
//! on the remote. Its children move up to the killed branch's parent.

use std::path::{Path, PathBuf};

use crate::cli::args::KillArgs;
use crate::config::RepoConfig;
use crate::error::{BranchlineError, Result};
use crate::git::Repository;
use crate::hierarchy::BranchHierarchy;
use crate::runner::RunOptions;
use crate::steps::{Step, StepList, WrapOptions};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::shared::{
    ensure_has_branch, ensure_knows_parents, fetch, open_repository, run_workflow, uses_remote,
};

/// The kill command implementation.
pub struct KillCommand {
    workdir: PathBuf,
    args: KillArgs,
}

impl KillCommand {
    /// Create a new kill command.
    pub fn new(workdir: &Path, args: KillArgs) -> Self {
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
        let options = RunOptions::new("kill", self.args.recovery.mode(), |repo, ui| {
            let initial_branch = repo.current_branch()?;
            let branch = self
                .args
                .branch
                .clone()
                .unwrap_or_else(|| initial_branch.clone());
            if branch != initial_branch {
                ensure_has_branch(&*repo, &branch)?;
            }
            if config.is_main_or_perennial(&branch) {
                return Err(BranchlineError::precondition(format!(
                    "The branch '{}' is not a feature branch. Only feature branches can be killed.",
                    branch
                )));
            }
            let hierarchy = ensure_knows_parents(repo, ui, config, std::slice::from_ref(&branch))?;
            let remote = uses_remote(&*repo, config)?;
            if remote {
                fetch(repo, ui)?;
            }
            kill_steps(repo, &hierarchy, &branch, remote)
        });
        run_workflow(repo, ui, options)
    }
}

impl Command for KillCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let (mut repo, config) = open_repository(&self.workdir)?;
        self.run(&mut repo, ui, &config)?;
        Ok(CommandResult::success())
    }
}

/// Steps that remove `branch` and hand its children to its parent.
pub fn kill_steps(
    repo: &dyn Repository,
    hierarchy: &BranchHierarchy,
    branch: &str,
    remote: bool,
) -> Result<StepList> {
    let initial_branch = repo.current_branch()?;
    let killing_initial = branch == initial_branch;
    let parent = hierarchy
        .parent_of(branch)
        .unwrap_or(hierarchy.main_branch())
        .to_string();

    let mut steps = StepList::new();
    if killing_initial {
        if repo.has_open_changes()? {
            steps.append(Step::CommitOpenChanges {
                message: format!("WIP on {}", branch),
            });
        }
        steps.append(Step::CheckoutBranch {
            branch: parent.clone(),
        });
    }
    if remote && repo.has_tracking_branch(branch)? {
        steps.append(Step::DeleteRemoteBranch {
            branch: branch.to_string(),
            is_tracking: true,
        });
    }
    steps.append(Step::DeleteLocalBranch {
        branch: branch.to_string(),
        force: true,
    });
    for child in hierarchy.children_of(branch) {
        steps.append(Step::SetParentBranch {
            branch: child,
            parent: parent.clone(),
        });
    }
    steps.append(Step::DeleteParentBranch {
        branch: branch.to_string(),
    });
    steps.append(Step::DeleteAncestorBranches);
    steps.wrap(
        WrapOptions {
            run_in_repo_root: true,
            stash_open_changes: !killing_initial,
        },
        repo,
    )?;
    Ok(steps)
}
