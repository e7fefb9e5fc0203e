//! Sync command implementation.
//!
//! `branchline sync` brings the current branch and its ancestors up to date
//! with their tracking branches and parents, oldest ancestor first. With
//! `--all` it syncs every local branch.

use std::path::{Path, PathBuf};

use crate::cli::args::SyncArgs;
use crate::config::RepoConfig;
use crate::error::Result;
use crate::git::Repository;
use crate::hierarchy::BranchHierarchy;
use crate::runner::RunOptions;
use crate::steps::{Step, StepList, WrapOptions};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::shared::{
    ensure_knows_parents, fetch, open_repository, run_workflow, sync_branch_steps, uses_remote,
};

/// The sync command implementation.
pub struct SyncCommand {
    workdir: PathBuf,
    args: SyncArgs,
}

impl SyncCommand {
    /// Create a new sync command.
    pub fn new(workdir: &Path, args: SyncArgs) -> Self {
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
        let options = RunOptions::new("sync", self.args.mode(), |repo, ui| {
            let branches = if self.args.all {
                repo.local_branches()?
            } else {
                vec![repo.current_branch()?]
            };
            let hierarchy = ensure_knows_parents(repo, ui, config, &branches)?;
            let remote = uses_remote(&*repo, config)?;
            if remote {
                fetch(repo, ui)?;
            }
            sync_steps(repo, &hierarchy, self.args.all, remote)
        })
        .with_skip(
            |repo, initial_branch| {
                repo.current_branch()
                    .map(|current| current != initial_branch)
                    .unwrap_or(false)
            },
            |repo| match repo.current_branch() {
                Ok(branch) => format!("Skipping sync of branch '{}'", branch),
                Err(_) => "Skipping the current branch".to_string(),
            },
        );
        run_workflow(repo, ui, options)
    }
}

impl Command for SyncCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let (mut repo, config) = open_repository(&self.workdir)?;
        self.run(&mut repo, ui, &config)?;
        Ok(CommandResult::success())
    }
}

/// Branches a sync touches, in the order they are synced.
pub fn branches_to_sync(
    repo: &dyn Repository,
    hierarchy: &BranchHierarchy,
    all: bool,
) -> Result<Vec<String>> {
    if all {
        return Ok(hierarchy.order_parents_first(&repo.local_branches()?));
    }
    let current = repo.current_branch()?;
    let mut branches = hierarchy.ancestors_of(&current);
    branches.reverse();
    branches.push(current);
    Ok(branches)
}

/// Steps that sync the selected branches and return to the current one.
pub fn sync_steps(
    repo: &dyn Repository,
    hierarchy: &BranchHierarchy,
    all: bool,
    remote: bool,
) -> Result<StepList> {
    let initial_branch = repo.current_branch()?;
    let mut steps = StepList::new();
    for branch in branches_to_sync(repo, hierarchy, all)? {
        steps.append_list(sync_branch_steps(repo, hierarchy, &branch, remote)?);
    }
    steps.append(Step::CheckoutBranch {
        branch: initial_branch,
    });
    steps.wrap(
        WrapOptions {
            run_in_repo_root: true,
            stash_open_changes: true,
        },
        repo,
    )?;
    Ok(steps)
}
