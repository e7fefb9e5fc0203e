//! Hack command implementation.
//!
//! `branchline hack <branch>` updates the main branch and creates a new
//! feature branch off it.

use std::path::{Path, PathBuf};

use crate::cli::args::HackArgs;
use crate::config::RepoConfig;
use crate::error::{BranchlineError, Result};
use crate::git::Repository;
use crate::hierarchy::BranchHierarchy;
use crate::runner::RunOptions;
use crate::steps::{Step, StepList, WrapOptions};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::shared::{
    ensure_no_branch, fetch, open_repository, run_workflow, sync_branch_steps, uses_remote,
};

/// The hack command implementation.
pub struct HackCommand {
    workdir: PathBuf,
    args: HackArgs,
}

impl HackCommand {
    /// Create a new hack command.
    pub fn new(workdir: &Path, args: HackArgs) -> Self {
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
        let options = RunOptions::new("hack", self.args.recovery.mode(), |repo, ui| {
            let branch = self
                .args
                .branch
                .as_deref()
                .ok_or_else(|| BranchlineError::precondition("Missing branch name"))?;
            ensure_no_branch(&*repo, branch)?;
            let remote = uses_remote(&*repo, config)?;
            if remote {
                fetch(repo, ui)?;
            }
            hack_steps(repo, config, branch, remote)
        });
        run_workflow(repo, ui, options)
    }
}

impl Command for HackCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let (mut repo, config) = open_repository(&self.workdir)?;
        self.run(&mut repo, ui, &config)?;
        Ok(CommandResult::success())
    }
}

/// Steps that sync the main branch and branch `branch` off it.
pub fn hack_steps(
    repo: &dyn Repository,
    config: &RepoConfig,
    branch: &str,
    remote: bool,
) -> Result<StepList> {
    let hierarchy = BranchHierarchy::load(repo, config)?;
    let main = hierarchy.main_branch().to_string();

    let mut steps = sync_branch_steps(repo, &hierarchy, &main, remote)?;
    steps.append(Step::CreateBranch {
        branch: branch.to_string(),
        starting_point: main.clone(),
    });
    steps.append(Step::SetParentBranch {
        branch: branch.to_string(),
        parent: main,
    });
    steps.append(Step::CheckoutBranch {
        branch: branch.to_string(),
    });
    if remote {
        steps.append(Step::CreateTrackingBranch {
            branch: branch.to_string(),
        });
    }
    steps.wrap(
        WrapOptions {
            run_in_repo_root: true,
            stash_open_changes: true,
        },
        repo,
    )?;
    Ok(steps)
}
