//! Ship command implementation.
//!
//! `branchline ship` squash-merges a completed feature branch into its
//! parent, pushes the parent, and removes the shipped branch locally and on
//! the remote. Only branches whose parent is the main branch or a perennial
//! branch can be shipped; nested branches need their ancestors shipped first.

use std::path::{Path, PathBuf};

use crate::cli::args::ShipArgs;
use crate::config::RepoConfig;
use crate::error::{BranchlineError, Result};
use crate::git::Repository;
use crate::hierarchy::BranchHierarchy;
use crate::runner::RunOptions;
use crate::steps::{Step, StepList, WrapOptions};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::shared::{
    ensure_has_branch, ensure_knows_parents, ensure_no_open_changes, fetch, open_repository,
    run_workflow, sync_branch_steps, uses_remote,
};

/// What a verified `ship` invocation will do.
#[derive(Debug, Clone)]
pub struct ShipPlan {
    pub branch: String,
    pub initial_branch: String,
    pub hierarchy: BranchHierarchy,
    pub remote: bool,
}

/// The ship command implementation.
pub struct ShipCommand {
    workdir: PathBuf,
    args: ShipArgs,
}

impl ShipCommand {
    /// Create a new ship command.
    pub fn new(workdir: &Path, args: ShipArgs) -> Self {
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
        let options = RunOptions::new("ship", self.args.recovery.mode(), |repo, ui| {
            let plan = check_preconditions(repo, ui, config, self.args.branch.as_deref())?;
            ship_steps(repo, &plan, self.args.message.as_deref())
        });
        run_workflow(repo, ui, options)
    }
}

impl Command for ShipCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let (mut repo, config) = open_repository(&self.workdir)?;
        self.run(&mut repo, ui, &config)?;
        Ok(CommandResult::success())
    }
}

/// Verify that `branch` (or the current branch) can be shipped.
pub fn check_preconditions(
    repo: &mut dyn Repository,
    ui: &mut dyn UserInterface,
    config: &RepoConfig,
    branch: Option<&str>,
) -> Result<ShipPlan> {
    let initial_branch = repo.current_branch()?;
    let branch = branch.map(String::from).unwrap_or_else(|| initial_branch.clone());
    if branch == initial_branch {
        ensure_no_open_changes(&*repo, "Did you mean to commit them before shipping?")?;
    }
    let remote = uses_remote(&*repo, config)?;
    if remote {
        fetch(repo, ui)?;
    }
    if branch != initial_branch {
        ensure_has_branch(&*repo, &branch)?;
    }
    if config.is_main_or_perennial(&branch) {
        return Err(BranchlineError::precondition(format!(
            "The branch '{}' is not a feature branch. Only feature branches can be shipped.",
            branch
        )));
    }
    let hierarchy = ensure_knows_parents(repo, ui, config, std::slice::from_ref(&branch))?;
    ensure_parent_is_main_or_perennial(&hierarchy, &branch)?;

    Ok(ShipPlan {
        branch,
        initial_branch,
        hierarchy,
        remote,
    })
}

fn ensure_parent_is_main_or_perennial(hierarchy: &BranchHierarchy, branch: &str) -> Result<()> {
    let parent = hierarchy.parent_of(branch).unwrap_or(hierarchy.main_branch());
    if hierarchy.is_main_or_perennial(parent) {
        return Ok(());
    }
    let mut blocking: Vec<String> = hierarchy
        .ancestors_of(branch)
        .into_iter()
        .filter(|b| hierarchy.is_feature_branch(b))
        .collect();
    blocking.reverse();
    let oldest = blocking.first().cloned().unwrap_or_else(|| parent.to_string());
    Err(BranchlineError::precondition_with_hint(
        format!("Shipping this branch would ship {} as well.", blocking.join(", ")),
        format!("Please ship \"{}\" first.", oldest),
    ))
}

/// Steps that ship `plan.branch` into its parent.
pub fn ship_steps(
    repo: &dyn Repository,
    plan: &ShipPlan,
    message: Option<&str>,
) -> Result<StepList> {
    let hierarchy = &plan.hierarchy;
    let branch = plan.branch.as_str();
    let parent = hierarchy
        .parent_of(branch)
        .unwrap_or(hierarchy.main_branch())
        .to_string();
    let shipping_initial = branch == plan.initial_branch;

    let mut steps = sync_branch_steps(repo, hierarchy, &parent, plan.remote)?;
    steps.append(Step::CheckoutBranch {
        branch: branch.to_string(),
    });
    steps.append(Step::MergeTrackingBranch);
    steps.append(Step::MergeBranch {
        branch: parent.clone(),
    });
    steps.append(Step::EnsureHasShippableChanges {
        branch: branch.to_string(),
        target: parent.clone(),
    });
    steps.append(Step::CheckoutBranch {
        branch: parent.clone(),
    });
    steps.append(Step::SquashMergeBranch {
        branch: branch.to_string(),
        message: message.map(String::from),
    });
    if plan.remote {
        steps.append(Step::PushBranch {
            branch: parent.clone(),
            force: false,
            undoable: true,
        });
    }
    let children = hierarchy.children_of(branch);
    if plan.remote && repo.has_tracking_branch(branch)? && children.is_empty() {
        steps.append(Step::DeleteRemoteBranch {
            branch: branch.to_string(),
            is_tracking: true,
        });
    }
    steps.append(Step::DeleteLocalBranch {
        branch: branch.to_string(),
        force: true,
    });
    steps.append(Step::DeleteParentBranch {
        branch: branch.to_string(),
    });
    for child in children {
        steps.append(Step::SetParentBranch {
            branch: child,
            parent: parent.clone(),
        });
    }
    steps.append(Step::DeleteAncestorBranches);
    if !shipping_initial {
        steps.append(Step::CheckoutBranch {
            branch: plan.initial_branch.clone(),
        });
    }
    steps.wrap(
        WrapOptions {
            run_in_repo_root: true,
            stash_open_changes: !shipping_initial,
        },
        repo,
    )?;
    Ok(steps)
}
