//! Building blocks shared by the workflow commands.

use std::path::Path;

use tracing::debug;

use crate::config::{load_repo_config, RepoConfig};
use crate::error::{BranchlineError, Result};
use crate::git::{GitRepository, Repository};
use crate::hierarchy::{parent_key, BranchHierarchy};
use crate::runner::{RunMode, RunOptions, Runner};
use crate::state::RunStateStore;
use crate::steps::{Step, StepList};
use crate::ui::{Prompt, PromptOption, UserInterface};

/// Open the repository containing `workdir` and read its configuration.
pub fn open_repository(workdir: &Path) -> Result<(GitRepository, RepoConfig)> {
    let repo = GitRepository::open(workdir)?;
    let config = load_repo_config(&repo)?;
    let repo = repo.with_remote(config.remote.clone());
    Ok((repo, config))
}

/// Execute `options` against the run state of `repo`.
pub fn run_workflow(
    repo: &mut dyn Repository,
    ui: &mut dyn UserInterface,
    options: RunOptions<'_>,
) -> Result<()> {
    let store = RunStateStore::for_repository(&*repo)?;
    let command = options.command.clone();
    let mode = options.mode;
    Runner::new(repo, &store, ui).run(options)?;
    match mode {
        RunMode::Abort => ui.success(&format!("Aborted '{}'", command)),
        RunMode::Undo => ui.success(&format!("Undid '{}'", command)),
        _ => {}
    }
    Ok(())
}

/// Whether workflows should talk to the remote.
pub fn uses_remote(repo: &dyn Repository, config: &RepoConfig) -> Result<bool> {
    Ok(!config.offline && repo.has_remote(&config.remote)?)
}

/// Fetch from the remote behind a spinner.
pub fn fetch(repo: &mut dyn Repository, ui: &mut dyn UserInterface) -> Result<()> {
    let mut spinner = ui.start_spinner("Fetching updates");
    match repo.fetch() {
        Ok(()) => {
            spinner.finish_success("Fetched updates");
            Ok(())
        }
        Err(e) => {
            spinner.finish_error("Fetching updates failed");
            Err(e)
        }
    }
}

/// Fail when the working tree has uncommitted changes.
pub fn ensure_no_open_changes(repo: &dyn Repository, hint: &str) -> Result<()> {
    if repo.has_open_changes()? {
        return Err(BranchlineError::precondition_with_hint(
            "You have uncommitted changes.",
            hint,
        ));
    }
    Ok(())
}

/// Fail unless a local branch named `branch` exists.
pub fn ensure_has_branch(repo: &dyn Repository, branch: &str) -> Result<()> {
    if !repo.has_local_branch(branch)? {
        return Err(BranchlineError::precondition(format!(
            "There is no branch named '{}'",
            branch
        )));
    }
    Ok(())
}

/// Fail if a local branch named `branch` exists.
pub fn ensure_no_branch(repo: &dyn Repository, branch: &str) -> Result<()> {
    if repo.has_local_branch(branch)? {
        return Err(BranchlineError::precondition(format!(
            "A branch named '{}' already exists",
            branch
        )));
    }
    Ok(())
}

/// Make sure every branch in `branches` and all of their ancestors have a
/// recorded parent, asking the user for missing ones.
///
/// Answers are written straight to the repository configuration. Returns
/// the hierarchy including the new links.
pub fn ensure_knows_parents(
    repo: &mut dyn Repository,
    ui: &mut dyn UserInterface,
    config: &RepoConfig,
    branches: &[String],
) -> Result<BranchHierarchy> {
    let mut hierarchy = BranchHierarchy::load(&*repo, config)?;
    for branch in branches {
        let mut current = branch.clone();
        while !hierarchy.knows_parent(&current) {
            let parent = ask_for_parent(&*repo, ui, config, &current)?;
            if hierarchy.ancestors_of(&parent).contains(&current) {
                return Err(BranchlineError::precondition(format!(
                    "'{}' cannot be the parent of '{}' because it descends from it",
                    parent, current
                )));
            }
            debug!(branch = %current, parent = %parent, "Recording parent branch");
            repo.set_config(&parent_key(&current), &parent)?;
            hierarchy = BranchHierarchy::load(&*repo, config)?;
            current = parent;
        }
    }
    Ok(hierarchy)
}

fn ask_for_parent(
    repo: &dyn Repository,
    ui: &mut dyn UserInterface,
    config: &RepoConfig,
    branch: &str,
) -> Result<String> {
    let options = repo
        .local_branches()?
        .into_iter()
        .filter(|b| b != branch)
        .map(PromptOption::plain)
        .collect();
    let prompt = Prompt {
        key: format!("parent.{}", branch),
        question: format!("Please specify the parent branch of '{}'", branch),
        options,
        default: Some(config.main_branch.clone()),
    };
    let parent = ui.prompt(&prompt)?;
    if parent == branch {
        return Err(BranchlineError::precondition(format!(
            "'{}' cannot be its own parent",
            branch
        )));
    }
    Ok(parent)
}

/// Steps that bring `branch` up to date with its tracking branch and parent,
/// then publish it.
pub fn sync_branch_steps(
    repo: &dyn Repository,
    hierarchy: &BranchHierarchy,
    branch: &str,
    remote: bool,
) -> Result<StepList> {
    let mut steps = StepList::new();
    steps.append(Step::CheckoutBranch {
        branch: branch.to_string(),
    });
    if hierarchy.is_feature_branch(branch) {
        let parent = hierarchy
            .parent_of(branch)
            .unwrap_or(hierarchy.main_branch())
            .to_string();
        steps.append(Step::MergeTrackingBranch);
        steps.append(Step::MergeBranch { branch: parent });
    } else {
        steps.append(Step::RebaseTrackingBranch);
    }
    if remote {
        if repo.has_tracking_branch(branch)? {
            steps.append(Step::PushBranch {
                branch: branch.to_string(),
                force: false,
                undoable: false,
            });
        } else {
            steps.append(Step::CreateTrackingBranch {
                branch: branch.to_string(),
            });
        }
    }
    Ok(steps)
}
