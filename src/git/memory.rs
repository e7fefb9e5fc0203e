//! In-memory repository driver for tests.
//!
//! `MemoryRepository` models just enough of git for the workflow engine:
//! branches point at commits, a commit is the set of changes it contains,
//! merges take the union of two sets. Conflicts and hard failures are
//! injected explicitly.
//!
//! # Example
//!
//! ```
//! use branchline::git::{MemoryRepository, Repository};
//!
//! let mut repo = MemoryRepository::new("main");
//! repo.add_feature_branch("feature", "main");
//! repo.commit("feature", "login form");
//!
//! assert!(repo.has_shippable_changes("feature", "main").unwrap());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::{BranchlineError, Result};
use crate::hierarchy::parent_key;

use super::{Repository, DEFAULT_REMOTE};

type Changes = BTreeSet<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Merge { changes: Changes },
    Rebase { changes: Changes },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StashEntry {
    own: bool,
    changes: Changes,
}

/// In-memory [`Repository`] implementation.
#[derive(Debug, Clone)]
pub struct MemoryRepository {
    root: PathBuf,
    workdir: PathBuf,
    current: String,
    branches: BTreeMap<String, String>,
    commits: BTreeMap<String, Changes>,
    remote_name: String,
    has_remote: bool,
    remote_branches: BTreeMap<String, String>,
    config: BTreeMap<String, String>,
    open_changes: Changes,
    stashes: Vec<StashEntry>,
    conflicts: BTreeSet<(String, String)>,
    pending: Option<Pending>,
    unresolved: bool,
    failures: BTreeMap<String, String>,
    operations: Vec<String>,
    next_commit: usize,
}

impl MemoryRepository {
    /// Create a repository with one commit on `main_branch`, checked out.
    pub fn new(main_branch: &str) -> Self {
        let mut repo = Self {
            root: PathBuf::from("/repo"),
            workdir: PathBuf::from("/repo"),
            current: main_branch.to_string(),
            branches: BTreeMap::new(),
            commits: BTreeMap::new(),
            remote_name: DEFAULT_REMOTE.to_string(),
            has_remote: false,
            remote_branches: BTreeMap::new(),
            config: BTreeMap::new(),
            open_changes: Changes::new(),
            stashes: Vec::new(),
            conflicts: BTreeSet::new(),
            pending: None,
            unresolved: false,
            failures: BTreeMap::new(),
            operations: Vec::new(),
            next_commit: 0,
        };
        let sha = repo.new_commit(Changes::new());
        repo.branches.insert(main_branch.to_string(), sha);
        repo
    }

    /// Add a remote and publish every existing branch to it.
    pub fn with_remote(mut self) -> Self {
        self.has_remote = true;
        self.remote_branches = self.branches.clone();
        self
    }

    /// Use different root and working directories.
    pub fn with_directories(mut self, root: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self.workdir = workdir.into();
        self
    }

    // --- Scenario setup ---

    /// Create a branch at `parent`'s commit and record `parent` in the hierarchy.
    pub fn add_feature_branch(&mut self, name: &str, parent: &str) {
        let sha = self.branches.get(parent).cloned().unwrap_or_default();
        self.branches.insert(name.to_string(), sha);
        self.config.insert(parent_key(name), parent.to_string());
    }

    /// Create a branch at `starting_point`'s commit without a parent link.
    pub fn add_branch(&mut self, name: &str, starting_point: &str) {
        let sha = self.branches.get(starting_point).cloned().unwrap_or_default();
        self.branches.insert(name.to_string(), sha);
    }

    /// Commit `change` directly onto `branch`.
    pub fn commit(&mut self, branch: &str, change: &str) -> String {
        let mut changes = self.changes_of_branch(branch);
        changes.insert(change.to_string());
        let sha = self.new_commit(changes);
        self.branches.insert(branch.to_string(), sha.clone());
        sha
    }

    /// Commit `change` onto the remote copy of `branch`, as a coworker would.
    pub fn commit_on_remote(&mut self, branch: &str, change: &str) -> String {
        let mut changes = self
            .remote_branches
            .get(branch)
            .and_then(|sha| self.commits.get(sha))
            .cloned()
            .unwrap_or_default();
        changes.insert(change.to_string());
        let sha = self.new_commit(changes);
        self.remote_branches.insert(branch.to_string(), sha.clone());
        sha
    }

    /// Publish a local branch to the remote without going through a step.
    pub fn publish(&mut self, branch: &str) {
        if let Some(sha) = self.branches.get(branch).cloned() {
            self.remote_branches.insert(branch.to_string(), sha);
        }
    }

    /// Add an uncommitted change to the working tree.
    pub fn add_open_change(&mut self, change: &str) {
        self.open_changes.insert(change.to_string());
    }

    /// Make merging (or rebasing) `from` into `into` conflict.
    pub fn add_conflict(&mut self, into: &str, from: &str) {
        self.conflicts
            .insert((into.to_string(), from.to_string()));
    }

    /// Mark the conflicts of the operation in progress as resolved.
    pub fn resolve_conflicts(&mut self) {
        self.unresolved = false;
    }

    /// Make every call of `operation` (e.g. `"push"`) fail with `message`.
    pub fn fail_on(&mut self, operation: &str, message: &str) {
        self.failures
            .insert(operation.to_string(), message.to_string());
    }

    /// Stop injecting failures for `operation`.
    pub fn clear_failure(&mut self, operation: &str) {
        self.failures.remove(operation);
    }

    /// Push a stash entry that branchline did not create, holding `file`.
    pub fn add_foreign_stash(&mut self, file: &str) {
        let mut changes = Changes::new();
        changes.insert(file.to_string());
        self.stashes.push(StashEntry {
            own: false,
            changes,
        });
    }

    // --- Inspection ---

    /// Mutations performed so far, in order.
    pub fn operations(&self) -> &[String] {
        &self.operations
    }

    /// Changes contained in a local branch.
    pub fn changes_of_branch(&self, branch: &str) -> Changes {
        self.branches
            .get(branch)
            .and_then(|sha| self.commits.get(sha))
            .cloned()
            .unwrap_or_default()
    }

    /// Commit of the remote copy of `branch`.
    pub fn remote_branch(&self, branch: &str) -> Option<&str> {
        self.remote_branches.get(branch).map(String::as_str)
    }

    /// Uncommitted changes in the working tree.
    pub fn open_changes(&self) -> &Changes {
        &self.open_changes
    }

    /// Number of stash entries.
    pub fn stash_count(&self) -> usize {
        self.stashes.len()
    }

    // --- Internals ---

    fn new_commit(&mut self, changes: Changes) -> String {
        self.next_commit += 1;
        let sha = format!("{:07x}", 0x100000 + self.next_commit);
        self.commits.insert(sha.clone(), changes);
        sha
    }

    fn record(&mut self, operation: &str, detail: String) -> Result<()> {
        if let Some(message) = self.failures.get(operation) {
            return Err(BranchlineError::GitFailed {
                command: detail,
                code: Some(1),
                stderr: message.clone(),
            });
        }
        self.operations.push(detail);
        Ok(())
    }

    fn fail(command: String, stderr: &str) -> BranchlineError {
        BranchlineError::GitFailed {
            command,
            code: Some(1),
            stderr: stderr.to_string(),
        }
    }

    fn resolve(&self, reference: &str) -> Option<String> {
        let remote_prefix = format!("{}/", self.remote_name);
        if let Some(branch) = reference.strip_prefix(&remote_prefix) {
            if let Some(sha) = self.remote_branches.get(branch) {
                return Some(sha.clone());
            }
        }
        if let Some(sha) = self.branches.get(reference) {
            return Some(sha.clone());
        }
        self.commits.contains_key(reference).then(|| reference.to_string())
    }

    fn changes_of(&self, reference: &str) -> Option<Changes> {
        let sha = self.resolve(reference)?;
        self.commits.get(&sha).cloned()
    }

    fn current_changes(&self) -> Changes {
        self.changes_of_branch(&self.current)
    }

    fn move_current(&mut self, changes: Changes) {
        let sha = self.new_commit(changes);
        self.branches.insert(self.current.clone(), sha);
    }

    fn ensure_clean_index(&self, command: &str) -> Result<()> {
        if self.unresolved {
            return Err(Self::fail(
                command.to_string(),
                "you need to resolve your current index first",
            ));
        }
        Ok(())
    }

    /// Shared merge/rebase logic; `rebase` only changes the pending marker.
    fn integrate(&mut self, reference: &str, rebase: bool) -> Result<()> {
        let verb = if rebase { "rebase" } else { "merge" };
        let command = format!("{} {}", verb, reference);
        self.ensure_clean_index(&command)?;
        let incoming = self
            .changes_of(reference)
            .ok_or_else(|| Self::fail(command.clone(), "not something we can merge"))?;
        let current = self.current_changes();
        if incoming.is_subset(&current) {
            return Ok(());
        }
        if self
            .conflicts
            .contains(&(self.current.clone(), reference.to_string()))
        {
            self.pending = Some(if rebase {
                Pending::Rebase { changes: incoming }
            } else {
                Pending::Merge { changes: incoming }
            });
            self.unresolved = true;
            return Err(BranchlineError::Conflict {
                operation: command,
                message: "CONFLICT (content): automatic merge failed".to_string(),
            });
        }
        self.move_current(current.union(&incoming).cloned().collect());
        Ok(())
    }
}

impl Repository for MemoryRepository {
    fn root_directory(&self) -> Result<PathBuf> {
        Ok(self.root.clone())
    }

    fn working_directory(&self) -> Result<PathBuf> {
        Ok(self.workdir.clone())
    }

    fn state_directory(&self) -> Result<PathBuf> {
        Ok(self.root.join(".git").join("branchline"))
    }

    fn remote_name(&self) -> &str {
        &self.remote_name
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.current.clone())
    }

    fn current_sha(&self) -> Result<String> {
        self.branch_sha(&self.current)
    }

    fn branch_sha(&self, branch: &str) -> Result<String> {
        self.branches
            .get(branch)
            .cloned()
            .ok_or_else(|| Self::fail(format!("rev-parse {}", branch), "unknown revision"))
    }

    fn remote_branch_sha(&self, branch: &str) -> Result<Option<String>> {
        Ok(self.remote_branches.get(branch).cloned())
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        Ok(self.branches.keys().cloned().collect())
    }

    fn has_remote(&self, remote: &str) -> Result<bool> {
        Ok(self.has_remote && remote == self.remote_name)
    }

    fn has_open_changes(&self) -> Result<bool> {
        Ok(!self.open_changes.is_empty() || self.unresolved)
    }

    fn has_own_stash(&self) -> Result<bool> {
        Ok(self.stashes.last().is_some_and(|entry| entry.own))
    }

    fn has_conflicts(&self) -> Result<bool> {
        Ok(self.unresolved)
    }

    fn is_merge_in_progress(&self) -> Result<bool> {
        Ok(matches!(self.pending, Some(Pending::Merge { .. })))
    }

    fn is_rebase_in_progress(&self) -> Result<bool> {
        Ok(matches!(self.pending, Some(Pending::Rebase { .. })))
    }

    fn has_shippable_changes(&self, branch: &str, target: &str) -> Result<bool> {
        let branch_changes = self.changes_of_branch(branch);
        let target_changes = self.changes_of_branch(target);
        Ok(branch_changes != target_changes)
    }

    fn config_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.config.get(key).cloned())
    }

    fn config_entries(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .config
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn change_directory(&mut self, directory: &Path) -> Result<()> {
        self.record("cd", format!("cd {}", directory.display()))?;
        self.workdir = directory.to_path_buf();
        Ok(())
    }

    fn fetch(&mut self) -> Result<()> {
        self.record("fetch", "fetch".to_string())
    }

    fn checkout(&mut self, branch: &str) -> Result<()> {
        let command = format!("checkout {}", branch);
        self.record("checkout", command.clone())?;
        self.ensure_clean_index(&command)?;
        if !self.branches.contains_key(branch) {
            return Err(Self::fail(command, "pathspec did not match"));
        }
        self.current = branch.to_string();
        Ok(())
    }

    fn create_branch(&mut self, branch: &str, starting_point: &str) -> Result<()> {
        let command = format!("branch {} {}", branch, starting_point);
        self.record("branch", command.clone())?;
        if self.branches.contains_key(branch) {
            return Err(Self::fail(command, "branch already exists"));
        }
        let sha = self
            .resolve(starting_point)
            .ok_or_else(|| Self::fail(command.clone(), "not a valid object name"))?;
        self.branches.insert(branch.to_string(), sha);
        Ok(())
    }

    fn delete_local_branch(&mut self, branch: &str, force: bool) -> Result<()> {
        let flag = if force { "-D" } else { "-d" };
        let command = format!("branch {} {}", flag, branch);
        self.record("delete-branch", command.clone())?;
        if self.current == branch {
            return Err(Self::fail(command, "cannot delete the checked out branch"));
        }
        if self.branches.remove(branch).is_none() {
            return Err(Self::fail(command, "branch not found"));
        }
        Ok(())
    }

    fn delete_remote_branch(&mut self, branch: &str) -> Result<()> {
        let command = format!("push {} :{}", self.remote_name, branch);
        self.record("push", command.clone())?;
        if self.remote_branches.remove(branch).is_none() {
            return Err(Self::fail(command, "remote ref does not exist"));
        }
        Ok(())
    }

    fn merge(&mut self, reference: &str) -> Result<()> {
        self.record("merge", format!("merge {}", reference))?;
        self.integrate(reference, false)
    }

    fn abort_merge(&mut self) -> Result<()> {
        self.record("merge", "merge --abort".to_string())?;
        if !matches!(self.pending, Some(Pending::Merge { .. })) {
            return Err(Self::fail(
                "merge --abort".to_string(),
                "There is no merge to abort",
            ));
        }
        self.pending = None;
        self.unresolved = false;
        Ok(())
    }

    fn continue_merge(&mut self) -> Result<()> {
        if let Some(Pending::Merge { changes }) = self.pending.clone() {
            self.record("commit", "commit --no-edit".to_string())?;
            self.ensure_clean_index("commit --no-edit")?;
            let merged = self.current_changes().union(&changes).cloned().collect();
            self.move_current(merged);
            self.pending = None;
        }
        Ok(())
    }

    fn rebase(&mut self, reference: &str) -> Result<()> {
        self.record("rebase", format!("rebase {}", reference))?;
        self.integrate(reference, true)
    }

    fn abort_rebase(&mut self) -> Result<()> {
        self.record("rebase", "rebase --abort".to_string())?;
        self.pending = None;
        self.unresolved = false;
        Ok(())
    }

    fn continue_rebase(&mut self) -> Result<()> {
        if let Some(Pending::Rebase { changes }) = self.pending.clone() {
            self.record("rebase", "rebase --continue".to_string())?;
            self.ensure_clean_index("rebase --continue")?;
            let rebased = self.current_changes().union(&changes).cloned().collect();
            self.move_current(rebased);
            self.pending = None;
        }
        Ok(())
    }

    fn squash_merge(&mut self, branch: &str, message: Option<&str>) -> Result<()> {
        let command = format!("merge --squash {}", branch);
        self.record("squash-merge", command.clone())?;
        self.ensure_clean_index(&command)?;
        let incoming = self
            .changes_of(branch)
            .ok_or_else(|| Self::fail(command.clone(), "not something we can merge"))?;
        let current = self.current_changes();
        if incoming.is_subset(&current) {
            return Err(Self::fail("commit".to_string(), "nothing to commit"));
        }
        if self
            .conflicts
            .contains(&(self.current.clone(), branch.to_string()))
        {
            self.pending = Some(Pending::Merge { changes: incoming });
            self.unresolved = true;
            return Err(BranchlineError::Conflict {
                operation: command,
                message: "CONFLICT (content): squash merge failed".to_string(),
            });
        }
        let summary = message.unwrap_or("squashed");
        self.operations.push(format!("commit -m {}", summary));
        self.move_current(current.union(&incoming).cloned().collect());
        Ok(())
    }

    fn commit_all(&mut self, message: &str) -> Result<()> {
        let command = format!("commit -m {}", message);
        self.record("commit", command.clone())?;
        self.ensure_clean_index(&command)?;
        let pending = match self.pending.take() {
            Some(Pending::Merge { changes }) | Some(Pending::Rebase { changes }) => changes,
            None => Changes::new(),
        };
        if pending.is_empty() && self.open_changes.is_empty() {
            return Err(Self::fail(command, "nothing to commit, working tree clean"));
        }
        let mut changes = self.current_changes();
        changes.extend(pending);
        changes.extend(std::mem::take(&mut self.open_changes));
        self.move_current(changes);
        Ok(())
    }

    fn discard_open_changes(&mut self) -> Result<()> {
        self.record("reset", "reset --hard".to_string())?;
        self.open_changes.clear();
        self.pending = None;
        self.unresolved = false;
        Ok(())
    }

    fn reset_to_sha(&mut self, sha: &str, hard: bool) -> Result<()> {
        let command = if hard {
            format!("reset --hard {}", sha)
        } else {
            format!("reset {}", sha)
        };
        self.record("reset", command.clone())?;
        let target = self
            .commits
            .get(sha)
            .cloned()
            .ok_or_else(|| Self::fail(command, "unknown revision"))?;
        if hard {
            self.open_changes.clear();
            self.pending = None;
            self.unresolved = false;
        } else {
            let current = self.current_changes();
            self.open_changes.extend(current.difference(&target).cloned());
        }
        self.branches.insert(self.current.clone(), sha.to_string());
        Ok(())
    }

    fn push(&mut self, branch: &str, force: bool) -> Result<()> {
        let command = format!("push {} {}", self.remote_name, branch);
        self.record("push", command.clone())?;
        let local = self.branch_sha(branch)?;
        if !force {
            if let Some(remote_sha) = self.remote_branches.get(branch) {
                let remote = self.commits.get(remote_sha).cloned().unwrap_or_default();
                let local_changes = self.commits.get(&local).cloned().unwrap_or_default();
                if !remote.is_subset(&local_changes) {
                    return Err(Self::fail(command, "rejected (non-fast-forward)"));
                }
            }
        }
        self.remote_branches.insert(branch.to_string(), local);
        Ok(())
    }

    fn push_sha(&mut self, sha: &str, branch: &str, force: bool) -> Result<()> {
        let flag = if force { " --force" } else { "" };
        let command = format!("push{} {} {}:refs/heads/{}", flag, self.remote_name, sha, branch);
        self.record("push", command.clone())?;
        if !self.commits.contains_key(sha) {
            return Err(Self::fail(command, "unknown revision"));
        }
        self.remote_branches
            .insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    fn create_tracking_branch(&mut self, branch: &str) -> Result<()> {
        let command = format!("push -u {} {}", self.remote_name, branch);
        self.record("push", command)?;
        let sha = self.branch_sha(branch)?;
        self.remote_branches.insert(branch.to_string(), sha);
        Ok(())
    }

    fn stash(&mut self) -> Result<()> {
        self.record("stash", "stash".to_string())?;
        let changes = std::mem::take(&mut self.open_changes);
        self.stashes.push(StashEntry { own: true, changes });
        Ok(())
    }

    fn pop_stash(&mut self) -> Result<()> {
        self.record("stash", "stash pop".to_string())?;
        let entry = self
            .stashes
            .pop()
            .ok_or_else(|| Self::fail("stash pop".to_string(), "No stash entries found."))?;
        self.open_changes.extend(entry.changes);
        Ok(())
    }

    fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        self.record("config", format!("config {} {}", key, value))?;
        self.config.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn unset_config(&mut self, key: &str) -> Result<()> {
        self.record("config", format!("config --unset {}", key))?;
        self.config.remove(key);
        Ok(())
    }
}
