//! Repository driver backed by the `git` executable.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{BranchlineError, Result};

use super::{Repository, DEFAULT_REMOTE, STASH_MESSAGE};

/// Output of one git invocation.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output, trimmed.
    pub stdout: String,

    /// Standard error, trimmed.
    pub stderr: String,

    /// Whether git exited with code 0.
    pub success: bool,
}

/// [`Repository`] implementation that runs `git` subprocesses.
#[derive(Debug, Clone)]
pub struct GitRepository {
    workdir: PathBuf,
    remote: String,
}

impl GitRepository {
    /// Open the repository containing `workdir`.
    ///
    /// # Errors
    ///
    /// Returns [`BranchlineError::NotARepository`] when `workdir` is not
    /// inside a git working tree.
    pub fn open(workdir: &Path) -> Result<Self> {
        let repo = Self {
            workdir: workdir.to_path_buf(),
            remote: DEFAULT_REMOTE.to_string(),
        };
        let output = repo.run_unchecked(&["rev-parse", "--is-inside-work-tree"])?;
        if !output.success || output.stdout != "true" {
            return Err(BranchlineError::NotARepository);
        }
        Ok(repo)
    }

    /// Use a remote other than `origin`.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Run git and return its output regardless of exit status.
    pub fn run_unchecked(&self, args: &[&str]) -> Result<GitOutput> {
        debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .output()
            .map_err(|_| BranchlineError::GitFailed {
                command: args.join(" "),
                code: None,
                stderr: "could not start git".to_string(),
            })?;

        Ok(GitOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            success: output.status.success(),
        })
    }

    /// Run git and fail on a non-zero exit code.
    pub fn run(&self, args: &[&str]) -> Result<GitOutput> {
        let output = self.run_unchecked(args)?;
        if output.success {
            Ok(output)
        } else {
            Err(failure(args, &output))
        }
    }

    /// Run git attached to the terminal, e.g. so the commit editor can open.
    fn run_attached(&self, args: &[&str]) -> Result<()> {
        debug!("git {} (attached)", args.join(" "));
        let status = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .status()
            .map_err(|_| BranchlineError::GitFailed {
                command: args.join(" "),
                code: None,
                stderr: "could not start git".to_string(),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(BranchlineError::GitFailed {
                command: args.join(" "),
                code: status.code(),
                stderr: String::new(),
            })
        }
    }

    /// Run a merge-like command, classifying failures as conflicts when the
    /// index ends up with unmerged paths.
    fn run_merging(&self, operation: &str, args: &[&str]) -> Result<()> {
        let output = self.run_unchecked(args)?;
        if output.success {
            return Ok(());
        }
        if self.has_conflicts()? {
            return Err(BranchlineError::Conflict {
                operation: operation.to_string(),
                message: first_line(&output.stdout, &output.stderr),
            });
        }
        Err(failure(args, &output))
    }

    fn git_dir(&self) -> Result<PathBuf> {
        let output = self.run(&["rev-parse", "--absolute-git-dir"])?;
        Ok(PathBuf::from(output.stdout))
    }

    fn lines(&self, args: &[&str]) -> Result<Vec<String>> {
        let output = self.run(args)?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

fn failure(args: &[&str], output: &GitOutput) -> BranchlineError {
    BranchlineError::GitFailed {
        command: args.join(" "),
        code: output.exit_code,
        stderr: first_line(&output.stderr, &output.stdout),
    }
}

fn first_line(preferred: &str, fallback: &str) -> String {
    let text = if preferred.is_empty() {
        fallback
    } else {
        preferred
    };
    text.lines().next().unwrap_or_default().to_string()
}

impl Repository for GitRepository {
    fn root_directory(&self) -> Result<PathBuf> {
        let output = self.run(&["rev-parse", "--show-toplevel"])?;
        Ok(PathBuf::from(output.stdout))
    }

    fn working_directory(&self) -> Result<PathBuf> {
        Ok(self.workdir.clone())
    }

    fn state_directory(&self) -> Result<PathBuf> {
        Ok(self.git_dir()?.join("branchline"))
    }

    fn remote_name(&self) -> &str {
        &self.remote
    }

    fn current_branch(&self) -> Result<String> {
        // HEAD is detached while a rebase is stopped; git records the branch
        // being rebased in its state directory.
        if self.is_rebase_in_progress()? {
            let git_dir = self.git_dir()?;
            for dir in ["rebase-merge", "rebase-apply"] {
                let head_name = git_dir.join(dir).join("head-name");
                if head_name.exists() {
                    let content = std::fs::read_to_string(head_name)?;
                    let name = content.trim();
                    return Ok(name.strip_prefix("refs/heads/").unwrap_or(name).to_string());
                }
            }
        }
        let output = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(output.stdout)
    }

    fn current_sha(&self) -> Result<String> {
        Ok(self.run(&["rev-parse", "HEAD"])?.stdout)
    }

    fn branch_sha(&self, branch: &str) -> Result<String> {
        let reference = format!("refs/heads/{}", branch);
        Ok(self.run(&["rev-parse", &reference])?.stdout)
    }

    fn remote_branch_sha(&self, branch: &str) -> Result<Option<String>> {
        let reference = format!("refs/remotes/{}/{}", self.remote, branch);
        let output = self.run_unchecked(&["rev-parse", "--verify", "--quiet", &reference])?;
        if output.success && !output.stdout.is_empty() {
            Ok(Some(output.stdout))
        } else {
            Ok(None)
        }
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        self.lines(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])
    }

    fn has_remote(&self, remote: &str) -> Result<bool> {
        Ok(self.lines(&["remote"])?.iter().any(|r| r == remote))
    }

    fn has_open_changes(&self) -> Result<bool> {
        Ok(!self.run(&["status", "--porcelain"])?.stdout.is_empty())
    }

    fn has_own_stash(&self) -> Result<bool> {
        let output = self.run(&["stash", "list", "-1", "--format=%s"])?;
        Ok(output.stdout.ends_with(STASH_MESSAGE))
    }

    fn has_conflicts(&self) -> Result<bool> {
        Ok(!self.run(&["ls-files", "--unmerged"])?.stdout.is_empty())
    }

    fn is_merge_in_progress(&self) -> Result<bool> {
        Ok(self.git_dir()?.join("MERGE_HEAD").exists())
    }

    fn is_rebase_in_progress(&self) -> Result<bool> {
        let git_dir = self.git_dir()?;
        Ok(git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists())
    }

    fn has_shippable_changes(&self, branch: &str, target: &str) -> Result<bool> {
        let output = self.run_unchecked(&["diff", "--quiet", target, branch])?;
        match output.exit_code {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(failure(&["diff", "--quiet", target, branch], &output)),
        }
    }

    fn config_value(&self, key: &str) -> Result<Option<String>> {
        let output = self.run_unchecked(&["config", "--get", key])?;
        match output.exit_code {
            Some(0) => Ok(Some(output.stdout)),
            Some(1) => Ok(None),
            _ => Err(failure(&["config", "--get", key], &output)),
        }
    }

    fn config_entries(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let pattern = format!("^{}", prefix.replace('.', "\\."));
        let output = self.run_unchecked(&["config", "--get-regexp", &pattern])?;
        match output.exit_code {
            Some(0) => Ok(output
                .stdout
                .lines()
                .filter_map(|line| {
                    let (key, value) = line.split_once(' ')?;
                    Some((key.to_string(), value.trim().to_string()))
                })
                .collect()),
            Some(1) => Ok(Vec::new()),
            _ => Err(failure(&["config", "--get-regexp", &pattern], &output)),
        }
    }

    fn change_directory(&mut self, directory: &Path) -> Result<()> {
        std::env::set_current_dir(directory)?;
        self.workdir = directory.to_path_buf();
        Ok(())
    }

    fn fetch(&mut self) -> Result<()> {
        let remote = self.remote.clone();
        self.run(&["fetch", "--prune", "--tags", &remote])?;
        Ok(())
    }

    fn checkout(&mut self, branch: &str) -> Result<()> {
        self.run(&["checkout", branch])?;
        Ok(())
    }

    fn create_branch(&mut self, branch: &str, starting_point: &str) -> Result<()> {
        self.run(&["branch", branch, starting_point])?;
        Ok(())
    }

    fn delete_local_branch(&mut self, branch: &str, force: bool) -> Result<()> {
        let flag = if force { "-D" } else { "-d" };
        self.run(&["branch", flag, branch])?;
        Ok(())
    }

    fn delete_remote_branch(&mut self, branch: &str) -> Result<()> {
        let remote = self.remote.clone();
        let refspec = format!(":{}", branch);
        self.run(&["push", &remote, &refspec])?;
        Ok(())
    }

    fn merge(&mut self, reference: &str) -> Result<()> {
        self.run_merging(
            &format!("git merge {}", reference),
            &["merge", "--no-edit", reference],
        )
    }

    fn abort_merge(&mut self) -> Result<()> {
        self.run(&["merge", "--abort"])?;
        Ok(())
    }

    fn continue_merge(&mut self) -> Result<()> {
        if self.is_merge_in_progress()? {
            self.run(&["commit", "--no-edit"])?;
        }
        Ok(())
    }

    fn rebase(&mut self, reference: &str) -> Result<()> {
        self.run_merging(&format!("git rebase {}", reference), &["rebase", reference])
    }

    fn abort_rebase(&mut self) -> Result<()> {
        self.run(&["rebase", "--abort"])?;
        Ok(())
    }

    fn continue_rebase(&mut self) -> Result<()> {
        if self.is_rebase_in_progress()? {
            self.run_merging(
                "git rebase --continue",
                &["-c", "core.editor=true", "rebase", "--continue"],
            )?;
        }
        Ok(())
    }

    fn squash_merge(&mut self, branch: &str, message: Option<&str>) -> Result<()> {
        self.run_merging(
            &format!("git merge --squash {}", branch),
            &["merge", "--squash", branch],
        )?;
        match message {
            Some(msg) => {
                self.run(&["commit", "-m", msg])?;
            }
            None => self.run_attached(&["commit"])?,
        }
        Ok(())
    }

    fn commit_all(&mut self, message: &str) -> Result<()> {
        self.run(&["add", "-A"])?;
        self.run(&["commit", "-m", message])?;
        Ok(())
    }

    fn discard_open_changes(&mut self) -> Result<()> {
        self.run(&["reset", "--hard"])?;
        Ok(())
    }

    fn reset_to_sha(&mut self, sha: &str, hard: bool) -> Result<()> {
        if hard {
            self.run(&["reset", "--hard", sha])?;
        } else {
            self.run(&["reset", sha])?;
        }
        Ok(())
    }

    fn push(&mut self, branch: &str, force: bool) -> Result<()> {
        let remote = self.remote.clone();
        if force {
            self.run(&["push", "--force-with-lease", &remote, branch])?;
        } else {
            self.run(&["push", &remote, branch])?;
        }
        Ok(())
    }

    fn push_sha(&mut self, sha: &str, branch: &str, force: bool) -> Result<()> {
        let remote = self.remote.clone();
        let refspec = format!("{}:refs/heads/{}", sha, branch);
        if force {
            self.run(&["push", "--force", &remote, &refspec])?;
        } else {
            self.run(&["push", &remote, &refspec])?;
        }
        Ok(())
    }

    fn create_tracking_branch(&mut self, branch: &str) -> Result<()> {
        let remote = self.remote.clone();
        self.run(&["push", "-u", &remote, branch])?;
        Ok(())
    }

    fn stash(&mut self) -> Result<()> {
        self.run(&["add", "-A"])?;
        self.run(&["stash", "push", "-m", STASH_MESSAGE])?;
        Ok(())
    }

    fn pop_stash(&mut self) -> Result<()> {
        self.run_merging("git stash pop", &["stash", "pop"])
    }

    fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        self.run(&["config", key, value])?;
        Ok(())
    }

    fn unset_config(&mut self, key: &str) -> Result<()> {
        let output = self.run_unchecked(&["config", "--unset", key])?;
        // exit code 5: key was not set
        match output.exit_code {
            Some(0) | Some(5) => Ok(()),
            _ => Err(failure(&["config", "--unset", key], &output)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .output()
            .unwrap();
        assert!(status.status.success(), "git {:?} failed", args);
    }

    fn init_repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        git(temp.path(), &["init", "--quiet"]);
        git(temp.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(temp.path(), &["config", "user.name", "Test"]);
        git(temp.path(), &["config", "user.email", "test@example.com"]);
        std::fs::write(temp.path().join("README.md"), "hello\n").unwrap();
        git(temp.path(), &["add", "README.md"]);
        git(temp.path(), &["commit", "--quiet", "-m", "initial"]);
        temp
    }

    #[test]
    fn open_rejects_plain_directory() {
        let temp = TempDir::new().unwrap();
        let result = GitRepository::open(temp.path());
        assert!(matches!(result, Err(BranchlineError::NotARepository)));
    }

    #[test]
    fn reads_current_branch_and_branches() {
        let temp = init_repo();
        let mut repo = GitRepository::open(temp.path()).unwrap();
        repo.create_branch("feature", "main").unwrap();

        assert_eq!(repo.current_branch().unwrap(), "main");
        assert_eq!(repo.local_branches().unwrap(), vec!["feature", "main"]);
        assert!(repo.has_local_branch("feature").unwrap());
        assert!(!repo.has_remote("origin").unwrap());
        assert!(!repo.has_tracking_branch("feature").unwrap());
    }

    #[test]
    fn config_roundtrip() {
        let temp = init_repo();
        let mut repo = GitRepository::open(temp.path()).unwrap();

        assert_eq!(repo.config_value("branchline-branch.feature.parent").unwrap(), None);
        repo.set_config("branchline-branch.feature.parent", "main")
            .unwrap();
        assert_eq!(
            repo.config_value("branchline-branch.feature.parent").unwrap(),
            Some("main".to_string())
        );
        assert_eq!(
            repo.config_entries("branchline-branch.").unwrap(),
            vec![(
                "branchline-branch.feature.parent".to_string(),
                "main".to_string()
            )]
        );
        repo.unset_config("branchline-branch.feature.parent").unwrap();
        repo.unset_config("branchline-branch.feature.parent").unwrap();
        assert!(repo.config_entries("branchline-branch.").unwrap().is_empty());
    }

    #[test]
    fn detects_open_changes() {
        let temp = init_repo();
        let repo = GitRepository::open(temp.path()).unwrap();
        assert!(!repo.has_open_changes().unwrap());

        std::fs::write(temp.path().join("new.txt"), "x").unwrap();
        assert!(repo.has_open_changes().unwrap());
    }

    #[test]
    fn shippable_changes_compare_trees() {
        let temp = init_repo();
        let mut repo = GitRepository::open(temp.path()).unwrap();
        repo.create_branch("feature", "main").unwrap();
        assert!(!repo.has_shippable_changes("feature", "main").unwrap());

        repo.checkout("feature").unwrap();
        std::fs::write(temp.path().join("feature.txt"), "x").unwrap();
        repo.commit_all("add feature").unwrap();
        assert!(repo.has_shippable_changes("feature", "main").unwrap());
    }

    #[test]
    fn conflicting_merge_is_reported_as_conflict() {
        let temp = init_repo();
        let mut repo = GitRepository::open(temp.path()).unwrap();
        repo.create_branch("feature", "main").unwrap();

        std::fs::write(temp.path().join("README.md"), "main\n").unwrap();
        repo.commit_all("main change").unwrap();
        repo.checkout("feature").unwrap();
        std::fs::write(temp.path().join("README.md"), "feature\n").unwrap();
        repo.commit_all("feature change").unwrap();

        let err = repo.merge("main").unwrap_err();
        assert!(err.is_conflict());
        assert!(repo.is_merge_in_progress().unwrap());

        repo.abort_merge().unwrap();
        assert!(!repo.is_merge_in_progress().unwrap());
        assert!(!repo.has_conflicts().unwrap());
    }

    #[test]
    fn checkout_of_missing_branch_fails() {
        let temp = init_repo();
        let mut repo = GitRepository::open(temp.path()).unwrap();
        let err = repo.checkout("nope").unwrap_err();
        assert!(matches!(err, BranchlineError::GitFailed { .. }));
    }
}
