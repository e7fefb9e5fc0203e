//! Integration tests for the branchline binary against real git repositories.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn commit_file(dir: &Path, file: &str, content: &str, message: &str) {
    fs::write(dir.join(file), content).unwrap();
    git(dir, &["add", file]);
    git(dir, &["commit", "-q", "-m", message]);
}

/// A repository with one commit on `main` and no remote.
fn setup_repo() -> TempDir {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    git(dir, &["init", "-q"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(dir, &["config", "user.name", "Branchline Test"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    commit_file(dir, "README.md", "hello\n", "Initial commit");
    temp
}

/// `feature` branched off `main`, both changing `file.txt` differently.
fn setup_conflicting_feature() -> TempDir {
    let temp = setup_repo();
    let dir = temp.path();
    commit_file(dir, "file.txt", "base\n", "Add file");
    git(dir, &["checkout", "-q", "-b", "feature"]);
    git(dir, &["config", "branchline-branch.feature.parent", "main"]);
    commit_file(dir, "file.txt", "feature\n", "Feature change");
    git(dir, &["checkout", "-q", "main"]);
    commit_file(dir, "file.txt", "main\n", "Main change");
    git(dir, &["checkout", "-q", "feature"]);
    temp
}

fn branchline(dir: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin("branchline"));
    cmd.current_dir(dir);
    cmd.arg("--non-interactive");
    cmd
}

fn current_branch(dir: &Path) -> String {
    git(dir, &["rev-parse", "--abbrev-ref", "HEAD"])
}

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("branchline"));
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Resumable branch workflows"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("branchline"));
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_requires_subcommand() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("branchline"));
    cmd.assert().failure().code(2);
    Ok(())
}

#[test]
fn cli_rejects_conflicting_recovery_flags() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_repo();
    let mut cmd = branchline(temp.path());
    cmd.args(["sync", "--abort", "--continue"]);
    cmd.assert().failure().code(2);
    Ok(())
}

#[test]
fn cli_outside_repository_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let mut cmd = branchline(temp.path());
    cmd.arg("status");
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("This is not a git repository"));
    Ok(())
}

#[test]
fn cli_status_without_run() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_repo();
    let mut cmd = branchline(temp.path());
    cmd.arg("status");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No branchline run recorded"));
    Ok(())
}

#[test]
fn cli_continue_without_run_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_repo();
    let mut cmd = branchline(temp.path());
    cmd.args(["sync", "--continue"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to continue"));
    Ok(())
}

#[test]
fn cli_hack_creates_feature_branch() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_repo();
    let dir = temp.path();

    let mut cmd = branchline(dir);
    cmd.args(["hack", "login"]);
    cmd.assert().success();

    assert_eq!(current_branch(dir), "login");
    assert_eq!(
        git(dir, &["config", "--get", "branchline-branch.login.parent"]),
        "main"
    );

    let mut status = branchline(dir);
    status.arg("status");
    status
        .assert()
        .success()
        .stdout(predicate::str::contains("Last run: hack"));
    Ok(())
}

#[test]
fn cli_hack_undo_removes_branch() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_repo();
    let dir = temp.path();
    branchline(dir).args(["hack", "login"]).assert().success();

    branchline(dir).args(["hack", "--undo"]).assert().success();

    assert_eq!(current_branch(dir), "main");
    assert_eq!(git(dir, &["branch", "--list", "login"]), "");
    Ok(())
}

#[test]
fn cli_hack_existing_branch_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_repo();
    git(temp.path(), &["branch", "login"]);

    let mut cmd = branchline(temp.path());
    cmd.args(["hack", "login"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    Ok(())
}

#[test]
fn cli_ship_squashes_into_main() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_repo();
    let dir = temp.path();
    git(dir, &["checkout", "-q", "-b", "feature"]);
    git(dir, &["config", "branchline-branch.feature.parent", "main"]);
    commit_file(dir, "feature.txt", "feature\n", "Feature work");

    let mut cmd = branchline(dir);
    cmd.args(["ship", "-m", "Add the feature"]);
    cmd.assert().success();

    assert_eq!(current_branch(dir), "main");
    assert_eq!(git(dir, &["log", "-1", "--format=%s"]), "Add the feature");
    assert!(dir.join("feature.txt").exists());
    assert_eq!(git(dir, &["branch", "--list", "feature"]), "");
    Ok(())
}

#[test]
fn cli_ship_main_branch_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_repo();
    let mut cmd = branchline(temp.path());
    cmd.args(["ship", "-m", "Nope"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Only feature branches can be shipped"));
    Ok(())
}

#[test]
fn cli_sync_conflict_then_abort() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_conflicting_feature();
    let dir = temp.path();
    let feature_before = git(dir, &["rev-parse", "feature"]);

    let mut sync = branchline(dir);
    sync.arg("sync");
    sync.assert()
        .failure()
        .stderr(predicate::str::contains("conflicts"))
        .stderr(predicate::str::contains("branchline sync --abort"));

    let mut status = branchline(dir);
    status.arg("status");
    status
        .assert()
        .success()
        .stdout(predicate::str::contains("Remaining steps"));

    let mut abort = branchline(dir);
    abort.args(["sync", "--abort"]);
    abort.assert().success();

    assert_eq!(current_branch(dir), "feature");
    assert_eq!(git(dir, &["rev-parse", "feature"]), feature_before);
    assert_eq!(git(dir, &["status", "--porcelain"]), "");
    Ok(())
}

#[test]
fn cli_sync_continue_after_resolving() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_conflicting_feature();
    let dir = temp.path();
    branchline(dir).arg("sync").assert().failure();

    let mut early = branchline(dir);
    early.args(["sync", "--continue"]);
    early
        .assert()
        .failure()
        .stderr(predicate::str::contains("resolve the conflicts"));

    fs::write(dir.join("file.txt"), "resolved\n")?;
    git(dir, &["add", "file.txt"]);

    branchline(dir).args(["sync", "--continue"]).assert().success();

    assert_eq!(current_branch(dir), "feature");
    assert_eq!(fs::read_to_string(dir.join("file.txt"))?, "resolved\n");
    let merged = git(dir, &["branch", "--merged", "feature", "--list", "main"]);
    assert!(merged.contains("main"));
    Ok(())
}

#[test]
fn cli_completions_for_bash() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("branchline"));
    cmd.args(["completions", "bash"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("branchline"));
    Ok(())
}
