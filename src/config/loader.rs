//! Configuration discovery and loading.
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Built-in defaults (`main`, remote `origin`, online)
//! 2. `.branchline.yml` in the repository root
//! 3. Git configuration (`branchline.main-branch`, `branchline.perennial-branches`,
//!    `branchline.remote`, `branchline.offline`)
//! 4. `BRANCHLINE_OFFLINE` in the environment

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::schema::{ConfigFile, RepoConfig, CONFIG_FILE_NAME};
use crate::error::{BranchlineError, Result};
use crate::git::Repository;

/// Git configuration key for the main branch.
pub const MAIN_BRANCH_KEY: &str = "branchline.main-branch";

/// Git configuration key for the space-separated perennial branches.
pub const PERENNIAL_BRANCHES_KEY: &str = "branchline.perennial-branches";

/// Git configuration key for the remote name.
pub const REMOTE_KEY: &str = "branchline.remote";

/// Git configuration key for offline mode.
pub const OFFLINE_KEY: &str = "branchline.offline";

/// Environment variable forcing offline mode.
pub const OFFLINE_ENV: &str = "BRANCHLINE_OFFLINE";

/// Load `.branchline.yml` from `root`, if present.
///
/// # Errors
///
/// Returns `ConfigParseError` if the file exists but is not valid.
pub fn load_config_file(root: &Path) -> Result<Option<ConfigFile>> {
    let path = root.join(CONFIG_FILE_NAME);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BranchlineError::Io(e)),
    };
    if content.trim().is_empty() {
        return Ok(Some(ConfigFile::default()));
    }
    serde_yaml::from_str(&content)
        .map(Some)
        .map_err(|e| BranchlineError::ConfigParseError {
            path,
            message: e.to_string(),
        })
}

/// Resolve the configuration for `repo` using the process environment.
pub fn load_repo_config(repo: &dyn Repository) -> Result<RepoConfig> {
    load_repo_config_with_env(repo, |key| std::env::var(key).ok())
}

/// Resolve the configuration for `repo` with an explicit environment lookup.
pub fn load_repo_config_with_env<F>(repo: &dyn Repository, env: F) -> Result<RepoConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = RepoConfig::default();

    let root = repo.root_directory()?;
    if let Some(file) = load_config_file(&root)? {
        debug!("Loaded {}", root.join(CONFIG_FILE_NAME).display());
        config.apply_file(file);
    }

    if let Some(main) = repo.config_value(MAIN_BRANCH_KEY)? {
        config.main_branch = main;
    }
    if let Some(perennials) = repo.config_value(PERENNIAL_BRANCHES_KEY)? {
        config.perennial_branches = perennials.split_whitespace().map(String::from).collect();
    }
    if let Some(remote) = repo.config_value(REMOTE_KEY)? {
        config.remote = remote;
    }
    if let Some(offline) = repo.config_value(OFFLINE_KEY)? {
        config.offline = parse_bool(&offline);
    }
    if let Some(offline) = env(OFFLINE_ENV) {
        config.offline = parse_bool(&offline);
    }

    debug!(
        main = %config.main_branch,
        perennials = ?config.perennial_branches,
        remote = %config.remote,
        offline = config.offline,
        "Resolved repository configuration"
    );
    Ok(config)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
