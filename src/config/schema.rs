//! Configuration schema definitions for branchline.
//!
//! [`ConfigFile`] maps to the optional `.branchline.yml` file in the
//! repository root. [`RepoConfig`] is the resolved configuration after git
//! configuration and environment overrides have been applied.

use serde::{Deserialize, Serialize};

use crate::git::DEFAULT_REMOTE;

/// Name of the configuration file in the repository root.
pub const CONFIG_FILE_NAME: &str = ".branchline.yml";

/// Root structure of `.branchline.yml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Branch that feature branches are eventually shipped into
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_branch: Option<String>,

    /// Long-lived branches that are never shipped or killed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub perennial_branches: Vec<String>,

    /// Remote to push to and track
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,

    /// Never talk to the remote
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,
}

/// Resolved repository configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoConfig {
    pub main_branch: String,
    pub perennial_branches: Vec<String>,
    pub remote: String,
    pub offline: bool,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            main_branch: default_main_branch(),
            perennial_branches: Vec::new(),
            remote: DEFAULT_REMOTE.to_string(),
            offline: false,
        }
    }
}

fn default_main_branch() -> String {
    "main".to_string()
}

impl RepoConfig {
    /// Whether `branch` is the main branch or one of the perennial branches.
    pub fn is_main_or_perennial(&self, branch: &str) -> bool {
        branch == self.main_branch || self.perennial_branches.iter().any(|b| b == branch)
    }

    /// Overlay the values set in a config file.
    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(main) = file.main_branch {
            self.main_branch = main;
        }
        if !file.perennial_branches.is_empty() {
            self.perennial_branches = file.perennial_branches;
        }
        if let Some(remote) = file.remote {
            self.remote = remote;
        }
        if let Some(offline) = file.offline {
            self.offline = offline;
        }
    }
}
