//! Repository configuration for branchline.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and override resolution in [`loader`]
//!
//! # Example
//!
//! ```
//! use branchline::config::load_repo_config_with_env;
//! use branchline::git::MemoryRepository;
//!
//! let repo = MemoryRepository::new("main");
//! let config = load_repo_config_with_env(&repo, |_| None).unwrap();
//! assert_eq!(config.main_branch, "main");
//! ```

pub mod loader;
pub mod schema;

pub use loader::{
    load_config_file, load_repo_config, load_repo_config_with_env, MAIN_BRANCH_KEY, OFFLINE_ENV,
    OFFLINE_KEY, PERENNIAL_BRANCHES_KEY, REMOTE_KEY,
};
pub use schema::{ConfigFile, RepoConfig, CONFIG_FILE_NAME};
