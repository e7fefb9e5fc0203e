//! Branchline - Resumable branch workflows on top of git.
//!
//! Branchline composes multi-step git operations (creating, syncing,
//! shipping, killing and renaming feature branches) out of small undoable
//! steps. When a step fails, usually on a merge conflict, the remaining work
//! is persisted so the user can resolve the problem and then continue, skip,
//! abort or undo the whole operation.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and the workflow commands
//! - [`config`] - Repository configuration (main and perennial branches, remote)
//! - [`error`] - Error types and result aliases
//! - [`git`] - Repository driver trait with git and in-memory implementations
//! - [`hierarchy`] - Parent/child relationships between branches
//! - [`runner`] - Step list execution and recovery
//! - [`state`] - Persisted run state
//! - [`steps`] - Steps and step lists
//! - [`ui`] - Prompts, spinners, and terminal output
//!
//! # Example
//!
//! ```
//! use branchline::git::{MemoryRepository, Repository};
//! use branchline::steps::Step;
//!
//! let mut repo = MemoryRepository::new("main");
//! repo.add_feature_branch("feature", "main");
//!
//! let step = Step::CheckoutBranch { branch: "feature".into() };
//! let undo = step.undo_step(&repo).unwrap();
//! step.run(&mut repo).unwrap();
//! undo.run(&mut repo).unwrap();
//!
//! assert_eq!(repo.current_branch().unwrap(), "main");
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod hierarchy;
pub mod runner;
pub mod state;
pub mod steps;
pub mod ui;

pub use error::{BranchlineError, Result};
