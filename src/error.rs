//! Error types for branchline operations.
//!
//! This module defines [`BranchlineError`], the primary error type used
//! throughout the application, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Precondition errors are reported before any step list is built
//! - Step failures ([`BranchlineError::Conflict`], [`BranchlineError::GitFailed`], ...)
//!   are caught by the runner, persisted, and surfaced as
//!   [`BranchlineError::RunInterrupted`]
//! - Use `anyhow::Error` (via `BranchlineError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for branchline operations.
#[derive(Debug, Error)]
pub enum BranchlineError {
    /// The working directory is not inside a git repository.
    #[error("This is not a git repository")]
    NotARepository,

    /// A command's upfront checks failed.
    #[error("{message}")]
    Precondition {
        message: String,
        hint: Option<String>,
    },

    /// A merge, rebase, or stash pop could not complete automatically.
    #[error("{operation} resulted in conflicts: {message}")]
    Conflict { operation: String, message: String },

    /// A git invocation exited unsuccessfully.
    #[error("git {command} failed with exit code {code:?}: {stderr}")]
    GitFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Squash-merging the branch would produce an empty commit.
    #[error("The branch '{branch}' has no shippable changes")]
    NothingToShip { branch: String },

    /// A resuming flag was given but there is no matching run state.
    #[error("Nothing to {action}")]
    NothingToResume { command: String, action: String },

    /// `--continue` was requested while conflicts are still present.
    #[error("You must resolve the conflicts before continuing")]
    UnresolvedConflicts,

    /// `--skip` was requested for a failure that cannot be skipped.
    #[error("The current failure of '{command}' cannot be skipped")]
    CannotSkip { command: String },

    /// The persisted run state belongs to another command.
    #[error("The last run was '{actual}', not '{expected}'. Run 'branchline {actual} {flag}' instead")]
    WrongCommand {
        expected: String,
        actual: String,
        flag: String,
    },

    /// The persisted run state could not be read.
    #[error("Run state at {path} is unreadable: {message}")]
    RunStateCorrupt { path: PathBuf, message: String },

    /// Failed to parse the repository configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// A step failed and the run was paused for manual resolution.
    #[error("'{command}' stopped: {message}")]
    RunInterrupted { command: String, message: String },

    /// Steps failed while aborting or undoing a run.
    #[error("{} step(s) failed while rolling back '{command}'", failures.len())]
    RecoveryFailed {
        command: String,
        failures: Vec<String>,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BranchlineError {
    /// Create a precondition error without a hint.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            hint: None,
        }
    }

    /// Create a precondition error with a corrective hint.
    pub fn precondition_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Whether this failure came from content that needs manual merging.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type alias for branchline operations.
pub type Result<T> = std::result::Result<T, BranchlineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_displays_message_only() {
        let err = BranchlineError::precondition_with_hint(
            "Shipping this branch would ship feature-b as well.",
            "Please ship \"feature-b\" first.",
        );
        assert_eq!(
            err.to_string(),
            "Shipping this branch would ship feature-b as well."
        );
    }

    #[test]
    fn conflict_displays_operation() {
        let err = BranchlineError::Conflict {
            operation: "git merge main".into(),
            message: "CONFLICT (content)".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("git merge main"));
        assert!(msg.contains("CONFLICT"));
        assert!(err.is_conflict());
    }

    #[test]
    fn git_failed_displays_command_and_code() {
        let err = BranchlineError::GitFailed {
            command: "push origin main".into(),
            code: Some(128),
            stderr: "could not read from remote".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("push origin main"));
        assert!(msg.contains("128"));
        assert!(!err.is_conflict());
    }

    #[test]
    fn nothing_to_resume_names_action() {
        let err = BranchlineError::NothingToResume {
            command: "sync".into(),
            action: "continue".into(),
        };
        assert_eq!(err.to_string(), "Nothing to continue");
    }

    #[test]
    fn wrong_command_suggests_flag() {
        let err = BranchlineError::WrongCommand {
            expected: "ship".into(),
            actual: "sync".into(),
            flag: "--abort".into(),
        };
        assert!(err.to_string().contains("branchline sync --abort"));
    }

    #[test]
    fn recovery_failed_counts_failures() {
        let err = BranchlineError::RecoveryFailed {
            command: "sync".into(),
            failures: vec!["a".into(), "b".into()],
        };
        assert!(err.to_string().starts_with("2 step(s)"));
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: BranchlineError = io_err.into();
        assert!(matches!(err, BranchlineError::Io(_)));
    }
}
