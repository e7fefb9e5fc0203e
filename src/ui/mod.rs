//! User interface components.
//!
//! This module provides:
//! - [`UserInterface`] trait so commands and the runner can be tested
//! - [`TerminalUI`] for interactive terminal usage
//! - [`NonInteractiveUI`] for scripts and CI
//! - [`MockUI`] for tests
//!
//! # Example
//!
//! ```
//! use branchline::ui::{create_ui, OutputMode};
//!
//! let mut ui = create_ui(false, OutputMode::Quiet);
//! ui.success("Branch created");
//! ```

pub mod mock;
pub mod non_interactive;
pub mod output;
pub mod prompts;
pub mod spinner;
pub mod terminal;
pub mod theme;

pub use mock::{MockSpinner, MockUI, SpinnerStatus};
pub use non_interactive::NonInteractiveUI;
pub use output::OutputMode;
pub use prompts::prompt_user;
pub use spinner::ProgressSpinner;
pub use terminal::{create_ui, is_ci, TerminalUI};
pub use theme::{should_use_colors, BranchlineTheme};

use crate::error::Result;

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Display a corrective hint below an error.
    fn show_hint(&mut self, hint: &str);

    /// Announce a step as it runs.
    fn show_step(&mut self, description: &str);

    /// Ask the user to choose one of several options.
    fn prompt(&mut self, prompt: &Prompt) -> Result<String>;

    /// Start a spinner for an operation.
    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle>;

    /// Check if running in interactive mode.
    fn is_interactive(&self) -> bool;
}

/// Handle for controlling a spinner.
pub trait SpinnerHandle {
    /// Update the spinner message.
    fn set_message(&mut self, msg: &str);

    /// Mark the operation as successful.
    fn finish_success(&mut self, msg: &str);

    /// Mark the operation as failed.
    fn finish_error(&mut self, msg: &str);
}

/// A selection prompt.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Unique key for the prompt (used for env overrides and mocks).
    pub key: String,
    /// The question to display.
    pub question: String,
    /// Choices offered to the user.
    pub options: Vec<PromptOption>,
    /// Value used when the user just presses enter.
    pub default: Option<String>,
}

/// An option in a select prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOption {
    /// Display label.
    pub label: String,
    /// Value returned when selected.
    pub value: String,
}

impl PromptOption {
    /// Option whose label is its value.
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}
