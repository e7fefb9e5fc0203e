//! Non-interactive UI for scripts and CI.

use std::collections::HashMap;

use crate::error::{BranchlineError, Result};

use super::theme::BranchlineTheme;
use super::{OutputMode, Prompt, SpinnerHandle, UserInterface};

/// Prefix of environment variables that answer prompts.
pub const PROMPT_ENV_PREFIX: &str = "BRANCHLINE_PROMPT_";

/// UI implementation for non-interactive mode.
///
/// Prompts are answered from `BRANCHLINE_PROMPT_<KEY>` environment variables,
/// or with the prompt's default.
pub struct NonInteractiveUI {
    mode: OutputMode,
    theme: BranchlineTheme,
    env_overrides: HashMap<String, String>,
}

impl NonInteractiveUI {
    pub fn new(mode: OutputMode) -> Self {
        let env_overrides = std::env::vars()
            .filter(|(k, _)| k.starts_with(PROMPT_ENV_PREFIX))
            .collect();
        Self::with_overrides(mode, env_overrides)
    }

    /// Create with explicit overrides (for testing).
    pub fn with_overrides(mode: OutputMode, overrides: HashMap<String, String>) -> Self {
        Self {
            mode,
            theme: BranchlineTheme::plain(),
            env_overrides: overrides,
        }
    }

    /// Environment variable consulted for a prompt key.
    pub fn env_key(key: &str) -> String {
        let normalized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", PROMPT_ENV_PREFIX, normalized)
    }
}

impl UserInterface for NonInteractiveUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", msg);
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", self.theme.format_success(msg));
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            eprintln!("{}", self.theme.format_warning(msg));
        }
    }

    fn error(&mut self, msg: &str) {
        eprintln!("{}", self.theme.format_error(msg));
    }

    fn show_hint(&mut self, hint: &str) {
        eprintln!("  {}", hint);
    }

    fn show_step(&mut self, description: &str) {
        if self.mode.shows_steps() {
            println!("{}", self.theme.format_step(description));
        }
    }

    fn prompt(&mut self, prompt: &Prompt) -> Result<String> {
        if let Some(value) = self.env_overrides.get(&Self::env_key(&prompt.key)) {
            return Ok(value.clone());
        }
        if let Some(default) = &prompt.default {
            return Ok(default.clone());
        }
        Err(BranchlineError::precondition_with_hint(
            format!(
                "Cannot ask '{}' in non-interactive mode (no default value)",
                prompt.question
            ),
            format!("Set {} to answer it", Self::env_key(&prompt.key)),
        ))
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() {
            println!("{}", message);
        }
        Box::new(NoopSpinner {
            theme: self.theme.clone(),
            show: self.mode.shows_status(),
        })
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

/// Spinner that does nothing (for non-interactive mode).
struct NoopSpinner {
    theme: BranchlineTheme,
    show: bool,
}

impl SpinnerHandle for NoopSpinner {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, msg: &str) {
        if self.show {
            println!("{}", self.theme.format_success(msg));
        }
    }

    fn finish_error(&mut self, msg: &str) {
        eprintln!("{}", self.theme.format_error(msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::PromptOption;

    fn parent_prompt(default: Option<&str>) -> Prompt {
        Prompt {
            key: "parent.feature-x".into(),
            question: "Parent of feature-x".into(),
            options: vec![PromptOption::plain("main")],
            default: default.map(String::from),
        }
    }

    #[test]
    fn env_key_is_normalized() {
        assert_eq!(
            NonInteractiveUI::env_key("parent.feature-x"),
            "BRANCHLINE_PROMPT_PARENT_FEATURE_X"
        );
    }

    #[test]
    fn override_wins_over_default() {
        let overrides = HashMap::from([(
            "BRANCHLINE_PROMPT_PARENT_FEATURE_X".to_string(),
            "develop".to_string(),
        )]);
        let mut ui = NonInteractiveUI::with_overrides(OutputMode::Silent, overrides);
        assert_eq!(ui.prompt(&parent_prompt(Some("main"))).unwrap(), "develop");
    }

    #[test]
    fn default_is_used_without_override() {
        let mut ui = NonInteractiveUI::with_overrides(OutputMode::Silent, HashMap::new());
        assert_eq!(ui.prompt(&parent_prompt(Some("main"))).unwrap(), "main");
    }

    #[test]
    fn missing_default_is_an_error() {
        let mut ui = NonInteractiveUI::with_overrides(OutputMode::Silent, HashMap::new());
        assert!(ui.prompt(&parent_prompt(None)).is_err());
    }

    #[test]
    fn is_never_interactive() {
        let ui = NonInteractiveUI::with_overrides(OutputMode::Normal, HashMap::new());
        assert!(!ui.is_interactive());
    }
}
