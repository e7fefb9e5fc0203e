//! Interactive prompts.

use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;

use crate::error::{BranchlineError, Result};

use super::Prompt;

fn map_dialoguer_err(e: dialoguer::Error) -> BranchlineError {
    BranchlineError::Io(e.into())
}

/// Dialoguer theme without the default yellow `?` prefix.
fn prompt_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("".to_string()),
        ..ColorfulTheme::default()
    }
}

/// Index of the default option, falling back to the first one.
fn default_index(prompt: &Prompt) -> usize {
    prompt
        .default
        .as_ref()
        .and_then(|d| prompt.options.iter().position(|o| o.value == *d))
        .unwrap_or(0)
}

/// Show a select prompt on `term` and return the chosen value.
pub fn prompt_user(prompt: &Prompt, term: &Term) -> Result<String> {
    if prompt.options.is_empty() {
        return Err(BranchlineError::precondition(format!(
            "Nothing to choose from for '{}'",
            prompt.key
        )));
    }
    let labels: Vec<_> = prompt.options.iter().map(|o| o.label.as_str()).collect();

    let selection = Select::with_theme(&prompt_theme())
        .with_prompt(&prompt.question)
        .items(&labels)
        .default(default_index(prompt))
        .interact_on(term)
        .map_err(map_dialoguer_err)?;

    Ok(prompt.options[selection].value.clone())
}
