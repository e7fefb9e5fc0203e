//! Visual theme and styling.

use console::Style;

/// Branchline's visual theme.
#[derive(Debug, Clone)]
pub struct BranchlineTheme {
    /// Style for success messages (green).
    pub success: Style,
    /// Style for warning messages (orange).
    pub warning: Style,
    /// Style for error messages (red bold).
    pub error: Style,
    /// Style for dim/secondary text.
    pub dim: Style,
    /// Style for highlighted/important text (bold).
    pub highlight: Style,
    /// Style for contextual hints (magenta dim).
    pub hint: Style,
    /// Style for key labels in key-value displays (bold).
    pub key: Style,
    /// Style for git commands shown as steps run (dim italic).
    pub command: Style,
}

impl Default for BranchlineTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchlineTheme {
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            dim: Style::new().dim(),
            highlight: Style::new().bold(),
            hint: Style::new().magenta().dim(),
            key: Style::new().bold(),
            command: Style::new().dim().italic(),
        }
    }

    /// Create a theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            dim: Style::new(),
            highlight: Style::new(),
            hint: Style::new(),
            key: Style::new(),
            command: Style::new(),
        }
    }

    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    /// Format a step announcement.
    pub fn format_step(&self, description: &str) -> String {
        format!("  {}", self.command.apply_to(description))
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    console::Term::stdout().is_term()
}
