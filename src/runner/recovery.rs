//! Recovery after a step failure.
//!
//! Aborts and undos run best-effort: every step is attempted, failures are
//! logged and collected, and nothing re-enters recovery.

use tracing::warn;

use crate::git::Repository;
use crate::steps::StepList;
use crate::ui::UserInterface;

/// Run every step of `steps`, collecting failures instead of stopping.
pub fn run_best_effort(
    steps: StepList,
    repo: &mut dyn Repository,
    ui: &mut dyn UserInterface,
) -> Vec<String> {
    let mut failures = Vec::new();
    for step in steps {
        if step.is_noop() {
            continue;
        }
        ui.show_step(&step.to_string());
        if let Err(e) = step.run(repo) {
            warn!(step = %step, error = %e, "Recovery step failed");
            failures.push(format!("{}: {}", step, e));
        }
    }
    failures
}

/// Tell the user how to get out of an interrupted run.
pub fn print_guidance(ui: &mut dyn UserInterface, command: &str, can_skip: bool) {
    ui.show_hint(&format!(
        "To abort, run \"branchline {} --abort\".",
        command
    ));
    ui.show_hint(&format!(
        "To continue after having resolved conflicts, run \"branchline {} --continue\".",
        command
    ));
    if can_skip {
        ui.show_hint(&format!(
            "To continue by skipping the current branch, run \"branchline {} --skip\".",
            command
        ));
    }
}
