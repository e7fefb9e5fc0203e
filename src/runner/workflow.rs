//! The step list runner.
//!
//! A normal run executes the steps strictly in order. Before each step runs,
//! its undo step is captured from the current repository state; after it
//! succeeds the undo step is put at the front of the run's undo list.
//!
//! When a step fails, the runner persists a [`RunState`] holding the
//! remaining steps, the continue step, and an abort list made of the failing
//! step's abort step followed by the undo list. It then prints recovery
//! guidance and returns [`BranchlineError::RunInterrupted`].

use tracing::{debug, warn};

use crate::error::{BranchlineError, Result};
use crate::git::Repository;
use crate::state::{RunState, RunStateStore};
use crate::steps::{Step, StepList};
use crate::ui::UserInterface;

use super::recovery::{print_guidance, run_best_effort};
use super::RunMode;

/// Builds the step list of a normal run. Precondition failures are returned
/// as errors before anything runs.
pub type StepBuilder<'a> =
    Box<dyn FnOnce(&mut dyn Repository, &mut dyn UserInterface) -> Result<StepList> + 'a>;

/// Decides at failure time whether `--skip` may be offered. Receives the
/// branch the run started on.
pub type SkipCheck<'a> = Box<dyn Fn(&dyn Repository, &str) -> bool + 'a>;

/// Produces the message printed when a failing step is skipped.
pub type SkipMessage<'a> = Box<dyn Fn(&dyn Repository) -> String + 'a>;

/// What to run and how.
pub struct RunOptions<'a> {
    /// Command name, stored in the run state (e.g. `sync`).
    pub command: String,
    pub mode: RunMode,
    pub build_steps: StepBuilder<'a>,
    pub can_skip: Option<SkipCheck<'a>>,
    pub skip_message: Option<SkipMessage<'a>>,
}

impl<'a> RunOptions<'a> {
    pub fn new<F>(command: impl Into<String>, mode: RunMode, build_steps: F) -> Self
    where
        F: FnOnce(&mut dyn Repository, &mut dyn UserInterface) -> Result<StepList> + 'a,
    {
        Self {
            command: command.into(),
            mode,
            build_steps: Box::new(build_steps),
            can_skip: None,
            skip_message: None,
        }
    }

    /// Allow `--skip` when `check` holds at failure time.
    pub fn with_skip<C, M>(mut self, check: C, message: M) -> Self
    where
        C: Fn(&dyn Repository, &str) -> bool + 'a,
        M: Fn(&dyn Repository) -> String + 'a,
    {
        self.can_skip = Some(Box::new(check));
        self.skip_message = Some(Box::new(message));
        self
    }
}

/// Identity of the run being executed.
struct Execution<'a> {
    command: String,
    initial_branch: String,
    can_skip: Option<SkipCheck<'a>>,
}

/// Executes step lists and resumes interrupted runs.
pub struct Runner<'r> {
    repo: &'r mut dyn Repository,
    store: &'r RunStateStore,
    ui: &'r mut dyn UserInterface,
}

impl<'r> Runner<'r> {
    pub fn new(
        repo: &'r mut dyn Repository,
        store: &'r RunStateStore,
        ui: &'r mut dyn UserInterface,
    ) -> Self {
        Self { repo, store, ui }
    }

    /// Run according to `options.mode`.
    pub fn run(&mut self, options: RunOptions<'_>) -> Result<()> {
        debug!(command = %options.command, mode = ?options.mode, "Starting run");
        match options.mode {
            RunMode::Normal => self.run_normal(options),
            RunMode::Continue => self.run_continue(options),
            RunMode::Abort => self.run_abort(options),
            RunMode::Undo => self.run_undo(options),
            RunMode::Skip => self.run_skip(options),
        }
    }

    fn run_normal(&mut self, options: RunOptions<'_>) -> Result<()> {
        let RunOptions {
            command,
            build_steps,
            can_skip,
            ..
        } = options;

        let initial_branch = self.repo.current_branch()?;
        let steps = build_steps(&mut *self.repo, &mut *self.ui)?;

        match self.store.load() {
            Ok(Some(previous)) if previous.is_unfinished => {
                warn!(previous = %previous.command, "Overwriting unfinished run");
                self.ui.warning(&format!(
                    "Discarding the unfinished '{}' run",
                    previous.command
                ));
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable run state"),
        }

        let execution = Execution {
            command,
            initial_branch,
            can_skip,
        };
        self.execute(&execution, steps, StepList::new())
    }

    fn run_continue(&mut self, options: RunOptions<'_>) -> Result<()> {
        let RunOptions {
            command, can_skip, ..
        } = options;

        let mut state = self.load_unfinished(&command, RunMode::Continue)?;
        if self.repo.has_conflicts()? {
            return Err(BranchlineError::UnresolvedConflicts);
        }

        if let Some(step) = state.continue_step.take() {
            self.ui.show_step(&step.to_string());
            if let Err(e) = step.run(&mut *self.repo) {
                // The stored run state still describes the interrupted run.
                let message = e.to_string();
                self.ui.error(&message);
                print_guidance(&mut *self.ui, &command, state.can_skip);
                return Err(BranchlineError::RunInterrupted { command, message });
            }
        }

        let mut undo = state.undo_steps;
        if let Some(step) = state.pending_undo_step {
            undo.prepend(step);
        }
        let execution = Execution {
            command,
            initial_branch: state.initial_branch,
            can_skip,
        };
        self.execute(&execution, state.remaining_steps, undo)
    }

    fn run_abort(&mut self, options: RunOptions<'_>) -> Result<()> {
        let state = self.load_unfinished(&options.command, RunMode::Abort)?;
        let failures = run_best_effort(state.abort_steps, &mut *self.repo, &mut *self.ui);
        self.store.delete()?;
        self.finish_recovery(options.command, failures)
    }

    fn run_undo(&mut self, options: RunOptions<'_>) -> Result<()> {
        let state = self
            .store
            .load()?
            .ok_or_else(|| BranchlineError::NothingToResume {
                command: options.command.clone(),
                action: RunMode::Undo.action().to_string(),
            })?;
        check_command(&state, &options.command, RunMode::Undo)?;

        let steps = if state.is_unfinished {
            state.abort_steps
        } else {
            state.undo_steps
        };
        let failures = run_best_effort(steps, &mut *self.repo, &mut *self.ui);
        self.store.delete()?;
        self.finish_recovery(options.command, failures)
    }

    fn run_skip(&mut self, options: RunOptions<'_>) -> Result<()> {
        let RunOptions {
            command,
            can_skip,
            skip_message,
            ..
        } = options;

        let mut state = self.load_unfinished(&command, RunMode::Skip)?;
        if !state.can_skip {
            return Err(BranchlineError::CannotSkip { command });
        }

        if state.retries_failed_step {
            state.remaining_steps.pop_front();
        } else if let Some(failed) = &state.failed_step {
            let abort = failed.abort_step();
            if !abort.is_noop() {
                self.ui.show_step(&abort.to_string());
                abort.run(&mut *self.repo)?;
            }
        }
        state.remaining_steps.skip_current_branch();
        if let Some(message) = skip_message {
            let text = message(&*self.repo);
            self.ui.message(&text);
        }

        let execution = Execution {
            command,
            initial_branch: state.initial_branch,
            can_skip,
        };
        self.execute(&execution, state.remaining_steps, state.undo_steps)
    }

    /// Run `steps` in order, persisting the outcome.
    fn execute(
        &mut self,
        execution: &Execution<'_>,
        mut steps: StepList,
        mut undo: StepList,
    ) -> Result<()> {
        while let Some(step) = steps.pop_front() {
            if !step.is_noop() {
                self.ui.show_step(&step.to_string());
            }
            let undo_step = match step.undo_step(&*self.repo) {
                Ok(undo_step) => undo_step,
                Err(e) => return self.interrupt(execution, step, Step::NoOp, steps, undo, e),
            };
            if let Err(e) = step.run(&mut *self.repo) {
                return self.interrupt(execution, step, undo_step, steps, undo, e);
            }
            if !undo_step.is_noop() {
                undo.prepend(undo_step);
            }
        }

        let state = RunState::finished(&execution.command, &execution.initial_branch, undo);
        self.store.save(&state)?;
        debug!(command = %execution.command, "Run finished");
        Ok(())
    }

    fn interrupt(
        &mut self,
        execution: &Execution<'_>,
        failed: Step,
        failed_undo: Step,
        remaining: StepList,
        undo: StepList,
        error: BranchlineError,
    ) -> Result<()> {
        let can_skip = execution
            .can_skip
            .as_ref()
            .map(|check| check(&*self.repo, &execution.initial_branch))
            .unwrap_or(false);
        let message = error.to_string();
        debug!(step = %failed, error = %message, can_skip, "Step failed");

        let mut state = RunState::interrupted(
            &execution.command,
            &execution.initial_branch,
            failed,
            remaining,
            undo,
            can_skip,
            &message,
        );
        if !error.is_conflict() {
            state = state.retry_failed_step();
        }
        let state = state.with_pending_undo(failed_undo);
        self.store.save(&state)?;

        self.ui.error(&message);
        print_guidance(&mut *self.ui, &execution.command, can_skip);
        Err(BranchlineError::RunInterrupted {
            command: execution.command.clone(),
            message,
        })
    }

    fn load_unfinished(&self, command: &str, mode: RunMode) -> Result<RunState> {
        let state = self
            .store
            .load()?
            .filter(|state| state.is_unfinished)
            .ok_or_else(|| BranchlineError::NothingToResume {
                command: command.to_string(),
                action: mode.action().to_string(),
            })?;
        check_command(&state, command, mode)?;
        Ok(state)
    }

    fn finish_recovery(&mut self, command: String, failures: Vec<String>) -> Result<()> {
        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            self.ui.error(failure);
        }
        self.ui
            .show_hint("Please resolve the remaining problems manually.");
        Err(BranchlineError::RecoveryFailed { command, failures })
    }
}

fn check_command(state: &RunState, command: &str, mode: RunMode) -> Result<()> {
    if state.command == command {
        return Ok(());
    }
    Err(BranchlineError::WrongCommand {
        expected: command.to_string(),
        actual: state.command.clone(),
        flag: mode.flag().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MemoryRepository;
    use crate::state::RUN_STATE_FILE;
    use crate::steps::WrapOptions;
    use crate::ui::MockUI;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, RunStateStore) {
        let temp = TempDir::new().unwrap();
        let store = RunStateStore::new(temp.path().join("state").join(RUN_STATE_FILE));
        (temp, store)
    }

    fn checkout(branch: &str) -> Step {
        Step::CheckoutBranch {
            branch: branch.into(),
        }
    }

    fn merge(branch: &str) -> Step {
        Step::MergeBranch {
            branch: branch.into(),
        }
    }

    /// `feature` is a child of `main`; merging `main` into it conflicts.
    fn conflicting_repo() -> MemoryRepository {
        let mut repo = MemoryRepository::new("main");
        repo.add_feature_branch("feature", "main");
        repo.commit("feature", "f1");
        repo.commit("main", "m1");
        repo.add_conflict("feature", "main");
        repo
    }

    fn run_steps(
        repo: &mut MemoryRepository,
        store: &RunStateStore,
        ui: &mut MockUI,
        mode: RunMode,
        steps: Vec<Step>,
    ) -> Result<()> {
        let options = RunOptions::new("sync", mode, move |_, _| Ok(StepList::from(steps)));
        Runner::new(repo, store, ui).run(options)
    }

    fn resume(
        repo: &mut MemoryRepository,
        store: &RunStateStore,
        ui: &mut MockUI,
        mode: RunMode,
    ) -> Result<()> {
        run_steps(repo, store, ui, mode, Vec::new())
    }

    #[test]
    fn successful_run_records_undo_steps() {
        let mut repo = conflicting_repo();
        repo.add_branch("other", "main");
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();

        run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![checkout("other"), checkout("main")],
        )
        .unwrap();

        let state = store.load().unwrap().unwrap();
        assert!(!state.is_unfinished);
        assert_eq!(
            state.undo_steps.iter().cloned().collect::<Vec<_>>(),
            vec![checkout("other"), checkout("main")]
        );
        assert_eq!(ui.steps(), ["git checkout other", "git checkout main"]);
    }

    #[test]
    fn failure_stops_before_later_steps() {
        let mut repo = conflicting_repo();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();

        let err = run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![checkout("feature"), merge("main"), checkout("main")],
        )
        .unwrap_err();

        assert!(matches!(err, BranchlineError::RunInterrupted { .. }));
        assert_eq!(repo.current_branch().unwrap(), "feature");
        assert!(!repo.operations().iter().any(|op| op == "checkout main"));

        let state = store.load().unwrap().unwrap();
        assert!(state.is_unfinished);
        assert_eq!(state.failed_step, Some(merge("main")));
        assert_eq!(
            state.remaining_steps.iter().cloned().collect::<Vec<_>>(),
            vec![checkout("main")]
        );
        assert_eq!(state.continue_step, Some(Step::ContinueMerge));
        assert!(ui.has_hint("branchline sync --abort"));
        assert!(ui.has_hint("branchline sync --continue"));
    }

    #[test]
    fn abort_list_is_abort_step_then_undo_steps_most_recent_first() {
        let mut repo = conflicting_repo();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();

        let _ = run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![
                Step::CreateBranch {
                    branch: "scratch".into(),
                    starting_point: "main".into(),
                },
                checkout("feature"),
                merge("main"),
                checkout("main"),
            ],
        );

        let state = store.load().unwrap().unwrap();
        assert_eq!(
            state.abort_steps.iter().cloned().collect::<Vec<_>>(),
            vec![
                Step::AbortMerge,
                checkout("main"),
                Step::DeleteLocalBranch {
                    branch: "scratch".into(),
                    force: true
                },
            ]
        );
    }

    #[test]
    fn abort_restores_branches_and_deletes_state() {
        let mut repo = conflicting_repo();
        let feature_before = repo.branch_sha("feature").unwrap();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        let steps = vec![
            Step::CreateBranch {
                branch: "scratch".into(),
                starting_point: "main".into(),
            },
            checkout("feature"),
            merge("main"),
            checkout("main"),
        ];
        let _ = run_steps(&mut repo, &store, &mut ui, RunMode::Normal, steps);

        resume(&mut repo, &store, &mut ui, RunMode::Abort).unwrap();

        assert_eq!(repo.current_branch().unwrap(), "main");
        assert!(!repo.has_local_branch("scratch").unwrap());
        assert!(!repo.is_merge_in_progress().unwrap());
        assert_eq!(repo.branch_sha("feature").unwrap(), feature_before);
        assert!(!store.exists());
    }

    #[test]
    fn continue_resumes_at_failing_step() {
        let mut repo = conflicting_repo();
        let feature_before = repo.branch_sha("feature").unwrap();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        let _ = run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![checkout("feature"), merge("main"), checkout("main")],
        );

        repo.resolve_conflicts();
        resume(&mut repo, &store, &mut ui, RunMode::Continue).unwrap();

        assert_eq!(repo.current_branch().unwrap(), "main");
        assert!(repo.changes_of_branch("feature").contains("m1"));

        let state = store.load().unwrap().unwrap();
        assert!(!state.is_unfinished);
        assert_eq!(
            state.undo_steps.iter().cloned().collect::<Vec<_>>(),
            vec![
                checkout("feature"),
                Step::ResetToSha {
                    sha: feature_before,
                    hard: true
                },
                checkout("main"),
            ]
        );
    }

    #[test]
    fn continue_refuses_while_conflicts_remain() {
        let mut repo = conflicting_repo();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        let _ = run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![checkout("feature"), merge("main")],
        );
        let before = store.load().unwrap();

        let err = resume(&mut repo, &store, &mut ui, RunMode::Continue).unwrap_err();

        assert!(matches!(err, BranchlineError::UnresolvedConflicts));
        assert_eq!(store.load().unwrap(), before);
    }

    #[test]
    fn resuming_without_state_reports_nothing_to_do() {
        let mut repo = MemoryRepository::new("main");
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();

        for mode in [RunMode::Continue, RunMode::Abort, RunMode::Undo, RunMode::Skip] {
            let err = resume(&mut repo, &store, &mut ui, mode).unwrap_err();
            assert_eq!(err.to_string(), format!("Nothing to {}", mode.action()));
        }
    }

    #[test]
    fn resuming_another_commands_run_is_rejected() {
        let mut repo = conflicting_repo();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        let _ = run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![checkout("feature"), merge("main")],
        );

        let options = RunOptions::new("ship", RunMode::Abort, |_, _| Ok(StepList::new()));
        let err = Runner::new(&mut repo, &store, &mut ui)
            .run(options)
            .unwrap_err();

        assert!(matches!(err, BranchlineError::WrongCommand { .. }));
        assert!(store.exists());
    }

    #[test]
    fn undo_after_success_restores_branch_and_commits() {
        let mut repo = MemoryRepository::new("main");
        repo.add_feature_branch("feature", "main");
        repo.commit("feature", "f1");
        repo.commit("main", "m1");
        let feature_before = repo.branch_sha("feature").unwrap();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();

        run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![checkout("feature"), merge("main"), checkout("main")],
        )
        .unwrap();
        assert_ne!(repo.branch_sha("feature").unwrap(), feature_before);

        resume(&mut repo, &store, &mut ui, RunMode::Undo).unwrap();

        assert_eq!(repo.current_branch().unwrap(), "main");
        assert_eq!(repo.branch_sha("feature").unwrap(), feature_before);
        assert!(!store.exists());
    }

    #[test]
    fn undo_of_unfinished_run_uses_abort_steps() {
        let mut repo = conflicting_repo();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        let _ = run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![checkout("feature"), merge("main")],
        );

        resume(&mut repo, &store, &mut ui, RunMode::Undo).unwrap();

        assert_eq!(repo.current_branch().unwrap(), "main");
        assert!(!repo.is_merge_in_progress().unwrap());
    }

    #[test]
    fn skip_requires_permission() {
        let mut repo = conflicting_repo();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        let _ = run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![checkout("feature"), merge("main")],
        );

        let err = resume(&mut repo, &store, &mut ui, RunMode::Skip).unwrap_err();
        assert!(matches!(err, BranchlineError::CannotSkip { .. }));
    }

    #[test]
    fn skip_aborts_failing_step_and_runs_the_rest() {
        let mut repo = conflicting_repo();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        let steps = vec![checkout("feature"), merge("main"), checkout("main")];
        let options = RunOptions::new("sync", RunMode::Normal, move |_, _| {
            Ok(StepList::from(steps))
        })
        .with_skip(
            |repo, _| repo.current_branch().map(|b| b != "main").unwrap_or(false),
            |_| "Skipped".to_string(),
        );
        let _ = Runner::new(&mut repo, &store, &mut ui).run(options);
        assert!(ui.has_hint("branchline sync --skip"));

        let options = RunOptions::new("sync", RunMode::Skip, |_, _| Ok(StepList::new()))
            .with_skip(|_, _| true, |repo| {
                format!("Skipping {}", repo.current_branch().unwrap_or_default())
            });
        Runner::new(&mut repo, &store, &mut ui).run(options).unwrap();

        assert!(ui.has_message("Skipping feature"));
        assert!(!repo.is_merge_in_progress().unwrap());
        assert_eq!(repo.current_branch().unwrap(), "main");
        assert!(!repo.changes_of_branch("feature").contains("m1"));
    }

    #[test]
    fn precondition_failure_writes_no_state() {
        let mut repo = MemoryRepository::new("main");
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();

        let options = RunOptions::new("hack", RunMode::Normal, |_, _| {
            Err(BranchlineError::precondition("A branch named 'x' already exists"))
        });
        let err = Runner::new(&mut repo, &store, &mut ui)
            .run(options)
            .unwrap_err();

        assert!(matches!(err, BranchlineError::Precondition { .. }));
        assert!(!store.exists());
    }

    #[test]
    fn new_run_warns_when_discarding_unfinished_run() {
        let mut repo = conflicting_repo();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        let _ = run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![checkout("feature"), merge("main")],
        );
        repo.discard_open_changes().unwrap();

        run_steps(&mut repo, &store, &mut ui, RunMode::Normal, vec![checkout("main")])
            .unwrap();

        assert!(ui.has_warning("Discarding the unfinished 'sync' run"));
        assert!(!store.load().unwrap().unwrap().is_unfinished);
    }

    #[test]
    fn failed_recovery_is_reported_and_state_removed() {
        let mut repo = conflicting_repo();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        let _ = run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![checkout("feature"), merge("main")],
        );
        repo.fail_on("checkout", "index.lock exists");

        let err = resume(&mut repo, &store, &mut ui, RunMode::Abort).unwrap_err();

        match err {
            BranchlineError::RecoveryFailed { failures, .. } => assert_eq!(failures.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!store.exists());
        assert!(!repo.is_merge_in_progress().unwrap());
    }

    /// `feature` is a child of `main` and behind it, without conflicts.
    fn diverged_repo() -> MemoryRepository {
        let mut repo = MemoryRepository::new("main");
        repo.add_feature_branch("feature", "main");
        repo.commit("feature", "f1");
        repo.commit("main", "m1");
        repo
    }

    #[test]
    fn continue_reruns_step_that_failed_without_conflict() {
        let mut repo = diverged_repo();
        let feature_before = repo.branch_sha("feature").unwrap();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        repo.fail_on("checkout", "index.lock exists");

        let err = run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![checkout("feature"), merge("main")],
        )
        .unwrap_err();
        assert!(matches!(err, BranchlineError::RunInterrupted { .. }));
        let state = store.load().unwrap().unwrap();
        assert!(state.retries_failed_step);
        assert_eq!(
            state.remaining_steps.iter().cloned().collect::<Vec<_>>(),
            vec![checkout("feature"), merge("main")]
        );
        assert_eq!(state.pending_undo_step, None);

        repo.clear_failure("checkout");
        resume(&mut repo, &store, &mut ui, RunMode::Continue).unwrap();

        assert_eq!(repo.current_branch().unwrap(), "feature");
        assert!(repo.changes_of_branch("feature").contains("m1"));
        assert!(!repo.changes_of_branch("main").contains("f1"));
        let state = store.load().unwrap().unwrap();
        assert!(!state.is_unfinished);
        assert_eq!(
            state.undo_steps.iter().cloned().collect::<Vec<_>>(),
            vec![
                Step::ResetToSha {
                    sha: feature_before,
                    hard: true
                },
                checkout("main"),
            ]
        );
    }

    #[test]
    fn continue_retries_rejected_push() {
        let mut repo = MemoryRepository::new("main").with_remote();
        repo.commit("main", "m1");
        let remote_before = repo.remote_branch("main").unwrap().to_string();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        let push = Step::PushBranch {
            branch: "main".into(),
            force: false,
            undoable: true,
        };
        repo.fail_on("push", "network unreachable");

        let _ = run_steps(&mut repo, &store, &mut ui, RunMode::Normal, vec![push]);
        assert!(ui.has_error("network unreachable"));
        assert_eq!(repo.remote_branch("main"), Some(remote_before.as_str()));

        repo.clear_failure("push");
        resume(&mut repo, &store, &mut ui, RunMode::Continue).unwrap();

        let local = repo.branch_sha("main").unwrap();
        assert_eq!(repo.remote_branch("main"), Some(local.as_str()));
        let state = store.load().unwrap().unwrap();
        assert_eq!(
            state.undo_steps.iter().cloned().collect::<Vec<_>>(),
            vec![Step::ResetRemoteBranchToSha {
                branch: "main".into(),
                sha: remote_before
            }]
        );
    }

    #[test]
    fn abort_after_failure_without_conflict_undoes_completed_steps() {
        let mut repo = diverged_repo();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        repo.fail_on("checkout", "index.lock exists");
        let _ = run_steps(
            &mut repo,
            &store,
            &mut ui,
            RunMode::Normal,
            vec![
                Step::CreateBranch {
                    branch: "scratch".into(),
                    starting_point: "main".into(),
                },
                checkout("feature"),
            ],
        );

        resume(&mut repo, &store, &mut ui, RunMode::Abort).unwrap();

        assert!(!repo.has_local_branch("scratch").unwrap());
        assert!(!store.exists());
    }

    #[test]
    fn skip_drops_the_rest_of_the_skipped_branch() {
        let mut repo = conflicting_repo();
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        let steps = vec![
            checkout("feature"),
            merge("main"),
            Step::CreateBranch {
                branch: "feature-copy".into(),
                starting_point: "feature".into(),
            },
            checkout("main"),
        ];
        let options = RunOptions::new("sync", RunMode::Normal, move |_, _| {
            Ok(StepList::from(steps))
        })
        .with_skip(|_, _| true, |_| "Skipped".to_string());
        let _ = Runner::new(&mut repo, &store, &mut ui).run(options);

        let options = RunOptions::new("sync", RunMode::Skip, |_, _| Ok(StepList::new()))
            .with_skip(|_, _| true, |_| "Skipped".to_string());
        Runner::new(&mut repo, &store, &mut ui).run(options).unwrap();

        assert!(!repo.has_local_branch("feature-copy").unwrap());
        assert!(!repo.is_merge_in_progress().unwrap());
        assert_eq!(repo.current_branch().unwrap(), "main");
    }

    #[test]
    fn skip_after_failure_without_conflict_does_not_rerun_step() {
        let mut repo = diverged_repo();
        repo.add_branch("other", "main");
        let (_temp, store) = temp_store();
        let mut ui = MockUI::new();
        repo.fail_on("merge", "untracked file would be overwritten");
        let steps = vec![
            checkout("feature"),
            merge("main"),
            checkout("other"),
        ];
        let options = RunOptions::new("sync", RunMode::Normal, move |_, _| {
            Ok(StepList::from(steps))
        })
        .with_skip(|_, _| true, |_| "Skipped".to_string());
        let _ = Runner::new(&mut repo, &store, &mut ui).run(options);

        let options = RunOptions::new("sync", RunMode::Skip, |_, _| Ok(StepList::new()))
            .with_skip(|_, _| true, |_| "Skipped".to_string());
        Runner::new(&mut repo, &store, &mut ui).run(options).unwrap();

        assert_eq!(repo.current_branch().unwrap(), "other");
        assert!(!repo.changes_of_branch("feature").contains("m1"));
        assert!(!repo.operations().iter().any(|op| op == "merge --abort"));
    }

    mod wrapped {
        use super::*;

        /// Repository invoked from `<root>/sub` with one open change.
        fn wrapped_repo(temp: &TempDir) -> (MemoryRepository, PathBuf, PathBuf) {
            let root = temp.path().to_path_buf();
            let sub = root.join("sub");
            std::fs::create_dir_all(&sub).unwrap();
            let mut repo = conflicting_repo().with_directories(&root, &sub);
            repo.add_open_change("notes.txt");
            (repo, root, sub)
        }

        fn wrapped_steps(repo: &MemoryRepository, steps: Vec<Step>) -> StepList {
            let mut list = StepList::from(steps);
            list.wrap(
                WrapOptions {
                    run_in_repo_root: true,
                    stash_open_changes: true,
                },
                repo,
            )
            .unwrap();
            list
        }

        #[test]
        fn restores_directory_and_stash_on_completion() {
            let temp = TempDir::new().unwrap();
            let (mut repo, root, sub) = wrapped_repo(&temp);
            let (_state_temp, store) = temp_store();
            let mut ui = MockUI::new();
            let steps = wrapped_steps(&repo, vec![checkout("main")]);

            Runner::new(&mut repo, &store, &mut ui)
                .run(RunOptions::new("sync", RunMode::Normal, move |_, _| Ok(steps)))
                .unwrap();

            assert!(repo
                .operations()
                .contains(&format!("cd {}", root.display())));
            assert_eq!(repo.working_directory().unwrap(), sub);
            assert!(repo.open_changes().contains("notes.txt"));
            assert_eq!(repo.stash_count(), 0);
        }

        #[test]
        fn restores_directory_and_stash_after_abort() {
            let temp = TempDir::new().unwrap();
            let (mut repo, root, sub) = wrapped_repo(&temp);
            let (_state_temp, store) = temp_store();
            let mut ui = MockUI::new();
            let steps = wrapped_steps(&repo, vec![checkout("feature"), merge("main")]);

            let _ = Runner::new(&mut repo, &store, &mut ui)
                .run(RunOptions::new("sync", RunMode::Normal, move |_, _| Ok(steps)));
            assert_eq!(repo.working_directory().unwrap(), root);
            assert_eq!(repo.stash_count(), 1);

            // the abort runs in a new process started from the user's directory
            let mut repo = repo.with_directories(&root, &sub);
            resume(&mut repo, &store, &mut ui, RunMode::Abort).unwrap();

            assert_eq!(repo.working_directory().unwrap(), sub);
            assert!(repo.open_changes().contains("notes.txt"));
            assert_eq!(repo.stash_count(), 0);
            assert_eq!(repo.current_branch().unwrap(), "main");
        }

        #[test]
        fn restores_directory_and_stash_after_undo() {
            let temp = TempDir::new().unwrap();
            let (mut repo, _root, sub) = wrapped_repo(&temp);
            let (_state_temp, store) = temp_store();
            let mut ui = MockUI::new();
            let steps = wrapped_steps(&repo, vec![checkout("main")]);
            Runner::new(&mut repo, &store, &mut ui)
                .run(RunOptions::new("sync", RunMode::Normal, move |_, _| Ok(steps)))
                .unwrap();

            resume(&mut repo, &store, &mut ui, RunMode::Undo).unwrap();

            assert_eq!(repo.working_directory().unwrap(), sub);
            assert!(repo.open_changes().contains("notes.txt"));
            assert_eq!(repo.stash_count(), 0);
        }

        #[test]
        fn undo_with_clean_tree_leaves_older_stash_alone() {
            let temp = TempDir::new().unwrap();
            let (mut repo, _root, _sub) = wrapped_repo(&temp);
            let (_state_temp, store) = temp_store();
            let mut ui = MockUI::new();
            let steps = wrapped_steps(&repo, vec![checkout("feature")]);
            Runner::new(&mut repo, &store, &mut ui)
                .run(RunOptions::new("sync", RunMode::Normal, move |_, _| Ok(steps)))
                .unwrap();
            repo.discard_open_changes().unwrap();
            repo.add_foreign_stash("older.txt");

            resume(&mut repo, &store, &mut ui, RunMode::Undo).unwrap();

            assert_eq!(repo.current_branch().unwrap(), "main");
            assert_eq!(repo.stash_count(), 1);
            assert!(!repo.open_changes().contains("older.txt"));
        }
    }
}
