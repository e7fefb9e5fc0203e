//! Ordered sequences of steps.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::git::Repository;
use crate::steps::Step;

/// Guards [`StepList::wrap`] adds around a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WrapOptions {
    /// Run the list from the repository root and return afterwards.
    pub run_in_repo_root: bool,
    /// Stash open changes first and restore them afterwards.
    pub stash_open_changes: bool,
}

/// An ordered, mutable sequence of steps. Order is significant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepList {
    steps: VecDeque<Step>,
}

impl StepList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step to the end.
    pub fn append(&mut self, step: Step) {
        self.steps.push_back(step);
    }

    /// Add all steps of `other` to the end, keeping their order.
    pub fn append_list(&mut self, other: StepList) {
        self.steps.extend(other.steps);
    }

    /// Add a step to the front.
    pub fn prepend(&mut self, step: Step) {
        self.steps.push_front(step);
    }

    pub fn pop_front(&mut self) -> Option<Step> {
        self.steps.pop_front()
    }

    pub fn peek(&self) -> Option<&Step> {
        self.steps.front()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Drop the leading steps that still belong to the checked out branch,
    /// up to the next branch checkout or the closing guards.
    pub fn skip_current_branch(&mut self) {
        while let Some(step) = self.steps.front() {
            if matches!(
                step,
                Step::CheckoutBranch { .. }
                    | Step::RestoreOpenChanges
                    | Step::ChangeDirectory { .. }
            ) {
                break;
            }
            self.steps.pop_front();
        }
    }

        /// Surround the list with the guards `options` asks for.
    ///
    /// The directory guard is the outermost layer:
    /// `[cd root, stash, ..., restore stash, cd back]`.
    pub fn wrap(&mut self, options: WrapOptions, repo: &dyn Repository) -> Result<()> {
        if options.stash_open_changes && repo.has_open_changes()? {
            self.prepend(Step::StashOpenChanges);
            self.append(Step::RestoreOpenChanges);
        }
        if options.run_in_repo_root {
            let root = repo.root_directory()?;
            let cwd = repo.working_directory()?;
            if root != cwd {
                self.prepend(Step::ChangeDirectory { directory: root });
                self.append(Step::ChangeDirectory { directory: cwd });
            }
        }
        Ok(())
    }
}

impl From<Vec<Step>> for StepList {
    fn from(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

impl IntoIterator for StepList {
    type Item = Step;
    type IntoIter = std::collections::vec_deque::IntoIter<Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

impl FromIterator<Step> for StepList {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}
