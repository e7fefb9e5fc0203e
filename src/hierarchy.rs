//! Branch ancestry.
//!
//! Every feature branch records its parent in repository-local git
//! configuration under `branchline-branch.<name>.parent`. Main and perennial
//! branches have no parent and form the roots of the hierarchy.
//!
//! [`BranchHierarchy`] is a read-only snapshot. Changes go through the
//! `SetParentBranch`, `DeleteParentBranch`, `DeleteAncestorBranches` and
//! `RestoreParentBranches` steps so that every structural change is undoable.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::RepoConfig;
use crate::error::Result;
use crate::git::Repository;

/// Prefix shared by all parent-link configuration keys.
pub const PARENT_KEY_PREFIX: &str = "branchline-branch.";

const PARENT_KEY_SUFFIX: &str = ".parent";

/// Configuration key holding the parent of `branch`.
pub fn parent_key(branch: &str) -> String {
    format!("{}{}{}", PARENT_KEY_PREFIX, branch, PARENT_KEY_SUFFIX)
}

/// Branch named by a parent-link configuration key, if it is one.
fn branch_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(PARENT_KEY_PREFIX)?
        .strip_suffix(PARENT_KEY_SUFFIX)
        .filter(|b| !b.is_empty())
}

/// All parent links currently recorded in `repo`.
pub fn read_links(repo: &dyn Repository) -> Result<BTreeMap<String, String>> {
    Ok(repo
        .config_entries(PARENT_KEY_PREFIX)?
        .into_iter()
        .filter_map(|(key, parent)| branch_from_key(&key).map(|branch| (branch.to_string(), parent)))
        .collect())
}

/// Snapshot of the branch → parent mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchHierarchy {
    parents: BTreeMap<String, String>,
    main_branch: String,
    perennial_branches: Vec<String>,
}

impl BranchHierarchy {
    /// Build a hierarchy from explicit links.
    pub fn new(
        parents: BTreeMap<String, String>,
        main_branch: impl Into<String>,
        perennial_branches: Vec<String>,
    ) -> Self {
        Self {
            parents,
            main_branch: main_branch.into(),
            perennial_branches,
        }
    }

    /// Read all parent links from the repository configuration.
    pub fn load(repo: &dyn Repository, config: &RepoConfig) -> Result<Self> {
        let parents = read_links(repo)?;
        Ok(Self::new(
            parents,
            config.main_branch.clone(),
            config.perennial_branches.clone(),
        ))
    }

    pub fn main_branch(&self) -> &str {
        &self.main_branch
    }

    pub fn perennial_branches(&self) -> &[String] {
        &self.perennial_branches
    }

    /// All recorded links.
    pub fn links(&self) -> &BTreeMap<String, String> {
        &self.parents
    }

    /// Recorded parent of `branch`.
    pub fn parent_of(&self, branch: &str) -> Option<&str> {
        self.parents.get(branch).map(String::as_str)
    }

    /// Whether `branch` is the main branch or a perennial branch.
    pub fn is_main_or_perennial(&self, branch: &str) -> bool {
        branch == self.main_branch || self.perennial_branches.iter().any(|b| b == branch)
    }

    /// Whether `branch` is a feature branch (anything not main or perennial).
    pub fn is_feature_branch(&self, branch: &str) -> bool {
        !self.is_main_or_perennial(branch)
    }

    /// Whether `branch` knows its place in the hierarchy.
    pub fn knows_parent(&self, branch: &str) -> bool {
        self.is_main_or_perennial(branch) || self.parents.contains_key(branch)
    }

    /// Ancestors of `branch`, nearest first.
    ///
    /// The walk stops at a branch without a parent, or when a branch would
    /// be visited twice.
    pub fn ancestors_of(&self, branch: &str) -> Vec<String> {
        let mut ancestors = Vec::new();
        let mut visited = BTreeSet::from([branch.to_string()]);
        let mut current = branch;
        while let Some(parent) = self.parent_of(current) {
            if !visited.insert(parent.to_string()) {
                break;
            }
            ancestors.push(parent.to_string());
            current = parent;
        }
        ancestors
    }

    /// Branches whose recorded parent is `branch`.
    pub fn children_of(&self, branch: &str) -> BTreeSet<String> {
        self.parents
            .iter()
            .filter(|(_, parent)| parent.as_str() == branch)
            .map(|(child, _)| child.clone())
            .collect()
    }

    /// All branches below `branch`, parents before their children.
    pub fn descendants_of(&self, branch: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = BTreeSet::from([branch.to_string()]);
        let mut queue = vec![branch.to_string()];
        while !queue.is_empty() {
            let mut next = Vec::new();
            for parent in &queue {
                for child in self.children_of(parent) {
                    if visited.insert(child.clone()) {
                        result.push(child.clone());
                        next.push(child);
                    }
                }
            }
            queue = next;
        }
        result
    }

    /// Links whose branch no longer exists among `existing`.
    pub fn stale_links(&self, existing: &[String]) -> BTreeMap<String, String> {
        self.parents
            .iter()
            .filter(|(branch, _)| !existing.contains(branch))
            .map(|(b, p)| (b.clone(), p.clone()))
            .collect()
    }

    /// Order `branches` so that every branch comes after its ancestors.
    pub fn order_parents_first(&self, branches: &[String]) -> Vec<String> {
        let mut ordered: Vec<String> = branches.to_vec();
        ordered.sort_by_key(|b| (self.ancestors_of(b).len(), b.clone()));
        ordered
    }
}
