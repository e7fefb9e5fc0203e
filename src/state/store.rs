//! Run state persistence.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{BranchlineError, Result};
use crate::git::Repository;
use crate::state::RunState;

/// File name of the run state inside the state directory.
pub const RUN_STATE_FILE: &str = "runstate.json";

/// Loads, saves and deletes the run state of one repository.
#[derive(Debug, Clone)]
pub struct RunStateStore {
    path: PathBuf,
}

impl RunStateStore {
    /// Store backed by an explicit file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store inside the repository's state directory.
    pub fn for_repository(repo: &dyn Repository) -> Result<Self> {
        Ok(Self::new(repo.state_directory()?.join(RUN_STATE_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the run state if one exists.
    ///
    /// # Errors
    ///
    /// Returns `RunStateCorrupt` if the file cannot be parsed.
    pub fn load(&self) -> Result<Option<RunState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let state = serde_json::from_str(&content).map_err(|e| BranchlineError::RunStateCorrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        Ok(Some(state))
    }

    /// Save the run state using an atomic write.
    pub fn save(&self, state: &RunState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(state).map_err(anyhow::Error::from)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &self.path)?;
        debug!(
            command = %state.command,
            unfinished = state.is_unfinished,
            "Saved run state to {}",
            self.path.display()
        );
        Ok(())
    }

    /// Remove the run state. A missing file is not an error.
    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
