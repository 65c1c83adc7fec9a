use super::files::{atomic_write, read_file};
use crate::domain::Roadmap;
use crate::error::{Result, TrackerError};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Durable home of the roadmap.
///
/// `commit` must be all-or-nothing: after an error the previously committed
/// roadmap is still the one `load` returns.
pub trait Store {
    fn load(&self) -> Result<Roadmap>;
    fn commit(&mut self, roadmap: &Roadmap) -> Result<()>;
}

/// Roadmap kept as one JSON document, replaced atomically on every commit
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for JsonStore {
    fn load(&self) -> Result<Roadmap> {
        let content = read_file(&self.path).map_err(TrackerError::Storage)?;
        if content.trim().is_empty() {
            return Ok(Roadmap::default());
        }
        let mut roadmap: Roadmap = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse roadmap: {}", self.path.display()))
            .map_err(TrackerError::Storage)?;
        // Older files can hold active task statuses without a running timer
        roadmap.normalize_loaded_tasks()?;
        Ok(roadmap)
    }

    fn commit(&mut self, roadmap: &Roadmap) -> Result<()> {
        let json = serde_json::to_string_pretty(roadmap)
            .context("Failed to serialize roadmap")
            .map_err(TrackerError::Storage)?;
        atomic_write(&self.path, &json).map_err(TrackerError::Storage)
    }
}

/// In-memory store; can be told to reject commits to exercise rollback paths
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    committed: Roadmap,
    pub fail_commits: bool,
    pub commit_count: usize,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> &Roadmap {
        &self.committed
    }
}

#[cfg(test)]
impl Store for MemoryStore {
    fn load(&self) -> Result<Roadmap> {
        Ok(self.committed.clone())
    }

    fn commit(&mut self, roadmap: &Roadmap) -> Result<()> {
        if self.fail_commits {
            return Err(TrackerError::Storage(anyhow::anyhow!(
                "commit rejected by memory store"
            )));
        }
        self.committed = roadmap.clone();
        self.commit_count += 1;
        Ok(())
    }
}
