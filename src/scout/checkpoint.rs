use crate::scout::snapshot::Snapshot;
use crate::scout::util::{to_json_document, write_atomic};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// The compact snapshot carried from one run to the next.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// First run: no file, empty snapshot.
    pub fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            return Ok(Snapshot::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Snapshot::new());
        }
        let parsed: Snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(parsed)
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        debug_assert!(snapshot.is_compact(), "checkpoint must not carry content");
        let data = to_json_document(snapshot)?;
        write_atomic(&self.path, &data)?;
        Ok(self.path.clone())
    }
}
