//! Persisted pagination cursor for resumable paginated runs

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CheckpointFile {
    cursor: String,
    saved_at: DateTime<Utc>,
}

/// Stores the last fully consumed account id in a JSON file
#[derive(Debug, Clone)]
pub struct CursorCheckpoint {
    path: PathBuf,
}

impl CursorCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved cursor, or `None` when no checkpoint exists yet
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file: CheckpointFile = config::load_json_file(&self.path)?;
        Ok(Some(file.cursor))
    }

    pub fn save(&self, cursor: &str) -> Result<()> {
        config::save_json_file(
            &self.path,
            &CheckpointFile {
                cursor: cursor.to_string(),
                saved_at: Utc::now(),
            },
        )
    }

    /// Remove the checkpoint after a run that reached the end
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_clear() {
        let dir = TempDir::new().unwrap();
        let checkpoint = CursorCheckpoint::new(dir.path().join("cursor.json"));

        assert_eq!(checkpoint.load().unwrap(), None);

        checkpoint.save("user_000010").unwrap();
        assert_eq!(checkpoint.load().unwrap().as_deref(), Some("user_000010"));

        checkpoint.save("user_000020").unwrap();
        assert_eq!(checkpoint.load().unwrap().as_deref(), Some("user_000020"));

        checkpoint.clear().unwrap();
        assert_eq!(checkpoint.load().unwrap(), None);
    }
}
