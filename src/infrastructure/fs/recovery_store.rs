//! Recovery Memory persistence.
//!
//! The recovery-memory file lives at `auto/recovery-memory.json` in the
//! workspace layout. Reads tolerate a missing file by returning a
//! fresh `RecoveryMemoryFile`; writes are atomic via [`super::write_atomic`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::errors::AcloResult;
use crate::domain::models::recovery::RecoveryMemoryFile;

use super::write_atomic;

/// File-backed store for the recovery-memory catalog.
pub struct RecoveryMemoryStore {
    path: PathBuf,
}

impl RecoveryMemoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the recovery-memory file, defaulting to an empty catalog when
    /// absent rather than treating it as an error.
    pub async fn load(&self) -> AcloResult<RecoveryMemoryFile> {
        if !self.path.exists() {
            return Ok(RecoveryMemoryFile::default());
        }
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| crate::domain::errors::AcloError::io(self.path.display().to_string(), e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persist `memory` atomically.
    pub async fn save(&self, memory: &RecoveryMemoryFile) -> AcloResult<()> {
        let serialized = serde_json::to_string_pretty(memory)?;
        write_atomic(&self.path, &serialized).await
    }

    /// Load, prune entries older than `older_than_days`, and save if any
    /// pruning occurred. Returns the count pruned.
    pub async fn prune(&self, older_than_days: i64, now: DateTime<Utc>) -> AcloResult<u32> {
        let mut memory = self.load().await?;
        let pruned = memory.prune(older_than_days, now);
        if pruned > 0 {
            self.save(&memory).await?;
        }
        Ok(pruned)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
