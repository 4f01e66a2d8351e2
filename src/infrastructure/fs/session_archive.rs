//! Session Archive persistence.
//!
//! One directory per [`SessionKind`] under `auto/`. Writes are
//! atomic; listing tolerates malformed files by reporting them as
//! [`ArchiveEntry::Invalid`] rather than failing the whole enumeration
//!
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::errors::{AcloError, AcloResult};
use crate::domain::models::prune::{plan_prune, PruneResult};
use crate::domain::models::session::{ArchiveEntry, SessionEnvelope, SessionKind};

use super::write_atomic;

/// File-backed archive for one [`SessionKind`], rooted at
/// `<workspace_root>/auto/<kind.dir_name()>`.
pub struct SessionArchiveStore {
    dir: PathBuf,
}

impl SessionArchiveStore {
    pub fn new(workspace_root: impl AsRef<Path>, kind: SessionKind) -> Self {
        Self { dir: workspace_root.as_ref().join("auto").join(kind.dir_name()) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `envelope` to `file_name` atomically, creating the archive
    /// directory on first use.
    pub async fn write(&self, file_name: &str, envelope: &SessionEnvelope) -> AcloResult<PathBuf> {
        let path = self.dir.join(file_name);
        let serialized = serde_json::to_string_pretty(envelope)?;
        write_atomic(&path, &serialized).await?;
        Ok(path)
    }

    /// List every entry in the archive directory sorted by modification
    /// time, newest first. A missing directory
    /// yields an empty list rather than an error.
    pub async fn list_entries(&self) -> AcloResult<Vec<ArchiveEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut read_dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| AcloError::io(self.dir.display().to_string(), e))?;

        let mut entries = Vec::new();
        while let Some(dir_entry) =
            read_dir.next_entry().await.map_err(|e| AcloError::io(self.dir.display().to_string(), e))?
        {
            let path = dir_entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let file_name = dir_entry.file_name().to_string_lossy().to_string();
            let metadata = dir_entry.metadata().await.map_err(|e| AcloError::io(path.display().to_string(), e))?;
            let modified_at: DateTime<Utc> = metadata
                .modified()
                .map_err(|e| AcloError::io(path.display().to_string(), e))?
                .into();

            let entry = match tokio::fs::read_to_string(&path).await {
                Ok(raw) => match serde_json::from_str::<SessionEnvelope>(&raw) {
                    Ok(envelope) => ArchiveEntry::Valid { file_name, modified_at, envelope: Box::new(envelope) },
                    Err(e) => ArchiveEntry::Invalid { file_name, modified_at, reason: e.to_string() },
                },
                Err(e) => ArchiveEntry::Invalid { file_name, modified_at, reason: e.to_string() },
            };
            entries.push(entry);
        }

        entries.sort_by(|a, b| b.modified_at().cmp(&a.modified_at()));
        Ok(entries)
    }

    /// Plan and, unless `dry_run`, apply pruning of this archive directory
    ///
    pub async fn prune(
        &self,
        keep: usize,
        older_than_days: i64,
        current_file: Option<&str>,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> AcloResult<PruneResult> {
        let entries = self.list_entries().await?;
        let files_by_mtime_desc: Vec<(String, DateTime<Utc>)> = entries
            .iter()
            .map(|entry| match entry {
                ArchiveEntry::Valid { file_name, modified_at, .. }
                | ArchiveEntry::Invalid { file_name, modified_at, .. } => (file_name.clone(), *modified_at),
            })
            .collect();

        let result = plan_prune(&files_by_mtime_desc, keep, older_than_days, current_file, now, dry_run);

        if !dry_run {
            for name in &result.deleted {
                let path = self.dir.join(name);
                tokio::fs::remove_file(&path).await.map_err(|e| AcloError::io(path.display().to_string(), e))?;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::session::SessionRef;
    use serde_json::Value;
    use tempfile::tempdir;

    fn envelope(now: DateTime<Utc>) -> SessionEnvelope {
        SessionEnvelope::new(
            "batch",
            "completed",
            SessionRef { id: "batch-1".into(), file: "batch-1.json".into() },
            now,
            Value::Null,
        )
    }

    #[tokio::test]
    async fn missing_directory_lists_empty() {
        let dir = tempdir().unwrap();
        let store = SessionArchiveStore::new(dir.path(), SessionKind::Batch);
        assert!(store.list_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_then_list_round_trips() {
        let dir = tempdir().unwrap();
        let store = SessionArchiveStore::new(dir.path(), SessionKind::CloseLoop);
        store.write("close-loop-1.json", &envelope(Utc::now())).await.unwrap();

        let entries = store.list_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0], ArchiveEntry::Valid { .. }));
    }

    #[tokio::test]
    async fn malformed_file_reports_invalid_without_failing_enumeration() {
        let dir = tempdir().unwrap();
        let store = SessionArchiveStore::new(dir.path(), SessionKind::Governance);
        tokio::fs::create_dir_all(store.dir()).await.unwrap();
        tokio::fs::write(store.dir().join("broken.json"), "{not json").await.unwrap();

        let entries = store.list_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0], ArchiveEntry::Invalid { .. }));
    }

    #[tokio::test]
    async fn prune_never_deletes_current_file() {
        let dir = tempdir().unwrap();
        let store = SessionArchiveStore::new(dir.path(), SessionKind::Controller);
        let now = Utc::now();
        store.write("controller-1.json", &envelope(now - chrono::Duration::days(365))).await.unwrap();

        let result = store.prune(0, 7, Some("controller-1.json"), now, false).await.unwrap();
        assert!(result.deleted.is_empty());
        assert!(store.dir().join("controller-1.json").exists());
    }

    #[tokio::test]
    async fn dry_run_plans_without_deleting() {
        let dir = tempdir().unwrap();
        let store = SessionArchiveStore::new(dir.path(), SessionKind::Batch);
        let now = Utc::now();
        store.write("batch-old.json", &envelope(now - chrono::Duration::days(365))).await.unwrap();

        let result = store.prune(0, 7, None, now, true).await.unwrap();
        assert_eq!(result.deleted, vec!["batch-old.json".to_string()]);
        assert!(store.dir().join("batch-old.json").exists());
    }
}
