//! Filesystem adapters for spec-session enumeration and collaboration
//! metadata.
//!
//! Spec directories live under `specs/<spec-id>/`; a spec's own collaboration
//! status, when present, lives alongside it at
//! `specs/<spec-id>/collaboration.json`. Neither file shape is owned by this
//! kernel — both ports are explicitly a read-only view onto an external
//! collaborator's layout, so a missing or malformed collaboration file is
//! treated as "no metadata" rather than an error.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::errors::AcloResult;
use crate::domain::ports::spec_session::{
    CollaborationMetadataReader, CollaborationStatus, SpecDependency, SpecSessionEntry, SpecSessionReader,
};

/// Enumerates `specs/<spec-id>/` directories under a workspace root.
pub struct FsSpecSessionReader {
    specs_dir: PathBuf,
}

impl FsSpecSessionReader {
    pub fn new(specs_dir: impl Into<PathBuf>) -> Self {
        Self { specs_dir: specs_dir.into() }
    }
}

#[async_trait]
impl SpecSessionReader for FsSpecSessionReader {
    async fn read_spec_session_entries(&self) -> AcloResult<Vec<SpecSessionEntry>> {
        if !self.specs_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.specs_dir)
            .await
            .map_err(|e| crate::domain::errors::AcloError::io(self.specs_dir.display().to_string(), e))?;
        while let Some(entry) =
            dir.next_entry().await.map_err(|e| crate::domain::errors::AcloError::io(self.specs_dir.display().to_string(), e))?
        {
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_dir() => metadata,
                _ => continue,
            };
            let Some(spec_id) = entry.file_name().to_str().map(str::to_string) else { continue };
            let modified_at = metadata.modified().ok().map_or_else(Utc::now, DateTime::<Utc>::from);
            entries.push(SpecSessionEntry { spec_id, modified_at });
        }
        entries.sort_by(|a, b| a.spec_id.cmp(&b.spec_id));
        Ok(entries)
    }
}

#[derive(Debug, Deserialize)]
struct WireDependency {
    spec: String,
    #[serde(rename = "type")]
    dependency_type: String,
}

#[derive(Debug, Deserialize)]
struct WireCollaborationStatus {
    current: String,
    #[serde(default)]
    dependencies: Vec<WireDependency>,
}

/// Reads `specs/<spec-id>/collaboration.json` when present.
pub struct FsCollaborationMetadataReader {
    specs_dir: PathBuf,
}

impl FsCollaborationMetadataReader {
    pub fn new(specs_dir: impl Into<PathBuf>) -> Self {
        Self { specs_dir: specs_dir.into() }
    }
}

#[async_trait]
impl CollaborationMetadataReader for FsCollaborationMetadataReader {
    async fn read_status(&self, spec_id: &str) -> AcloResult<Option<CollaborationStatus>> {
        let path = self.specs_dir.join(spec_id).join("collaboration.json");
        if !path.exists() {
            return Ok(None);
        }
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(_) => return Ok(None),
        };
        let Ok(wire) = serde_json::from_str::<WireCollaborationStatus>(&raw) else {
            return Ok(None);
        };
        Ok(Some(CollaborationStatus {
            current: wire.current,
            dependencies: wire
                .dependencies
                .into_iter()
                .map(|d| SpecDependency { spec: d.spec, dependency_type: d.dependency_type })
                .collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_specs_dir_yields_no_entries() {
        let dir = tempdir().unwrap();
        let reader = FsSpecSessionReader::new(dir.path().join("specs"));
        assert!(reader.read_spec_session_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enumerates_spec_directories_sorted_by_id() {
        let dir = tempdir().unwrap();
        let specs_dir = dir.path().join("specs");
        tokio::fs::create_dir_all(specs_dir.join("b-spec")).await.unwrap();
        tokio::fs::create_dir_all(specs_dir.join("a-spec")).await.unwrap();
        let reader = FsSpecSessionReader::new(specs_dir);
        let entries = reader.read_spec_session_entries().await.unwrap();
        assert_eq!(entries.iter().map(|e| e.spec_id.as_str()).collect::<Vec<_>>(), vec!["a-spec", "b-spec"]);
    }

    #[tokio::test]
    async fn missing_collaboration_file_reads_as_none() {
        let dir = tempdir().unwrap();
        let specs_dir = dir.path().join("specs");
        tokio::fs::create_dir_all(specs_dir.join("a-spec")).await.unwrap();
        let reader = FsCollaborationMetadataReader::new(specs_dir);
        assert!(reader.read_status("a-spec").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_collaboration_status_with_dependencies() {
        let dir = tempdir().unwrap();
        let specs_dir = dir.path().join("specs");
        tokio::fs::create_dir_all(specs_dir.join("a-spec")).await.unwrap();
        tokio::fs::write(
            specs_dir.join("a-spec").join("collaboration.json"),
            r#"{"current":"in-progress","dependencies":[{"spec":"b-spec","type":"blocks"}]}"#,
        )
        .await
        .unwrap();
        let reader = FsCollaborationMetadataReader::new(specs_dir);
        let status = reader.read_status("a-spec").await.unwrap().unwrap();
        assert_eq!(status.current, "in-progress");
        assert_eq!(status.dependencies[0].spec, "b-spec");
    }
}
