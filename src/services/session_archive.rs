//! Session Archive service.
//!
//! Wraps [`SessionArchiveStore`] with the summary/report operations the CLI
//! and controller need on top of raw read/write/prune: status-window
//! statistics, and spec-session protection classification ahead of a
//! destructive spec-workdir sweep.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::errors::AcloResult;
use crate::domain::models::prune::{classify_protection, PruneResult, SpecProtectionEntry};
use crate::domain::models::session::{ArchiveEntry, SessionKind};
use crate::domain::ports::spec_session::{CollaborationMetadataReader, SpecSessionEntry};
use crate::infrastructure::fs::session_archive::SessionArchiveStore;

/// Per-status counts over an archive directory, windowed by age.
#[derive(Debug, Clone, Default)]
pub struct ArchiveStats {
    pub total: usize,
    pub invalid: usize,
    pub by_status: HashMap<String, usize>,
    pub window_days: Option<i64>,
}

/// Summarize one archive directory's entries, optionally restricted to the
/// last `window_days` and/or one status value.
pub async fn stats(
    store: &SessionArchiveStore,
    window_days: Option<i64>,
    status_filter: Option<&str>,
    now: DateTime<Utc>,
) -> AcloResult<ArchiveStats> {
    let entries = store.list_entries().await?;
    let cutoff = window_days.map(|days| now - chrono::Duration::days(days));

    let mut out = ArchiveStats { window_days, ..Default::default() };
    for entry in &entries {
        if let Some(cutoff) = cutoff {
            if entry.modified_at() < cutoff {
                continue;
            }
        }
        match entry {
            ArchiveEntry::Valid { envelope, .. } => {
                if let Some(filter) = status_filter {
                    if envelope.status != filter {
                        continue;
                    }
                }
                out.total += 1;
                *out.by_status.entry(envelope.status.clone()).or_insert(0) += 1;
            }
            ArchiveEntry::Invalid { .. } => {
                if status_filter.is_none() {
                    out.total += 1;
                    out.invalid += 1;
                }
            }
        }
    }
    Ok(out)
}

/// Generic retention prune: keep the newest `keep` files, drop anything
/// beyond that older than `older_than_days`, never touch `current_file`
///
pub async fn prune(
    store: &SessionArchiveStore,
    keep: usize,
    older_than_days: i64,
    current_file: Option<&str>,
    now: DateTime<Utc>,
    dry_run: bool,
) -> AcloResult<PruneResult> {
    store.prune(keep, older_than_days, current_file, now, dry_run).await
}

/// Which of `close-loop`, `batch`, `controller` session kinds reference
/// `spec_id` within `protect_window_days`.
async fn referenced_recently(store: &SessionArchiveStore, spec_id: &str, cutoff: DateTime<Utc>) -> AcloResult<bool> {
    let entries = store.list_entries().await?;
    Ok(entries.iter().any(|entry| match entry {
        ArchiveEntry::Valid { envelope, modified_at, .. } => {
            *modified_at >= cutoff && envelope.payload.get("specId").and_then(|v| v.as_str()) == Some(spec_id)
        }
        ArchiveEntry::Invalid { .. } => false,
    }))
}

/// Classify protection for every spec returned by a [`SpecSessionReader`]
/// scan, consulting collaboration status and the three session archives.
/// Callers pair this with their own deletion of unprotected
/// spec workdirs — this module only decides, it never deletes specs.
pub async fn classify_specs(
    entries: &[SpecSessionEntry],
    close_loop: &SessionArchiveStore,
    batch: &SessionArchiveStore,
    controller: &SessionArchiveStore,
    collaboration: &dyn CollaborationMetadataReader,
    protect_window_days: i64,
    caller_protected: &[String],
    now: DateTime<Utc>,
) -> AcloResult<Vec<SpecProtectionEntry>> {
    let cutoff = now - chrono::Duration::days(protect_window_days);
    let mut classified = Vec::with_capacity(entries.len());

    for entry in entries {
        let status = collaboration.read_status(&entry.spec_id).await?;
        let collaboration_status = status.as_ref().map(|s| s.current.as_str());
        let referenced_close_loop = referenced_recently(close_loop, &entry.spec_id, cutoff).await?;
        let referenced_batch = referenced_recently(batch, &entry.spec_id, cutoff).await?;
        let referenced_controller = referenced_recently(controller, &entry.spec_id, cutoff).await?;
        let is_caller_protected = caller_protected.iter().any(|id| id == &entry.spec_id);

        classified.push(classify_protection(
            &entry.spec_id,
            collaboration_status,
            referenced_close_loop,
            referenced_batch,
            referenced_controller,
            is_caller_protected,
        ));
    }

    Ok(classified)
}

/// Convenience constructor for the three archive stores a controller drain
/// cycle and spec-session prune both need.
pub fn open_all(workspace_root: &std::path::Path) -> [SessionArchiveStore; 4] {
    [
        SessionArchiveStore::new(workspace_root, SessionKind::CloseLoop),
        SessionArchiveStore::new(workspace_root, SessionKind::Batch),
        SessionArchiveStore::new(workspace_root, SessionKind::Controller),
        SessionArchiveStore::new(workspace_root, SessionKind::Governance),
    ]
}
