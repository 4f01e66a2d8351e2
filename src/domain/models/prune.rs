//! Session-archive and spec-session pruning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of pruning one session-archive directory:
/// keep the newest `keep` files, delete only files older than the cutoff,
/// never delete `current_file`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PruneResult {
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
    pub dry_run: bool,
}

/// Decide which of a mtime-sorted-descending file list to delete.
///
/// `keep` newest files always survive; beyond that, a file is deleted only
/// if it is older than `older_than_days` and is not `current_file`
///
pub fn plan_prune(
    files_by_mtime_desc: &[(String, DateTime<Utc>)],
    keep: usize,
    older_than_days: i64,
    current_file: Option<&str>,
    now: DateTime<Utc>,
    dry_run: bool,
) -> PruneResult {
    let cutoff = now - chrono::Duration::days(older_than_days);
    let mut result = PruneResult { dry_run, ..Default::default() };

    for (index, (name, modified_at)) in files_by_mtime_desc.iter().enumerate() {
        let is_current = current_file.is_some_and(|current| current == name);
        let within_keep = index < keep;
        if is_current || within_keep || *modified_at >= cutoff {
            result.kept.push(name.clone());
        } else {
            result.deleted.push(name.clone());
        }
    }
    result
}

/// Reason a spec workdir was protected from deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionReason {
    NonCompletedCollaborationStatus,
    ReferencedByRecentCloseLoopSession,
    ReferencedByRecentBatchSession,
    ReferencedByRecentControllerSession,
    CallerRequested,
}

/// Per-spec protection tally used to rank why a spec survived pruning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecProtectionEntry {
    pub spec_id: String,
    pub reasons: Vec<ProtectionReason>,
}

impl SpecProtectionEntry {
    pub fn protected(&self) -> bool {
        !self.reasons.is_empty()
    }
}

/// Decide whether one spec workdir is protected, given its collaboration
/// status, whether it is referenced by a recent session of each kind within
/// `protect_window_days`, and the caller's additional protect list.
/// Missing collaboration metadata is treated as active — a
/// spec is never unsafely deleted just because its metadata is absent.
pub fn classify_protection(
    spec_id: &str,
    collaboration_status: Option<&str>,
    referenced_by_close_loop: bool,
    referenced_by_batch: bool,
    referenced_by_controller: bool,
    caller_protected: bool,
) -> SpecProtectionEntry {
    let mut entry = SpecProtectionEntry { spec_id: spec_id.to_string(), reasons: Vec::new() };

    let non_completed = match collaboration_status {
        Some("completed") => false,
        _ => true,
    };
    if non_completed {
        entry.reasons.push(ProtectionReason::NonCompletedCollaborationStatus);
    }
    if referenced_by_close_loop {
        entry.reasons.push(ProtectionReason::ReferencedByRecentCloseLoopSession);
    }
    if referenced_by_batch {
        entry.reasons.push(ProtectionReason::ReferencedByRecentBatchSession);
    }
    if referenced_by_controller {
        entry.reasons.push(ProtectionReason::ReferencedByRecentControllerSession);
    }
    if caller_protected {
        entry.reasons.push(ProtectionReason::CallerRequested);
    }
    entry
}
