//! Filesystem-backed adapters for the domain ports and the workspace
//! persistence surfaces named in("Workspace layout").
//!
//! Every write in this module is "write to a temp file, then rename" so a
//! crash mid-write never leaves a half-written JSON file behind for the
//! next reader to choke on.

pub mod goal_queue;
pub mod queue_lock;
pub mod recovery_store;
pub mod session_archive;

pub use goal_queue::GoalQueueStore;
pub use queue_lock::QueueLease;
pub use recovery_store::RecoveryMemoryStore;
pub use session_archive::SessionArchiveStore;

use std::path::Path;

use crate::domain::errors::{AcloError, AcloResult};

/// Write `contents` to `path` atomically: write to a sibling `.tmp` file,
/// then rename over the destination.
pub(crate) async fn write_atomic(path: &Path, contents: &str) -> AcloResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AcloError::io(parent.display().to_string(), e))?;
    }
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| AcloError::io(tmp_path.display().to_string(), e))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| AcloError::io(path.display().to_string(), e))?;
    Ok(())
}
