//! Goal Store & Queue service.
//!
//! Thin orchestration atop [`infrastructure::fs::GoalQueueStore`] and
//! [`infrastructure::fs::QueueLease`]: load-with-lease, dequeue-and-persist,
//! and the dedupe-rewrite path the controller runs each cycle.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::domain::errors::AcloResult;
use crate::domain::models::Goal;
use crate::infrastructure::fs::goal_queue::{GoalQueueStore, LoadedQueue, QueueFormat};
use crate::infrastructure::fs::queue_lock::QueueLease;

/// Result of one controller-cycle dequeue.
pub struct DequeueOutcome {
    pub dequeued: Vec<Goal>,
    pub dedupe_dropped: u32,
    pub pending_after: usize,
}

/// Service-layer facade over the goal queue file, acquiring the advisory
/// lease for the duration of any mutating operation.
pub struct GoalStore {
    queue_path: PathBuf,
    queue_lock_ttl_seconds: u64,
}

impl GoalStore {
    pub fn new(queue_path: impl Into<PathBuf>, queue_lock_ttl_seconds: u64) -> Self {
        Self { queue_path: queue_path.into(), queue_lock_ttl_seconds }
    }

    pub fn queue_path(&self) -> &Path {
        &self.queue_path
    }

    /// Load the queue without acquiring the lease (read-only callers, e.g.
    /// evidence aggregation over a historical queue snapshot).
    pub async fn load(&self, dedupe: bool) -> AcloResult<LoadedQueue> {
        GoalQueueStore::load(&self.queue_path, None, dedupe).await
    }

    /// Acquire the lease, optionally dedupe-and-rewrite, dequeue up to
    /// `dequeue_limit` goals (`None` = all), persist the remainder, then
    /// release the lease.
    pub async fn dequeue(&self, dedupe: bool, dequeue_limit: Option<usize>) -> AcloResult<DequeueOutcome> {
        let now = Utc::now();
        let lease = QueueLease::acquire(&self.queue_path, self.queue_lock_ttl_seconds, now).await?;

        let loaded = GoalQueueStore::load(&self.queue_path, None, dedupe).await?;
        let take = dequeue_limit.unwrap_or(loaded.goals.len()).min(loaded.goals.len());

        let mut remaining = loaded.goals;
        let dequeued: Vec<Goal> = remaining.drain(..take).collect();

        lease.refresh(Utc::now()).await?;
        GoalQueueStore::save(&self.queue_path, loaded.format, &remaining).await?;
        lease.release().await?;

        Ok(DequeueOutcome { dequeued, dedupe_dropped: loaded.duplicate_count, pending_after: remaining.len() })
    }

    /// `loadQueue` with explicit format, exposed for CLI flags that pin a
    /// format instead of relying on suffix auto-detection.
    pub async fn load_with_format(&self, format: QueueFormat, dedupe: bool) -> AcloResult<LoadedQueue> {
        GoalQueueStore::load(&self.queue_path, Some(format), dedupe).await
    }
}
