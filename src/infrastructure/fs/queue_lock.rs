//! Advisory queue lease lock.
//!
//! `<queue>.lock` holds `{token, pid, host, acquired_at, touched_at}`.
//! Acquisition is exclusive-create; on collision, a lease whose
//! `touched_at` is older than the configured TTL is stolen and recreated,
//! otherwise acquisition fails with the current holder's identity so the
//! caller can surface it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{AcloError, AcloResult};

use super::write_atomic;

/// On-disk lease payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub token: String,
    pub pid: u32,
    pub host: String,
    pub acquired_at: DateTime<Utc>,
    pub touched_at: DateTime<Utc>,
}

/// A held lease over `<queue>.lock`. Holding one is the only thing that
/// authorizes writes to the goal queue file.
pub struct QueueLease {
    lock_path: PathBuf,
    token: String,
}

impl QueueLease {
    /// Acquire the lease for `queue_path`, stealing a stale holder whose
    /// `touched_at` predates `now - ttl_seconds`.
    pub async fn acquire(queue_path: &Path, ttl_seconds: u64, now: DateTime<Utc>) -> AcloResult<Self> {
        let lock_path = Self::lock_path(queue_path);

        if let Some(existing) = Self::read(&lock_path).await? {
            let stale_cutoff = now - chrono::Duration::seconds(ttl_seconds as i64);
            if existing.touched_at >= stale_cutoff {
                return Err(AcloError::LeaseLost(format!(
                    "queue locked by pid {} on {} since {}",
                    existing.pid, existing.host, existing.acquired_at
                )));
            }
        }

        let token = Uuid::new_v4().to_string();
        let record = LeaseRecord {
            token: token.clone(),
            pid: std::process::id(),
            host: hostname(),
            acquired_at: now,
            touched_at: now,
        };
        Self::write(&lock_path, &record).await?;
        Ok(Self { lock_path, token })
    }

    /// Rewrite `touched_at`, failing if another process has stolen the
    /// lease since acquisition.
    pub async fn refresh(&self, now: DateTime<Utc>) -> AcloResult<()> {
        let current = Self::read(&self.lock_path).await?;
        match current {
            Some(record) if record.token == self.token => {
                let refreshed = LeaseRecord { touched_at: now, ..record };
                Self::write(&self.lock_path, &refreshed).await
            }
            _ => Err(AcloError::LeaseLost(format!("lease token lost for {}", self.lock_path.display()))),
        }
    }

    /// Remove the lock file only if the token on disk still matches ours.
    pub async fn release(self) -> AcloResult<()> {
        match Self::read(&self.lock_path).await? {
            Some(record) if record.token == self.token => {
                match tokio::fs::remove_file(&self.lock_path).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(AcloError::io(self.lock_path.display().to_string(), e)),
                }
            }
            _ => Ok(()),
        }
    }

    fn lock_path(queue_path: &Path) -> PathBuf {
        let mut name = queue_path.file_name().map_or_else(|| "queue".to_string(), |n| n.to_string_lossy().to_string());
        name.push_str(".lock");
        queue_path.with_file_name(name)
    }

    async fn read(lock_path: &Path) -> AcloResult<Option<LeaseRecord>> {
        if !lock_path.exists() {
            return Ok(None);
        }
        let raw = tokio::fs::read_to_string(lock_path)
            .await
            .map_err(|e| AcloError::io(lock_path.display().to_string(), e))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn write(lock_path: &Path, record: &LeaseRecord) -> AcloResult<()> {
        let serialized = serde_json::to_string_pretty(record)?;
        write_atomic(lock_path, &serialized).await
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn acquire_creates_lock_file() {
        let dir = tempdir().unwrap();
        let queue_path = dir.path().join("goals.lines");
        let lease = QueueLease::acquire(&queue_path, 1800, Utc::now()).await.unwrap();
        assert!(QueueLease::lock_path(&queue_path).exists());
        lease.release().await.unwrap();
    }

    #[tokio::test]
    async fn second_acquire_fails_while_fresh() {
        let dir = tempdir().unwrap();
        let queue_path = dir.path().join("goals.lines");
        let now = Utc::now();
        let _lease = QueueLease::acquire(&queue_path, 1800, now).await.unwrap();

        let result = QueueLease::acquire(&queue_path, 1800, now).await;
        assert!(matches!(result, Err(AcloError::LeaseLost(_))));
    }

    #[tokio::test]
    async fn stale_lease_is_stolen() {
        let dir = tempdir().unwrap();
        let queue_path = dir.path().join("goals.lines");
        let acquired_at = Utc::now() - chrono::Duration::seconds(7200);
        let _first = QueueLease::acquire(&queue_path, 1800, acquired_at).await.unwrap();

        let second = QueueLease::acquire(&queue_path, 1800, Utc::now()).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn release_removes_lock_only_with_matching_token() {
        let dir = tempdir().unwrap();
        let queue_path = dir.path().join("goals.lines");
        let now = Utc::now();
        let lease = QueueLease::acquire(&queue_path, 1800, now).await.unwrap();
        let lock_path = QueueLease::lock_path(&queue_path);

        let stolen = LeaseRecord {
            token: "someone-elses-token".into(),
            pid: 999,
            host: "other-host".into(),
            acquired_at: now,
            touched_at: now,
        };
        QueueLease::write(&lock_path, &stolen).await.unwrap();

        lease.release().await.unwrap();
        assert!(lock_path.exists());
    }

    #[tokio::test]
    async fn refresh_updates_touched_at() {
        let dir = tempdir().unwrap();
        let queue_path = dir.path().join("goals.lines");
        let now = Utc::now();
        let lease = QueueLease::acquire(&queue_path, 1800, now).await.unwrap();

        let later = now + chrono::Duration::seconds(60);
        lease.refresh(later).await.unwrap();

        let record = QueueLease::read(&QueueLease::lock_path(&queue_path)).await.unwrap().unwrap();
        assert_eq!(record.touched_at, later);
    }
}
