//! Evidence-trend scanning and archive pruning against real archive
//! directories, the surfaces `aclo evidence trend` and `aclo archive`
//! read and write.

use chrono::Utc;
use serde_json::json;

use aclo::domain::models::kpi::{TrendMode, TrendPeriod};
use aclo::domain::models::session::{SessionEnvelope, SessionKind, SessionRef};
use aclo::infrastructure::fs::session_archive::SessionArchiveStore;
use aclo::services::evidence_kpi::{anomalies, scan_trend};
use aclo::services::session_archive::{prune, stats};

fn envelope(mode: &str, completed: usize, failed: usize, now: chrono::DateTime<Utc>) -> SessionEnvelope {
    SessionEnvelope::new(
        "batch",
        if failed == 0 { "completed" } else { "partial-failed" },
        SessionRef { id: "s".into(), file: "s.json".into() },
        now,
        json!({ "mode": mode, "completedGoals": completed, "totalGoals": completed + failed, "failedGoals": failed }),
    )
}

#[tokio::test]
async fn scan_trend_buckets_by_week_and_flags_no_anomaly_on_uniform_data() {
    let dir = tempfile::tempdir().unwrap();
    let batch_archive = SessionArchiveStore::new(dir.path(), SessionKind::Batch);
    let controller_archive = SessionArchiveStore::new(dir.path(), SessionKind::Controller);
    let now = Utc::now();

    for i in 0..3 {
        let file = format!("batch-{i}.json");
        batch_archive.write(&file, &envelope("batch", 4, 0, now)).await.unwrap();
    }

    let buckets = scan_trend(&batch_archive, &controller_archive, TrendPeriod::Week, 30, TrendMode::All, now).await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].runs, 3);
    assert_eq!(buckets[0].completed_runs, 3);

    let found = anomalies(&buckets);
    assert!(found.is_empty());
}

#[tokio::test]
async fn stats_counts_by_status_within_window() {
    let dir = tempfile::tempdir().unwrap();
    let archive = SessionArchiveStore::new(dir.path(), SessionKind::Batch);
    let now = Utc::now();

    archive.write("a.json", &envelope("batch", 4, 0, now)).await.unwrap();
    archive.write("b.json", &envelope("batch", 2, 2, now)).await.unwrap();

    let result = stats(&archive, None, None, now).await.unwrap();
    assert_eq!(result.total, 2);
    assert_eq!(*result.by_status.get("completed").unwrap(), 1);
    assert_eq!(*result.by_status.get("partial-failed").unwrap(), 1);
}

#[tokio::test]
async fn prune_keeps_newest_and_never_deletes_current_file() {
    let dir = tempfile::tempdir().unwrap();
    let archive = SessionArchiveStore::new(dir.path(), SessionKind::Batch);
    let now = Utc::now();

    for i in 0..5 {
        archive.write(&format!("batch-{i}.json"), &envelope("batch", 1, 0, now - chrono::Duration::days(200))).await.unwrap();
    }

    let result = prune(&archive, 2, 30, Some("batch-0.json"), now, false).await.unwrap();
    assert!(result.kept.contains(&"batch-0.json".to_string()) || !result.deleted.contains(&"batch-0.json".to_string()));
    assert!(!result.deleted.contains(&"batch-0.json".to_string()));
    assert_eq!(result.kept.len() + result.deleted.len(), 5);
}
