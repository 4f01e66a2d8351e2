//! Evidence & KPI pipeline.
//!
//! Scans the batch and controller session archives into period buckets,
//! flags anomalies against the rolling baseline, merges per-run evidence
//! into a release-evidence ledger, and indexes `release-gate-*.json`
//! history. All three operations are pure aggregation over already-written
//! archive JSON — nothing here mutates program state.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::errors::AcloResult;
use crate::domain::models::kpi::{
    detect_anomalies, Anomaly, EvidenceWindowAggregate, GateHistoryEntry, RegressionComparison, ReleaseEvidenceEntry,
    RiskLayer, TrendBucket, TrendMode, TrendPeriod, DEFAULT_GATE_HISTORY_LIMIT,
};
use crate::domain::models::session::ArchiveEntry;
use crate::infrastructure::fs::session_archive::SessionArchiveStore;

fn numeric(payload: &Value, key: &str) -> f64 {
    payload.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn session_mode(payload: &Value) -> String {
    payload.get("mode").and_then(Value::as_str).unwrap_or("unknown").to_string()
}

fn mode_matches(mode: TrendMode, envelope_mode: &str) -> bool {
    match mode {
        TrendMode::All => true,
        TrendMode::Batch => envelope_mode == "batch",
        TrendMode::Program => envelope_mode == "program",
        TrendMode::Recover => envelope_mode == "recover",
        TrendMode::Controller => envelope_mode == "controller",
    }
}

struct RunSample {
    period_key: String,
    completed: bool,
    gate_passed: bool,
    success_rate_percent: f64,
    completion_rate_percent: f64,
    failed_goals: f64,
    total_sub_specs: f64,
    estimated_spec_created: f64,
    rate_limit_signals: f64,
    rate_limit_backoff_ms: f64,
}

fn sample_from_envelope(modified_at: DateTime<Utc>, payload: &Value, period: TrendPeriod) -> RunSample {
    let period_key = match period {
        TrendPeriod::Week => TrendBucket::week_key(modified_at),
        TrendPeriod::Day => TrendBucket::day_key(modified_at),
    };
    let completed_goals = numeric(payload, "completedGoals").max(numeric(payload, "completed_goals"));
    let total_goals = numeric(payload, "totalGoals").max(numeric(payload, "total_goals")).max(1.0);
    let failed_goals = numeric(payload, "failedGoals").max(numeric(payload, "failed_goals"));

    RunSample {
        period_key,
        completed: failed_goals == 0.0,
        gate_passed: payload.get("gatePassed").and_then(Value::as_bool).unwrap_or(failed_goals == 0.0),
        success_rate_percent: 100.0 * completed_goals / total_goals,
        completion_rate_percent: 100.0 * completed_goals / total_goals,
        failed_goals,
        total_sub_specs: numeric(payload, "totalSubSpecs").max(numeric(payload, "total_sub_specs")),
        estimated_spec_created: numeric(payload, "estimatedSpecCreated").max(numeric(payload, "estimated_spec_created")),
        rate_limit_signals: numeric(payload, "rateLimitSignals").max(numeric(payload, "rate_limit_signals")),
        rate_limit_backoff_ms: numeric(payload, "rateLimitBackoffMs").max(numeric(payload, "rate_limit_backoff_ms")),
    }
}

/// Scan `batch` + `controller` archives within `window_days`, bucket by
/// `period`, and aggregate
/// already-flattened nested summaries rather than re-reading the batch
/// archive they reference — the controller writes its own per-cycle totals.
pub async fn scan_trend(
    batch_archive: &SessionArchiveStore,
    controller_archive: &SessionArchiveStore,
    period: TrendPeriod,
    window_days: i64,
    mode: TrendMode,
    now: DateTime<Utc>,
) -> AcloResult<Vec<TrendBucket>> {
    let cutoff = now - chrono::Duration::days(window_days);
    let mut samples = Vec::new();

    for archive in [batch_archive, controller_archive] {
        for entry in archive.list_entries().await? {
            let ArchiveEntry::Valid { envelope, modified_at, .. } = entry else { continue };
            if modified_at < cutoff {
                continue;
            }
            if !mode_matches(mode, &session_mode(&envelope.payload)) {
                continue;
            }
            samples.push(sample_from_envelope(modified_at, &envelope.payload, period));
        }
    }

    let mut grouped: HashMap<String, Vec<RunSample>> = HashMap::new();
    for sample in samples {
        grouped.entry(sample.period_key.clone()).or_default().push(sample);
    }

    let mut buckets: Vec<TrendBucket> = grouped
        .into_iter()
        .map(|(period_key, runs)| {
            let n = runs.len() as f64;
            TrendBucket {
                period_key,
                runs: runs.len() as u32,
                completed_runs: runs.iter().filter(|r| r.completed).count() as u32,
                gate_passed_runs: runs.iter().filter(|r| r.gate_passed).count() as u32,
                success_rate_percent: runs.iter().map(|r| r.success_rate_percent).sum::<f64>() / n,
                completion_rate_percent: runs.iter().map(|r| r.completion_rate_percent).sum::<f64>() / n,
                avg_failed_goals: runs.iter().map(|r| r.failed_goals).sum::<f64>() / n,
                avg_total_sub_specs: runs.iter().map(|r| r.total_sub_specs).sum::<f64>() / n,
                avg_estimated_spec_created: runs.iter().map(|r| r.estimated_spec_created).sum::<f64>() / n,
                avg_rate_limit_signals: runs.iter().map(|r| r.rate_limit_signals).sum::<f64>() / n,
                avg_rate_limit_backoff_ms: runs.iter().map(|r| r.rate_limit_backoff_ms).sum::<f64>() / n,
            }
        })
        .collect();

    buckets.sort_by(|a, b| a.period_key.cmp(&b.period_key));
    Ok(buckets)
}

/// Anomalies over a trend scan; a thin pass-through to the
/// pure domain comparator, kept here so callers only import one module.
pub fn anomalies(buckets: &[TrendBucket]) -> Vec<Anomaly> {
    detect_anomalies(buckets)
}

/// Merge a new release-evidence entry into the existing ledger, keeping it
/// sorted by `merged_at` descending.
pub fn merge_release_evidence(mut existing: Vec<ReleaseEvidenceEntry>, new_entry: ReleaseEvidenceEntry) -> Vec<ReleaseEvidenceEntry> {
    existing.retain(|entry| entry.session_id != new_entry.session_id);
    existing.push(new_entry);
    existing.sort_by(|a, b| b.merged_at.cmp(&a.merged_at));
    existing
}

/// Regression comparison between the selected session and the one
/// immediately before it in the sorted ledger.
pub fn regression_comparison(entries: &[ReleaseEvidenceEntry], selected_session_id: &str) -> RegressionComparison {
    let Some(selected_index) = entries.iter().position(|e| e.session_id == selected_session_id) else {
        return RegressionComparison { previous_session_id: None, success_rate_delta: 0.0, improved: false };
    };
    match entries.get(selected_index + 1) {
        Some(previous) => {
            let delta = entries[selected_index].success_rate_percent - previous.success_rate_percent;
            RegressionComparison { previous_session_id: Some(previous.session_id.clone()), success_rate_delta: delta, improved: delta >= 0.0 }
        }
        None => RegressionComparison { previous_session_id: None, success_rate_delta: 0.0, improved: true },
    }
}

/// Aggregate window statistics over the full evidence ledger.
pub fn evidence_window(entries: &[ReleaseEvidenceEntry]) -> EvidenceWindowAggregate {
    EvidenceWindowAggregate::compute(entries)
}

/// Scan `release-gate-*.json` files in `dir`, merge with `seed_history`,
/// sort newest first, and keep the newest `limit` entries.
pub async fn gate_history_index(dir: &Path, seed_history: Vec<GateHistoryEntry>, limit: Option<usize>) -> AcloResult<Vec<GateHistoryEntry>> {
    let mut entries = seed_history;

    if dir.exists() {
        let mut read_dir = tokio::fs::read_dir(dir)
            .await
            .map_err(|source| crate::domain::errors::AcloError::io(dir.to_path_buf(), source))?;
        while let Some(dir_entry) =
            read_dir.next_entry().await.map_err(|source| crate::domain::errors::AcloError::io(dir.to_path_buf(), source))?
        {
            let path = dir_entry.path();
            let file_name = dir_entry.file_name().to_string_lossy().to_string();
            if !file_name.starts_with("release-gate-") || file_name == "release-gate-history.json" {
                continue;
            }
            let Ok(raw) = tokio::fs::read_to_string(&path).await else { continue };
            let Ok(value) = serde_json::from_str::<Value>(&raw) else { continue };
            let Some(entry) = parse_gate_history_entry(&value) else { continue };
            entries.push(entry);
        }
    }

    entries.sort_by(|a, b| b.evaluated_at.cmp(&a.evaluated_at));
    let cap = limit.unwrap_or(DEFAULT_GATE_HISTORY_LIMIT);
    entries.truncate(cap);
    Ok(entries)
}

fn parse_gate_history_entry(value: &Value) -> Option<GateHistoryEntry> {
    let session_id = value.get("sessionId").or_else(|| value.get("session_id"))?.as_str()?.to_string();
    let evaluated_at_raw = value.get("evaluatedAt").or_else(|| value.get("evaluated_at"))?.as_str()?;
    let evaluated_at = DateTime::parse_from_rfc3339(evaluated_at_raw).ok()?.with_timezone(&Utc);
    let passed = value.get("passed")?.as_bool()?;
    let risk_layer = match value.get("riskLayer").or_else(|| value.get("risk_layer")).and_then(Value::as_str) {
        Some("low") => RiskLayer::Low,
        Some("medium") => RiskLayer::Medium,
        Some("high") => RiskLayer::High,
        _ => RiskLayer::Unknown,
    };
    let scene_batch_pass = value.get("sceneBatchPass").or_else(|| value.get("scene_batch_pass")).and_then(Value::as_bool);

    Some(GateHistoryEntry { session_id, evaluated_at, passed, risk_layer, scene_batch_pass })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(session_id: &str, merged_at: DateTime<Utc>, success_rate: f64) -> ReleaseEvidenceEntry {
        ReleaseEvidenceEntry { session_id: session_id.to_string(), merged_at, success_rate_percent: success_rate, risk_layer: RiskLayer::Low }
    }

    #[test]
    fn merge_replaces_same_session_id_and_sorts_desc() {
        let now = Utc::now();
        let ledger = vec![entry("a", now - chrono::Duration::days(1), 80.0)];
        let merged = merge_release_evidence(ledger, entry("b", now, 90.0));
        assert_eq!(merged[0].session_id, "b");
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn regression_comparison_flags_improvement() {
        let now = Utc::now();
        let ledger = vec![entry("b", now, 90.0), entry("a", now - chrono::Duration::days(1), 80.0)];
        let comparison = regression_comparison(&ledger, "b");
        assert_eq!(comparison.previous_session_id.as_deref(), Some("a"));
        assert!(comparison.improved);
    }

    #[test]
    fn evidence_window_buckets_risk_layers() {
        let now = Utc::now();
        let ledger = vec![entry("a", now, 100.0)];
        let window = evidence_window(&ledger);
        assert_eq!(window.low_count, 1);
    }
}
