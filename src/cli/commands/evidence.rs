//! `aclo evidence` — trend and anomaly reporting over the batch/controller archives.

use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::commands::{parse_trend_mode, parse_trend_period};
use crate::cli::output::CommandOutput;
use crate::domain::models::kpi::{Anomaly, TrendBucket};
use crate::domain::models::session::SessionKind;
use crate::domain::ports::clock::{Clock, SystemClock};
use crate::infrastructure::fs::session_archive::SessionArchiveStore;
use crate::services::evidence_kpi::{anomalies, scan_trend};

#[derive(Debug, Serialize)]
pub struct EvidenceTrendOutput {
    pub buckets: Vec<TrendBucket>,
    pub anomalies: Vec<Anomaly>,
}

impl CommandOutput for EvidenceTrendOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        for bucket in &self.buckets {
            lines.push(format!(
                "{}: runs={} completed={} gate_passed={} success_rate={:.1}%",
                bucket.period_key, bucket.runs, bucket.completed_runs, bucket.gate_passed_runs, bucket.success_rate_percent
            ));
        }
        if !self.anomalies.is_empty() {
            lines.push("anomalies:".to_string());
            for anomaly in &self.anomalies {
                lines.push(format!("  {anomaly:?}"));
            }
        }
        if lines.is_empty() {
            lines.push("no samples in window".to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> Value {
        json!(self)
    }
}

pub async fn handle_trend(
    workspace_root: &std::path::Path,
    period: &str,
    window_days: i64,
    mode: &str,
    json_mode: bool,
) -> anyhow::Result<()> {
    let period = parse_trend_period(period)?;
    let mode = parse_trend_mode(mode)?;
    let batch_archive = SessionArchiveStore::new(workspace_root, SessionKind::Batch);
    let controller_archive = SessionArchiveStore::new(workspace_root, SessionKind::Controller);
    let now = SystemClock.now();

    let buckets = scan_trend(&batch_archive, &controller_archive, period, window_days, mode, now).await?;
    let found_anomalies = anomalies(&buckets);

    let output = EvidenceTrendOutput { buckets, anomalies: found_anomalies };
    crate::cli::output::output(&output, json_mode);
    Ok(())
}
