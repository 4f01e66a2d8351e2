//! Evidence and KPI pipeline data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::governance::AnomalySeverity;

/// Bucketing period for trend aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendPeriod {
    Week,
    Day,
}

/// Which session kinds a trend scan considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMode {
    All,
    Batch,
    Program,
    Recover,
    Controller,
}

/// One period bucket's aggregated KPIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendBucket {
    /// `YYYY-Www` for week buckets, `YYYY-MM-DD` for day buckets.
    pub period_key: String,
    pub runs: u32,
    pub completed_runs: u32,
    pub gate_passed_runs: u32,
    pub success_rate_percent: f64,
    pub completion_rate_percent: f64,
    pub avg_failed_goals: f64,
    pub avg_total_sub_specs: f64,
    pub avg_estimated_spec_created: f64,
    pub avg_rate_limit_signals: f64,
    pub avg_rate_limit_backoff_ms: f64,
}

impl TrendBucket {
    /// Week key: ISO week `YYYY-Www`.
    pub fn week_key(date: DateTime<Utc>) -> String {
        let iso = date.iso_week();
        format!("{}-W{:02}", iso.year(), iso.week())
    }

    /// Day key: `YYYY-MM-DD`.
    pub fn day_key(date: DateTime<Utc>) -> String {
        date.format("%Y-%m-%d").to_string()
    }
}

/// A single anomaly type that can be detected between the last bucket and
/// the baseline of prior buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    SuccessRateDrop,
    FailedGoalsSpike,
    SpecGrowthSpike,
    RateLimitSignalSpike,
}

impl AnomalyType {
    /// `(medium_threshold, high_threshold)` deltas
    pub const fn thresholds(self) -> (f64, f64) {
        match self {
            Self::SuccessRateDrop => (20.0, 35.0),
            Self::FailedGoalsSpike => (2.0, 4.0),
            Self::SpecGrowthSpike => (3.0, 6.0),
            Self::RateLimitSignalSpike => (1.0, 2.0),
        }
    }

    /// Classify a delta's severity, or `None` if below the medium threshold.
    pub fn classify(self, delta: f64) -> Option<AnomalySeverity> {
        let (medium, high) = self.thresholds();
        if delta >= high {
            Some(AnomalySeverity::High)
        } else if delta >= medium {
            Some(AnomalySeverity::Medium)
        } else {
            None
        }
    }
}

/// One detected anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyType,
    pub severity: AnomalySeverity,
    pub period: String,
    pub metric: String,
    pub baseline_value: f64,
    pub latest_value: f64,
    pub delta: f64,
    pub explain: String,
}

/// Detect anomalies between the baseline (average of all but the last
/// bucket) and the latest bucket. Requires at least 2 buckets.
pub fn detect_anomalies(buckets: &[TrendBucket]) -> Vec<Anomaly> {
    if buckets.len() < 2 {
        return Vec::new();
    }
    let (history, latest) = buckets.split_at(buckets.len() - 1);
    let latest = &latest[0];
    let n = history.len() as f64;

    let baseline_success = history.iter().map(|b| b.success_rate_percent).sum::<f64>() / n;
    let baseline_failed = history.iter().map(|b| b.avg_failed_goals).sum::<f64>() / n;
    let baseline_spec_growth = history.iter().map(|b| b.avg_estimated_spec_created).sum::<f64>() / n;
    let baseline_rate_limit = history.iter().map(|b| b.avg_rate_limit_signals).sum::<f64>() / n;

    let mut anomalies = Vec::new();

    let success_drop = baseline_success - latest.success_rate_percent;
    if let Some(severity) = AnomalyType::SuccessRateDrop.classify(success_drop) {
        anomalies.push(Anomaly {
            kind: AnomalyType::SuccessRateDrop,
            severity,
            period: latest.period_key.clone(),
            metric: "success_rate_percent".into(),
            baseline_value: baseline_success,
            latest_value: latest.success_rate_percent,
            delta: success_drop,
            explain: format!("success rate dropped {success_drop:.1} points vs baseline"),
        });
    }

    let failed_spike = latest.avg_failed_goals - baseline_failed;
    if let Some(severity) = AnomalyType::FailedGoalsSpike.classify(failed_spike) {
        anomalies.push(Anomaly {
            kind: AnomalyType::FailedGoalsSpike,
            severity,
            period: latest.period_key.clone(),
            metric: "avg_failed_goals".into(),
            baseline_value: baseline_failed,
            latest_value: latest.avg_failed_goals,
            delta: failed_spike,
            explain: format!("avg failed goals rose {failed_spike:.1} vs baseline"),
        });
    }

    let growth_spike = latest.avg_estimated_spec_created - baseline_spec_growth;
    if let Some(severity) = AnomalyType::SpecGrowthSpike.classify(growth_spike) {
        anomalies.push(Anomaly {
            kind: AnomalyType::SpecGrowthSpike,
            severity,
            period: latest.period_key.clone(),
            metric: "avg_estimated_spec_created".into(),
            baseline_value: baseline_spec_growth,
            latest_value: latest.avg_estimated_spec_created,
            delta: growth_spike,
            explain: format!("spec creation rate rose {growth_spike:.1} vs baseline"),
        });
    }

    let rate_limit_spike = latest.avg_rate_limit_signals - baseline_rate_limit;
    if let Some(severity) = AnomalyType::RateLimitSignalSpike.classify(rate_limit_spike) {
        anomalies.push(Anomaly {
            kind: AnomalyType::RateLimitSignalSpike,
            severity,
            period: latest.period_key.clone(),
            metric: "avg_rate_limit_signals".into(),
            baseline_value: baseline_rate_limit,
            latest_value: latest.avg_rate_limit_signals,
            delta: rate_limit_spike,
            explain: format!("rate-limit signals rose {rate_limit_spike:.1} vs baseline"),
        });
    }

    anomalies
}

/// Risk layer bucketing used by release-evidence aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLayer {
    Low,
    Medium,
    High,
    Unknown,
}

/// One handoff run's contribution to `release-evidence.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseEvidenceEntry {
    pub session_id: String,
    pub merged_at: DateTime<Utc>,
    pub success_rate_percent: f64,
    pub risk_layer: RiskLayer,
}

/// Regression comparison between a selected session and the one before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionComparison {
    pub previous_session_id: Option<String>,
    pub success_rate_delta: f64,
    pub improved: bool,
}

/// Aggregate window statistics over a set of release-evidence entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceWindowAggregate {
    pub avg_success_rate_percent: f64,
    pub min_success_rate_percent: f64,
    pub max_success_rate_percent: f64,
    pub low_count: u32,
    pub medium_count: u32,
    pub high_count: u32,
    pub unknown_count: u32,
}

impl EvidenceWindowAggregate {
    pub fn compute(entries: &[ReleaseEvidenceEntry]) -> Self {
        if entries.is_empty() {
            return Self {
                avg_success_rate_percent: 0.0,
                min_success_rate_percent: 0.0,
                max_success_rate_percent: 0.0,
                low_count: 0,
                medium_count: 0,
                high_count: 0,
                unknown_count: 0,
            };
        }
        let rates: Vec<f64> = entries.iter().map(|e| e.success_rate_percent).collect();
        let avg = rates.iter().sum::<f64>() / rates.len() as f64;
        let min = rates.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = rates.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mut agg = Self {
            avg_success_rate_percent: avg,
            min_success_rate_percent: min,
            max_success_rate_percent: max,
            low_count: 0,
            medium_count: 0,
            high_count: 0,
            unknown_count: 0,
        };
        for entry in entries {
            match entry.risk_layer {
                RiskLayer::Low => agg.low_count += 1,
                RiskLayer::Medium => agg.medium_count += 1,
                RiskLayer::High => agg.high_count += 1,
                RiskLayer::Unknown => agg.unknown_count += 1,
            }
        }
        agg
    }
}

/// One entry scanned from a `release-gate-*.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateHistoryEntry {
    pub session_id: String,
    pub evaluated_at: DateTime<Utc>,
    pub passed: bool,
    pub risk_layer: RiskLayer,
    pub scene_batch_pass: Option<bool>,
}

/// Default newest-N cap for the gate history index.
pub const DEFAULT_GATE_HISTORY_LIMIT: usize = 200;
