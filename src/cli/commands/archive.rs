//! `aclo archive` — session archive statistics and retention pruning.

use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::commands::parse_session_kind;
use crate::cli::output::CommandOutput;
use crate::domain::models::prune::PruneResult;
use crate::domain::ports::clock::{Clock, SystemClock};
use crate::infrastructure::fs::session_archive::SessionArchiveStore;
use crate::services::session_archive::{prune, stats, ArchiveStats};

#[derive(Debug, Serialize)]
pub struct ArchiveStatsOutput {
    pub kind: String,
    pub total: usize,
    pub invalid: usize,
    pub by_status: std::collections::HashMap<String, usize>,
    pub window_days: Option<i64>,
}

impl CommandOutput for ArchiveStatsOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("kind: {}", self.kind), format!("total: {}", self.total), format!("invalid: {}", self.invalid)];
        let mut statuses: Vec<_> = self.by_status.iter().collect();
        statuses.sort_by_key(|(status, _)| status.to_string());
        lines.extend(statuses.into_iter().map(|(status, count)| format!("  {status}: {count}")));
        lines.join("\n")
    }

    fn to_json(&self) -> Value {
        json!(self)
    }
}

impl From<(&str, ArchiveStats)> for ArchiveStatsOutput {
    fn from((kind, stats): (&str, ArchiveStats)) -> Self {
        Self { kind: kind.to_string(), total: stats.total, invalid: stats.invalid, by_status: stats.by_status, window_days: stats.window_days }
    }
}

#[derive(Debug, Serialize)]
pub struct ArchivePruneOutput {
    pub kind: String,
    #[serde(flatten)]
    pub result: PruneResult,
}

impl CommandOutput for ArchivePruneOutput {
    fn to_human(&self) -> String {
        format!(
            "kind: {}\nkept: {}\ndeleted: {}\ndry_run: {}",
            self.kind,
            self.result.kept.len(),
            self.result.deleted.len(),
            self.result.dry_run
        )
    }

    fn to_json(&self) -> Value {
        json!(self)
    }
}

pub async fn handle_stats(
    workspace_root: &std::path::Path,
    kind: &str,
    window_days: Option<i64>,
    status: Option<String>,
    json_mode: bool,
) -> anyhow::Result<()> {
    let session_kind = parse_session_kind(kind)?;
    let store = SessionArchiveStore::new(workspace_root, session_kind);
    let now = SystemClock.now();
    let result = stats(&store, window_days, status.as_deref(), now).await?;
    let output = ArchiveStatsOutput::from((kind, result));
    crate::cli::output::output(&output, json_mode);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_prune(
    workspace_root: &std::path::Path,
    kind: &str,
    keep: usize,
    older_than_days: i64,
    current_file: Option<String>,
    dry_run: bool,
    json_mode: bool,
) -> anyhow::Result<()> {
    let session_kind = parse_session_kind(kind)?;
    let store = SessionArchiveStore::new(workspace_root, session_kind);
    let now = SystemClock.now();
    let result = prune(&store, keep, older_than_days, current_file.as_deref(), now, dry_run).await?;
    let output = ArchivePruneOutput { kind: kind.to_string(), result };
    crate::cli::output::output(&output, json_mode);
    Ok(())
}
