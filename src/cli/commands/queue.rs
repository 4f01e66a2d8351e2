//! `aclo queue` — goal queue inspection and dequeue.

use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::output::CommandOutput;
use crate::services::goal_store::GoalStore;

#[derive(Debug, Serialize)]
pub struct QueueLoadOutput {
    pub pending: usize,
    pub duplicate_count: u32,
    pub goals: Vec<String>,
}

impl CommandOutput for QueueLoadOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("pending: {}", self.pending), format!("duplicates dropped: {}", self.duplicate_count)];
        lines.extend(self.goals.iter().map(|g| format!("- {g}")));
        lines.join("\n")
    }

    fn to_json(&self) -> Value {
        json!(self)
    }
}

#[derive(Debug, Serialize)]
pub struct QueueDequeueOutput {
    pub dequeued: Vec<String>,
    pub dedupe_dropped: u32,
    pub pending_after: usize,
}

impl CommandOutput for QueueDequeueOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("dequeued: {}", self.dequeued.len()), format!("pending after: {}", self.pending_after)];
        lines.extend(self.dequeued.iter().map(|g| format!("- {g}")));
        lines.join("\n")
    }

    fn to_json(&self) -> Value {
        json!(self)
    }
}

pub async fn handle_load(store: &GoalStore, dedupe: bool, json_mode: bool) -> anyhow::Result<()> {
    let loaded = store.load(dedupe).await?;
    let output = QueueLoadOutput {
        pending: loaded.goals.len(),
        duplicate_count: loaded.duplicate_count,
        goals: loaded.goals.iter().map(|g| g.as_str().to_string()).collect(),
    };
    crate::cli::output::output(&output, json_mode);
    Ok(())
}

pub async fn handle_dequeue(store: &GoalStore, dedupe: bool, limit: Option<usize>, json_mode: bool) -> anyhow::Result<()> {
    let outcome = store.dequeue(dedupe, limit).await?;
    let output = QueueDequeueOutput {
        dequeued: outcome.dequeued.iter().map(|g| g.as_str().to_string()).collect(),
        dedupe_dropped: outcome.dedupe_dropped,
        pending_after: outcome.pending_after,
    };
    crate::cli::output::output(&output, json_mode);
    Ok(())
}
