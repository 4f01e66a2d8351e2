//! Goal Store & Queue.
//!
//! Loads, persists, and deduplicates a line- or JSON-delimited goal queue
//! file. Non-existent files are auto-created empty rather than treated as
//! an error.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::errors::{AcloError, AcloResult};
use crate::domain::models::Goal;

use super::write_atomic;

/// Queue file serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueFormat {
    Json,
    Lines,
}

impl QueueFormat {
    /// `Auto` resolves by suffix: `.json` → json, else lines.
    pub fn detect(path: &Path) -> Self {
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            Self::Json
        } else {
            Self::Lines
        }
    }
}

/// Result of `loadQueue`.
#[derive(Debug, Clone)]
pub struct LoadedQueue {
    pub file: PathBuf,
    pub format: QueueFormat,
    pub goals: Vec<Goal>,
    pub duplicate_count: u32,
}

#[derive(Serialize, Deserialize)]
struct JsonGoalsWrapper {
    goals: Vec<String>,
}

/// File-backed implementation of the Goal Store & Queue contract.
pub struct GoalQueueStore;

impl GoalQueueStore {
    /// Load (auto-creating if absent), optionally deduplicating by
    /// fingerprint with first-occurrence-wins semantics.
    pub async fn load(path: impl AsRef<Path>, format: Option<QueueFormat>, dedupe: bool) -> AcloResult<LoadedQueue> {
        let path = path.as_ref().to_path_buf();
        let format = format.unwrap_or_else(|| QueueFormat::detect(&path));

        if !path.exists() {
            Self::create_empty(&path, format).await?;
        }

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AcloError::io(path.display().to_string(), e))?;

        let mut goals = match format {
            QueueFormat::Json => Self::parse_json(&raw)?,
            QueueFormat::Lines => Self::parse_lines(&raw),
        };

        let duplicate_count = if dedupe {
            let before = goals.len();
            goals = Self::dedupe(goals);
            (before - goals.len()) as u32
        } else {
            0
        };

        Ok(LoadedQueue { file: path, format, goals, duplicate_count })
    }

    /// Persist `goals` back to `path` in `format`, used by the controller
    /// after dequeuing and by the dedupe-rewrite path.
    pub async fn save(path: impl AsRef<Path>, format: QueueFormat, goals: &[Goal]) -> AcloResult<()> {
        let path = path.as_ref();
        let serialized = match format {
            QueueFormat::Json => {
                let wrapper = JsonGoalsWrapper { goals: goals.iter().map(|g| g.as_str().to_string()).collect() };
                serde_json::to_string_pretty(&wrapper)?
            }
            QueueFormat::Lines => goals.iter().map(Goal::as_str).collect::<Vec<_>>().join("\n"),
        };
        write_atomic(path, &serialized).await
    }

    /// First-occurrence-wins dedup by fingerprint.
    pub fn dedupe(goals: Vec<Goal>) -> Vec<Goal> {
        let mut seen = HashSet::new();
        goals
            .into_iter()
            .filter(|goal| seen.insert(goal.fingerprint()))
            .collect()
    }

    async fn create_empty(path: &Path, format: QueueFormat) -> AcloResult<()> {
        let contents = match format {
            QueueFormat::Json => serde_json::to_string_pretty(&JsonGoalsWrapper { goals: Vec::new() })?,
            QueueFormat::Lines => String::new(),
        };
        write_atomic(path, &contents).await
    }

    fn parse_json(raw: &str) -> AcloResult<Vec<Goal>> {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let value: Value = serde_json::from_str(raw)?;
        let strings: Vec<String> = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            let wrapper: JsonGoalsWrapper = serde_json::from_value(value)?;
            wrapper.goals
        };
        Ok(strings.into_iter().filter_map(Goal::new).collect())
    }

    fn parse_lines(raw: &str) -> Vec<Goal> {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(Goal::new)
            .collect()
    }
}
