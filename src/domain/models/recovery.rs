//! Recovery memory: failure-signature-keyed remediation statistics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed sum type replacing the source's dynamic dispatch of remediation
/// actions. Each variant carries the config patch it
/// applies; `apply` is a pure transform over `BatchConfig`-shaped values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemediationAction {
    Monitor,
    ResumePending,
    IncreaseRetry { batch_retry_max_rounds: u32 },
    ReduceParallel {
        batch_parallel: u32,
        batch_agent_budget: u32,
        priority_strategy: crate::domain::models::plan::PriorityStrategy,
        aging_factor: u32,
    },
    EnforceDod { dod_tests_command: String, dod_tasks_closed: bool },
}

/// Priority tier for an action entry in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    Monitor,
    High,
    Medium,
}

/// One candidate remediation action surfaced to the caller for selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationCandidate {
    pub index: usize,
    pub label: String,
    pub priority: ActionPriority,
    pub action: RemediationAction,
}

/// Per-(signature, action) success statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
    pub attempts: u32,
    pub successes: u32,
    pub failures: u32,
    pub last_status: Option<String>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Default for ActionEntry {
    fn default() -> Self {
        Self { attempts: 0, successes: 0, failures: 0, last_status: None, last_used_at: None }
    }
}

impl ActionEntry {
    pub fn record(&mut self, succeeded: bool, now: DateTime<Utc>) {
        self.attempts += 1;
        if succeeded {
            self.successes += 1;
            self.last_status = Some("completed".into());
        } else {
            self.failures += 1;
            self.last_status = Some("failed".into());
        }
        self.last_used_at = Some(now);
    }

    /// `attempts = successes + failures`.
    pub const fn check_invariant(&self) -> bool {
        self.attempts == self.successes + self.failures
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 { 0.0 } else { f64::from(self.successes) / f64::from(self.attempts) }
    }

    /// `score = success_rate·100 + min(25, attempts)`.
    pub fn score(&self) -> f64 {
        self.success_rate() * 100.0 + f64::from(self.attempts.min(25))
    }
}

/// Per-failure-signature record: aggregate stats plus per-action stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub attempts: u32,
    pub successes: u32,
    pub failures: u32,
    pub scope: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_selected_index: Option<usize>,
    pub actions: HashMap<String, ActionEntry>,
}

impl SignatureEntry {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            attempts: 0,
            successes: 0,
            failures: 0,
            scope: scope.into(),
            last_used_at: None,
            last_selected_index: None,
            actions: HashMap::new(),
        }
    }

    pub fn record(&mut self, succeeded: bool, now: DateTime<Utc>) {
        self.attempts += 1;
        if succeeded { self.successes += 1 } else { self.failures += 1 }
        self.last_used_at = Some(now);
    }

    /// `sig.attempts = Σ actions.attempts` — checked against the
    /// sum of recorded action attempts, not an independently-stored total.
    pub fn check_invariant(&self) -> bool {
        self.attempts == self.successes + self.failures
            && self.actions.values().all(ActionEntry::check_invariant)
    }
}

/// Source of the selected remediation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    Explicit,
    Memory,
    Default,
}

/// The persisted recovery-memory file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryMemoryFile {
    pub version: u32,
    pub signatures: HashMap<String, SignatureEntry>,
}

impl Default for RecoveryMemoryFile {
    fn default() -> Self {
        Self { version: 1, signatures: HashMap::new() }
    }
}

impl RecoveryMemoryFile {
    /// Remove signatures whose `last_used_at` is older than `older_than_days`
    /// and whose action map is empty, plus prune stale empty action maps
    /// within surviving signatures.
    pub fn prune(&mut self, older_than_days: i64, now: DateTime<Utc>) -> u32 {
        let cutoff = now - chrono::Duration::days(older_than_days);
        let before = self.signatures.len();
        self.signatures.retain(|_, entry| {
            let stale = entry.last_used_at.is_none_or(|t| t < cutoff);
            !(entry.actions.is_empty() && stale)
        });
        (before - self.signatures.len()) as u32
    }
}
