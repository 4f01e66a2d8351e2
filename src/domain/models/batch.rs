//! Batch execution results and summary.

use serde::{Deserialize, Serialize};

use super::plan::ResourcePlan;

/// Status of a single goal's execution within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Failed,
    Error,
    Unknown,
    Stopped,
    Planned,
    Prepared,
}

/// Rate-limit telemetry collected from one goal execution or one retry round.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RateLimitTelemetry {
    pub signal_count: u32,
    pub total_backoff_ms: u64,
    pub last_launch_hold_ms: u64,
}

impl RateLimitTelemetry {
    pub fn merge(&mut self, other: &Self) {
        self.signal_count += other.signal_count;
        self.total_backoff_ms += other.total_backoff_ms;
        self.last_launch_hold_ms = other.last_launch_hold_ms;
    }

    /// True if this telemetry would trigger adaptive backpressure.
    pub const fn indicates_pressure(&self) -> bool {
        self.signal_count > 0 || self.total_backoff_ms > 0 || self.last_launch_hold_ms > 0
    }
}

/// Result of executing one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub source_index: usize,
    pub status: ResultStatus,
    pub master_spec: Option<String>,
    pub sub_spec_count: u32,
    pub complexity_weight: u8,
    pub criticality_weight: u8,
    pub scheduling_weight: u32,
    pub wait_ticks: u64,
    pub batch_attempt: u32,
    pub replan_cycles: u32,
    pub rate_limit: RateLimitTelemetry,
    pub error: Option<String>,
}

impl BatchResult {
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.status,
            ResultStatus::Failed | ResultStatus::Error | ResultStatus::Unknown | ResultStatus::Stopped
        )
    }
}

/// Overall batch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchStatus {
    Completed,
    PartialFailed,
    Failed,
    DryRun,
}

/// Duplicate-goal admission guard carried on every `BatchSummary`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalInputGuard {
    pub enabled: bool,
    pub max_duplicate_goals: Option<u32>,
    pub duplicate_goals: u32,
    pub unique_goals: u32,
    pub duplicate_examples: Vec<String>,
    pub over_limit: bool,
    pub hard_fail_triggered: bool,
}

impl GoalInputGuard {
    /// Cap on the number of duplicate examples retained for reporting.
    pub const MAX_EXAMPLES: usize = 20;

    pub fn push_example(&mut self, goal: String) {
        if self.duplicate_examples.len() < Self::MAX_EXAMPLES {
            self.duplicate_examples.push(goal);
        }
    }

    pub fn evaluate(&mut self, hard_fail: bool) {
        self.over_limit = self
            .max_duplicate_goals
            .is_some_and(|max| self.duplicate_goals > max);
        self.hard_fail_triggered = self.enabled && self.over_limit && hard_fail;
    }
}

/// Spec-session directory size, measured before and after a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecSessionBudget {
    pub total_before: u32,
    pub over_limit_before: bool,
    pub total_after: u32,
    pub pruned_count: u32,
    pub estimated_created: u32,
    pub over_limit_after: bool,
    pub hard_fail_triggered: bool,
}

impl SpecSessionBudget {
    pub fn finish(&mut self, max_specs: Option<u32>, hard_fail: bool) {
        self.estimated_created = (self.total_after + self.pruned_count)
            .saturating_sub(self.total_before);
        self.over_limit_after = max_specs.is_some_and(|max| self.total_after > max);
        self.hard_fail_triggered = self.over_limit_after && hard_fail;
    }
}

/// Growth-rate guard derived from `SpecSessionBudget`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecSessionGrowthGuard {
    pub estimated_created_per_goal: f64,
    pub over_limit: bool,
    pub reasons: Vec<String>,
}

impl SpecSessionGrowthGuard {
    pub fn evaluate(
        &mut self,
        estimated_created: u32,
        processed_goals: u32,
        max_created_per_goal: Option<f64>,
    ) {
        self.estimated_created_per_goal = if processed_goals == 0 {
            0.0
        } else {
            f64::from(estimated_created) / f64::from(processed_goals)
        };
        self.reasons.clear();
        if let Some(max) = max_created_per_goal {
            if self.estimated_created_per_goal > max {
                self.over_limit = true;
                self.reasons.push(format!(
                    "estimated_created_per_goal {:.2} exceeds max {:.2}",
                    self.estimated_created_per_goal, max
                ));
                return;
            }
        }
        self.over_limit = false;
    }
}

/// Full summary of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub mode: String,
    pub status: BatchStatus,
    pub total_goals: usize,
    pub processed_goals: usize,
    pub completed_goals: usize,
    pub failed_goals: usize,
    pub batch_parallel: u32,
    pub resource_plan: ResourcePlan,
    pub goal_input_guard: GoalInputGuard,
    pub spec_session_budget: SpecSessionBudget,
    pub spec_session_growth_guard: SpecSessionGrowthGuard,
    pub results: Vec<BatchResult>,
}

impl BatchSummary {
    /// Invariant: `completed + failed = processed ≤ total`;
    /// `status = completed ⇔ failed = 0 ∧ processed = total`.
    pub fn check_invariants(&self) -> bool {
        let accounting_ok = self.completed_goals + self.failed_goals == self.processed_goals
            && self.processed_goals <= self.total_goals;
        let status_ok = if self.status == BatchStatus::Completed {
            self.failed_goals == 0 && self.processed_goals == self.total_goals
        } else {
            true
        };
        let unique_indices: std::collections::HashSet<_> =
            self.results.iter().map(|r| r.source_index).collect();
        accounting_ok && status_ok && unique_indices.len() == self.results.len()
    }

    /// `results[]` sorted ascending by `source_index`.
    pub fn sort_results(&mut self) {
        self.results.sort_by_key(|r| r.source_index);
    }

    pub fn derive_status(&mut self, continue_on_error: bool) {
        self.status = if self.failed_goals == 0 && self.processed_goals == self.total_goals {
            BatchStatus::Completed
        } else if continue_on_error || self.completed_goals > 0 {
            BatchStatus::PartialFailed
        } else {
            BatchStatus::Failed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(source_index: usize, status: ResultStatus) -> BatchResult {
        BatchResult {
            source_index,
            status,
            master_spec: None,
            sub_spec_count: 0,
            complexity_weight: 1,
            criticality_weight: 1,
            scheduling_weight: 1,
            wait_ticks: 0,
            batch_attempt: 1,
            replan_cycles: 0,
            rate_limit: RateLimitTelemetry::default(),
            error: None,
        }
    }

    #[test]
    fn invariants_hold_for_completed_summary() {
        let summary = BatchSummary {
            mode: "batch".into(),
            status: BatchStatus::Completed,
            total_goals: 2,
            processed_goals: 2,
            completed_goals: 2,
            failed_goals: 0,
            batch_parallel: 2,
            resource_plan: ResourcePlan::new(None, Default::default(), 0, None, 1),
            goal_input_guard: GoalInputGuard::default(),
            spec_session_budget: SpecSessionBudget::default(),
            spec_session_growth_guard: SpecSessionGrowthGuard::default(),
            results: vec![
                result(0, ResultStatus::Completed),
                result(1, ResultStatus::Completed),
            ],
        };
        assert!(summary.check_invariants());
    }

    #[test]
    fn invariants_reject_duplicate_source_index() {
        let summary = BatchSummary {
            mode: "batch".into(),
            status: BatchStatus::PartialFailed,
            total_goals: 2,
            processed_goals: 2,
            completed_goals: 1,
            failed_goals: 1,
            batch_parallel: 2,
            resource_plan: ResourcePlan::new(None, Default::default(), 0, None, 1),
            goal_input_guard: GoalInputGuard::default(),
            spec_session_budget: SpecSessionBudget::default(),
            spec_session_growth_guard: SpecSessionGrowthGuard::default(),
            results: vec![
                result(0, ResultStatus::Completed),
                result(0, ResultStatus::Failed),
            ],
        };
        assert!(!summary.check_invariants());
    }

    #[test]
    fn growth_guard_flags_over_limit() {
        let mut guard = SpecSessionGrowthGuard::default();
        guard.evaluate(10, 2, Some(3.0));
        assert!(guard.over_limit);
        assert!(!guard.reasons.is_empty());
    }

    #[test]
    fn rate_limit_pressure_detection() {
        let none = RateLimitTelemetry::default();
        assert!(!none.indicates_pressure());
        let some = RateLimitTelemetry { signal_count: 1, ..Default::default() };
        assert!(some.indicates_pressure());
    }
}
