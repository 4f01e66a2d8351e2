//! Scheduling plans: the priority scheduler's working set.

use serde::{Deserialize, Serialize};

/// Priority ordering strategy for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityStrategy {
    Fifo,
    ComplexFirst,
    ComplexLast,
    CriticalFirst,
}

impl Default for PriorityStrategy {
    fn default() -> Self {
        Self::Fifo
    }
}

/// One sub-goal's scheduling record within a batch.
///
/// Created at batch start, mutated only by the scheduler (`wait_ticks`) and
/// the executor (result slot), destroyed at batch end when merged into a
/// `BatchSummary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubGoalPlan {
    /// Dense 0-based position within the current batch.
    pub index: usize,
    /// Origin position in the input list; preserved across retry rounds.
    pub source_index: usize,
    /// Retry round, starting at 1.
    pub attempt: u32,
    /// In `{1, 2, 3}`, derived from clause/domain signal counts.
    pub complexity_weight: u8,
    /// In `{1, 2, 3}`, derived from domain keywords.
    pub criticality_weight: u8,
    /// `min(complexity_weight, agent_budget)` if a budget is set, else 1.
    pub scheduling_weight: u32,
    /// Computed per `priority_strategy`; see `base_priority`.
    pub base_priority: i64,
    /// Non-negative counter, incremented once per scheduler cycle while pending.
    pub wait_ticks: u64,
    /// Contiguous spec-prefix number allocated to this plan.
    pub spec_prefix: u32,
    /// The goal text this plan schedules.
    pub goal: String,
}

impl SubGoalPlan {
    /// Compute `base_priority` for the configured strategy.
    pub fn compute_base_priority(
        strategy: PriorityStrategy,
        index: usize,
        complexity_weight: u8,
        criticality_weight: u8,
    ) -> i64 {
        let index = i64::try_from(index).unwrap_or(i64::MAX);
        let complexity_weight = i64::from(complexity_weight);
        let criticality_weight = i64::from(criticality_weight);
        match strategy {
            PriorityStrategy::Fifo => 100_000 - index,
            PriorityStrategy::ComplexFirst => complexity_weight * 10_000 + (100_000 - index),
            PriorityStrategy::ComplexLast => (10 - complexity_weight) * 10_000 + (100_000 - index),
            PriorityStrategy::CriticalFirst => {
                criticality_weight * 100_000 + complexity_weight * 1_000 + (100_000 - index)
            }
        }
    }

    /// Priority as seen by the admission loop: `base_priority + wait_ticks · aging_factor`.
    pub fn effective_priority(&self, aging_factor: u32) -> i64 {
        self.base_priority + (self.wait_ticks as i64) * i64::from(aging_factor)
    }
}

/// Aggregate resource accounting for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePlan {
    /// `None` = unlimited.
    pub agent_budget: Option<u32>,
    pub priority_strategy: PriorityStrategy,
    pub aging_factor: u32,
    /// Requested per-goal parallel cap, if any.
    pub goal_parallel_cap: Option<u32>,
    /// Computed effective goal parallel for this run.
    pub effective_goal_parallel: u32,
    pub max_wait_ticks: u64,
    pub starvation_wait_events: u64,
    pub max_used_slots: u32,
    pub max_concurrent_goals: u32,
}

impl ResourcePlan {
    pub const fn new(
        agent_budget: Option<u32>,
        priority_strategy: PriorityStrategy,
        aging_factor: u32,
        goal_parallel_cap: Option<u32>,
        effective_goal_parallel: u32,
    ) -> Self {
        Self {
            agent_budget,
            priority_strategy,
            aging_factor,
            goal_parallel_cap,
            effective_goal_parallel,
            max_wait_ticks: 0,
            starvation_wait_events: 0,
            max_used_slots: 0,
            max_concurrent_goals: 0,
        }
    }

    /// Invariant: `max_used_slots ≤ agent_budget` whenever a budget is set.
    pub fn check_budget_invariant(&self) -> bool {
        match self.agent_budget {
            Some(budget) => self.max_used_slots <= budget,
            None => true,
        }
    }

    pub fn record_admission(&mut self, used_slots: u32, concurrent_goals: u32) {
        self.max_used_slots = self.max_used_slots.max(used_slots);
        self.max_concurrent_goals = self.max_concurrent_goals.max(concurrent_goals);
    }

    pub fn record_wait_tick(&mut self, wait_ticks: u64) {
        self.max_wait_ticks = self.max_wait_ticks.max(wait_ticks);
    }

    pub fn record_starvation(&mut self) {
        self.starvation_wait_events += 1;
    }
}
