//! Priority ordering helpers for the scheduler.
//!
//! `SubGoalPlan::base_priority`/`effective_priority` already carry the
//! scoring formulas (domain layer, pure); this module supplies the
//! comparator the admission loop selects the next candidate with, plus the
//! weight derivations the scheduler assembles a plan from.

use std::cmp::Ordering;

use crate::domain::models::plan::{PriorityStrategy, SubGoalPlan};

/// Derive `complexity_weight ∈ {1,2,3}` from clause/domain-signal counts, or
/// from an explicit sub-spec count when the caller pins one.
pub fn complexity_weight(clause_count: u32, domain_signal_count: u32, explicit_sub_count: Option<u8>) -> u8 {
    if let Some(explicit) = explicit_sub_count {
        return explicit.clamp(1, 3).min(3).max(1);
    }
    let signal = clause_count + domain_signal_count;
    if signal >= 6 {
        3
    } else if signal >= 3 {
        2
    } else {
        1
    }
}

/// Domain keywords that push a sub-goal into the higher criticality tiers
///
const HIGH_CRITICALITY_KEYWORDS: &[&str] = &["foundation", "core", "infra", "infrastructure", "security", "data"];
const LOW_CRITICALITY_KEYWORDS: &[&str] = &["orchestration", "quality", "docs", "documentation", "polish"];

/// Derive `criticality_weight ∈ {1,2,3}` from keyword matches in the goal text.
pub fn criticality_weight(goal_text: &str) -> u8 {
    let lower = goal_text.to_lowercase();
    if HIGH_CRITICALITY_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        3
    } else if LOW_CRITICALITY_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        1
    } else {
        2
    }
}

/// `scheduling_weight = min(complexity_weight, agent_budget)` when a budget
/// is set, else 1.
pub const fn scheduling_weight(complexity_weight: u8, agent_budget: Option<u32>) -> u32 {
    match agent_budget {
        Some(budget) => (complexity_weight as u32).min(budget).max(1),
        None => 1,
    }
}

/// Admission-loop comparator: highest
/// `effective_priority` first, tie-broken by lower `index` then higher
/// `scheduling_weight`.
pub fn compare_for_admission(aging_factor: u32, a: &SubGoalPlan, b: &SubGoalPlan) -> Ordering {
    b.effective_priority(aging_factor)
        .cmp(&a.effective_priority(aging_factor))
        .then_with(|| a.index.cmp(&b.index))
        .then_with(|| b.scheduling_weight.cmp(&a.scheduling_weight))
}

/// Pick the highest-priority pending plan's position in `pending`, per the
/// admission comparator.
pub fn select_next(pending: &[SubGoalPlan], aging_factor: u32) -> Option<usize> {
    pending
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| compare_for_admission(aging_factor, a, b))
        .map(|(index, _)| index)
}

/// Build the dense-index plans for one batch, assigning `base_priority`,
/// `complexity_weight`, `criticality_weight`, and `scheduling_weight` for
/// every goal. `complexity_signals[i] = (clause_count, domain_signal_count)`
/// for `goals[i]`, as produced by `decomposer::Decomposition`; goals beyond
/// the signals slice (e.g. plain test input) fall back to `(0, 0)`.
pub fn build_plans(
    goals: &[String],
    complexity_signals: &[(u32, u32)],
    strategy: PriorityStrategy,
    agent_budget: Option<u32>,
    attempt: u32,
    spec_prefix_base: u32,
) -> Vec<SubGoalPlan> {
    goals
        .iter()
        .enumerate()
        .map(|(index, goal)| {
            let (clause_count, domain_signal_count) = complexity_signals.get(index).copied().unwrap_or((0, 0));
            let complexity = complexity_weight(clause_count, domain_signal_count, None);
            let criticality = criticality_weight(goal);
            let weight = scheduling_weight(complexity, agent_budget);
            SubGoalPlan {
                index,
                source_index: index,
                attempt,
                complexity_weight: complexity,
                criticality_weight: criticality,
                scheduling_weight: weight,
                base_priority: SubGoalPlan::compute_base_priority(strategy, index, complexity, criticality),
                wait_ticks: 0,
                spec_prefix: spec_prefix_base + index as u32,
                goal: goal.clone(),
            }
        })
        .collect()
}
