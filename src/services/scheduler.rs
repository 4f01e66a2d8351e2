//! Priority Scheduler.
//!
//! Owns the single cooperative admission loop: picks the highest-priority
//! pending plan, admits it against the agent budget, spawns its execution as
//! a parallel cooperative task, and ages every plan still waiting once the
//! next task completes. The loop itself is never reentered concurrently —
//! it always awaits one completion before re-evaluating admission.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::domain::models::batch::BatchResult;
use crate::domain::models::plan::{PriorityStrategy, ResourcePlan, SubGoalPlan};
use crate::domain::ports::spec_builder::SpecBuilder;
use crate::services::{batch_executor, priority_calculator};

/// Result of one scheduler run: the accumulated resource statistics plus
/// every goal's `BatchResult`, sorted ascending by `source_index`.
pub struct SchedulerOutcome {
    pub resource_plan: ResourcePlan,
    pub results: Vec<BatchResult>,
}

/// `effective_goal_parallel`: unlimited budget caps at
/// `min(base_parallel, |goals|)`; a set budget greedily packs plans in
/// ascending scheduling weight until `base_parallel` slots or the budget is
/// exhausted.
pub fn effective_goal_parallel(agent_budget: Option<u32>, base_parallel: u32, plans: &[SubGoalPlan]) -> u32 {
    let goal_count = plans.len() as u32;
    if goal_count == 0 {
        return 0;
    }
    match agent_budget {
        None => base_parallel.max(1).min(goal_count),
        Some(budget) => {
            let mut weights: Vec<u32> = plans.iter().map(|p| p.scheduling_weight).collect();
            weights.sort_unstable();
            let mut used = 0u32;
            let mut count = 0u32;
            for weight in weights {
                if count >= base_parallel {
                    break;
                }
                if used + weight > budget {
                    break;
                }
                used += weight;
                count += 1;
            }
            count.max(1).min(base_parallel).min(goal_count)
        }
    }
}

/// Per-goal max-parallel cap: `max(1, min(requested, budget /
/// effective_goal_parallel))` when a budget is set, else as requested.
pub fn per_goal_max_parallel(agent_budget: Option<u32>, effective_goal_parallel: u32, requested: Option<u32>) -> u32 {
    match agent_budget {
        Some(budget) => {
            let from_budget = budget / effective_goal_parallel.max(1);
            requested.map_or(from_budget, |r| r.min(from_budget)).max(1)
        }
        None => requested.unwrap_or(u32::MAX),
    }
}

/// Run the full dispatch loop for one batch of goals against `spec_builder`.
#[allow(clippy::too_many_arguments)]
pub async fn run_batch(
    goals: &[String],
    complexity_signals: &[(u32, u32)],
    strategy: PriorityStrategy,
    agent_budget: Option<u32>,
    base_parallel: u32,
    aging_factor: u32,
    continue_on_error: bool,
    attempt: u32,
    spec_prefix_base: u32,
    dod_tests_command: Option<String>,
    dod_tests_timeout_ms: Option<u64>,
    spec_builder: Arc<dyn SpecBuilder>,
) -> SchedulerOutcome {
    let mut pending =
        priority_calculator::build_plans(goals, complexity_signals, strategy, agent_budget, attempt, spec_prefix_base);
    let parallel = effective_goal_parallel(agent_budget, base_parallel, &pending);
    let mut resource_plan = ResourcePlan::new(agent_budget, strategy, aging_factor, Some(base_parallel), parallel);

    let mut used_slots: u32 = 0;
    let mut concurrent_goals: u32 = 0;
    let mut stop_launch = false;
    let mut results: Vec<BatchResult> = Vec::with_capacity(goals.len());
    let mut tasks: JoinSet<(SubGoalPlan, BatchResult)> = JoinSet::new();

    loop {
        while concurrent_goals < parallel && !pending.is_empty() && !stop_launch {
            let Some(next_idx) = priority_calculator::select_next(&pending, aging_factor) else { break };
            let candidate_weight = pending[next_idx].scheduling_weight;
            let fits_budget = agent_budget.is_none_or(|budget| used_slots + candidate_weight <= budget);
            if !fits_budget {
                resource_plan.record_starvation();
                break;
            }

            let plan = pending.remove(next_idx);
            used_slots += plan.scheduling_weight;
            concurrent_goals += 1;
            resource_plan.record_admission(used_slots, concurrent_goals);

            let builder = spec_builder.clone();
            let dod_command = dod_tests_command.clone();
            let plan_for_task = plan.clone();
            tasks.spawn(async move {
                let result = batch_executor::execute(&plan_for_task, builder.as_ref(), dod_command, dod_tests_timeout_ms).await;
                (plan_for_task, result)
            });
        }

        if tasks.is_empty() {
            break;
        }

        let Some(joined) = tasks.join_next().await else { break };
        let (plan, result) = joined.expect("executor task panicked");
        concurrent_goals = concurrent_goals.saturating_sub(1);
        used_slots = used_slots.saturating_sub(plan.scheduling_weight);

        if result.is_retryable() && !continue_on_error {
            stop_launch = true;
        }
        results.push(result);

        for p in &mut pending {
            p.wait_ticks += 1;
            resource_plan.record_wait_tick(p.wait_ticks);
        }
    }

    results.sort_by_key(|r| r.source_index);
    SchedulerOutcome { resource_plan, results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::domain::errors::AcloResult;
    use crate::domain::ports::spec_builder::{SpecBuilderOptions, SpecBuilderOutcome, SpecPortfolio};

    struct AlwaysCompletes;
    #[async_trait]
    impl SpecBuilder for AlwaysCompletes {
        async fn run_auto_close_loop(&self, _options: SpecBuilderOptions) -> AcloResult<SpecBuilderOutcome> {
            Ok(SpecBuilderOutcome {
                status: "completed".into(),
                portfolio: SpecPortfolio { master_spec: None, sub_specs: vec![] },
                rate_limit: None,
                replan_performed: false,
            })
        }
    }

    #[test]
    fn unlimited_budget_caps_at_goal_count() {
        let plans = priority_calculator::build_plans(&["a".into(), "b".into()], &[], PriorityStrategy::Fifo, None, 1, 1);
        assert_eq!(effective_goal_parallel(None, 5, &plans), 2);
    }

    #[test]
    fn budget_packs_ascending_weight_until_exhausted() {
        let plans = priority_calculator::build_plans(
            &["a".into(), "b".into(), "c".into()],
            &[],
            PriorityStrategy::Fifo,
            Some(2),
            1,
            1,
        );
        let parallel = effective_goal_parallel(Some(2), 3, &plans);
        assert!(parallel >= 1);
    }

    #[test]
    fn per_goal_cap_is_floored_at_one() {
        assert_eq!(per_goal_max_parallel(Some(3), 10, None), 1);
        assert_eq!(per_goal_max_parallel(None, 10, Some(4)), 4);
    }

    #[tokio::test]
    async fn run_batch_completes_every_goal() {
        let goals = vec!["ship the core scheduler".to_string(), "write docs".to_string()];
        let outcome = run_batch(
            &goals,
            &[],
            PriorityStrategy::Fifo,
            None,
            2,
            0,
            true,
            1,
            1,
            None,
            None,
            Arc::new(AlwaysCompletes),
        )
        .await;
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].source_index, 0);
        assert_eq!(outcome.results[1].source_index, 1);
    }
}
