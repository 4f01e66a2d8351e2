//! Retry Controller.
//!
//! Drives the scheduler (C3/C4) across bounded rounds, merging results back
//! by `source_index` — the latest non-missing entry always wins — and
//! applying adaptive backpressure between rounds. Exhausting the retry
//! budget with goals still outstanding marks them `stopped` rather than
//! silently dropping them.

use std::sync::Arc;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::domain::models::batch::{BatchResult, RateLimitTelemetry, ResultStatus};
use crate::domain::models::plan::{PriorityStrategy, ResourcePlan};
use crate::domain::models::retry::{RetryPolicy, RetryRoundHistory, RetryStrategy};
use crate::domain::ports::spec_builder::SpecBuilder;
use crate::services::scheduler;

/// Normalizes a round's raw rate-limit signal count into a 0.0–1.0 pressure
/// reading by checking how many of those signals a notional per-round quota
/// would have throttled. Mechanism only: it never changes the adaptive
/// backpressure decrement rule, only the telemetry logged alongside it.
pub struct RateLimitPressureGauge {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RateLimitPressureGauge {
    pub fn new(signals_per_round_quota: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(signals_per_round_quota.max(1)).unwrap_or(NonZeroU32::MIN));
        Self { limiter: RateLimiter::direct(quota) }
    }

    pub fn pressure(&self, signal_count: u32) -> f64 {
        if signal_count == 0 {
            return 0.0;
        }
        let mut throttled = 0u32;
        for _ in 0..signal_count {
            if self.limiter.check().is_err() {
                throttled += 1;
            }
        }
        f64::from(throttled) / f64::from(signal_count)
    }
}

/// Jittered exponential delay before launching the next round. Strict
/// rounds never sleep; only adaptive backpressure rounds pace themselves.
fn adaptive_round_delay(round: u32) -> Duration {
    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(200))
        .with_multiplier(2.0)
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(None)
        .build();
    for _ in 0..round {
        backoff.next_backoff();
    }
    backoff.next_backoff().unwrap_or(Duration::from_secs(5))
}

/// Everything one retry-controller run produced: the merged per-goal
/// results, the per-round history, the last round's resource plan, and
/// whether adaptive backpressure flipped `continue_on_error` mid-run.
pub struct RetryOutcome {
    pub results: Vec<BatchResult>,
    pub history: Vec<RetryRoundHistory>,
    pub resource_plan: ResourcePlan,
    pub continue_on_error: bool,
}

fn stopped_result(source_index: usize, previous: Option<BatchResult>) -> BatchResult {
    match previous {
        Some(mut result) => {
            result.status = ResultStatus::Stopped;
            result.error = Some("retry budget was exhausted".into());
            result
        }
        None => BatchResult {
            source_index,
            status: ResultStatus::Stopped,
            master_spec: None,
            sub_spec_count: 0,
            complexity_weight: 1,
            criticality_weight: 1,
            scheduling_weight: 1,
            wait_ticks: 0,
            batch_attempt: 0,
            replan_cycles: 0,
            rate_limit: RateLimitTelemetry::default(),
            error: Some("retry budget was exhausted".into()),
        },
    }
}

/// Run `goals` through bounded retry rounds against `spec_builder`.
/// Each round re-admits only the goals still missing or retryable
/// from the prior round; once `policy.effective_max_rounds()` rounds have
/// run, anything still outstanding is marked `stopped`.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    goals: &[String],
    complexity_signals: &[(u32, u32)],
    policy: RetryPolicy,
    strategy: PriorityStrategy,
    agent_budget: Option<u32>,
    base_parallel: u32,
    aging_factor: u32,
    mut continue_on_error: bool,
    spec_prefix_base: u32,
    dod_tests_command: Option<String>,
    dod_tests_timeout_ms: Option<u64>,
    spec_builder: Arc<dyn SpecBuilder>,
) -> RetryOutcome {
    let max_rounds = policy.effective_max_rounds().max(1);
    let mut merged: Vec<Option<BatchResult>> = vec![None; goals.len()];
    let mut history = Vec::new();
    let mut parallel = base_parallel;
    let mut budget = agent_budget;
    let mut last_resource_plan = ResourcePlan::new(agent_budget, strategy, aging_factor, Some(base_parallel), 0);
    let pressure_gauge = RateLimitPressureGauge::new(5);

    for round in 1..=max_rounds {
        let pending_indices: Vec<usize> =
            (0..goals.len()).filter(|&i| merged[i].as_ref().is_none_or(BatchResult::is_retryable)).collect();
        if pending_indices.is_empty() {
            break;
        }
        let pending_goals: Vec<String> = pending_indices.iter().map(|&i| goals[i].clone()).collect();
        let pending_signals: Vec<(u32, u32)> =
            pending_indices.iter().map(|&i| complexity_signals.get(i).copied().unwrap_or((0, 0))).collect();

        let outcome = scheduler::run_batch(
            &pending_goals,
            &pending_signals,
            strategy,
            budget,
            parallel,
            aging_factor,
            continue_on_error,
            round,
            spec_prefix_base + round * goals.len() as u32,
            dod_tests_command.clone(),
            dod_tests_timeout_ms,
            spec_builder.clone(),
        )
        .await;
        last_resource_plan = outcome.resource_plan;

        let mut round_rate_limit = RateLimitTelemetry::default();
        let mut goals_failed = 0u32;
        let goals_processed = outcome.results.len() as u32;
        for (local_index, mut result) in outcome.results.into_iter().enumerate() {
            let source_index = pending_indices[local_index];
            round_rate_limit.merge(&result.rate_limit);
            if result.is_retryable() {
                goals_failed += 1;
            }
            result.source_index = source_index;
            merged[source_index] = Some(result);
        }
        let goals_unprocessed = (pending_indices.len() as u32).saturating_sub(goals_processed);

        tracing::debug!(
            round,
            goals_failed,
            pressure = pressure_gauge.pressure(round_rate_limit.signal_count),
            "retry round finished"
        );

        let mut record = RetryRoundHistory {
            round,
            applied_batch_parallel: parallel,
            applied_batch_agent_budget: budget,
            goals_in: pending_indices.len() as u32,
            goals_processed,
            goals_failed,
            goals_unprocessed,
            rate_limit: round_rate_limit,
            adaptive_backpressure_applied: false,
            next_batch_parallel: parallel,
            next_batch_agent_budget: budget,
        };

        if round == max_rounds {
            history.push(record);
            break;
        }

        record.apply_adaptive_backpressure(policy.strategy);
        parallel = record.next_batch_parallel;
        budget = record.next_batch_agent_budget;
        if round == 1 && matches!(policy.strategy, RetryStrategy::Adaptive) {
            continue_on_error = true;
        }
        let sleep_for_next_round = record.adaptive_backpressure_applied;
        history.push(record);

        if sleep_for_next_round {
            tokio::time::sleep(adaptive_round_delay(round)).await;
        }
    }

    for (index, slot) in merged.iter_mut().enumerate() {
        let needs_stop = slot.as_ref().is_none_or(BatchResult::is_retryable);
        if needs_stop {
            let previous = slot.take();
            *slot = Some(stopped_result(index, previous));
        }
    }

    let results: Vec<BatchResult> = merged.into_iter().map(Option::unwrap).collect();
    RetryOutcome { results, history, resource_plan: last_resource_plan, continue_on_error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::domain::errors::AcloResult;
    use crate::domain::models::retry::RetryStrategy;
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

    struct AlwaysFails;
    #[async_trait]
    impl SpecBuilder for AlwaysFails {
        async fn run_auto_close_loop(&self, _options: SpecBuilderOptions) -> AcloResult<SpecBuilderOutcome> {
            Ok(SpecBuilderOutcome {
                status: "failed".into(),
                portfolio: SpecPortfolio { master_spec: None, sub_specs: vec![] },
                rate_limit: None,
                replan_performed: false,
            })
        }
    }

    /// Fails every round except the last one attempted.
    struct FailsUntilLastAttempt {
        attempts_remaining: AtomicU32,
    }
    #[async_trait]
    impl SpecBuilder for FailsUntilLastAttempt {
        async fn run_auto_close_loop(&self, _options: SpecBuilderOptions) -> AcloResult<SpecBuilderOutcome> {
            let remaining = self.attempts_remaining.fetch_sub(1, Ordering::SeqCst);
            let status = if remaining <= 1 { "completed" } else { "failed" };
            Ok(SpecBuilderOutcome {
                status: status.into(),
                portfolio: SpecPortfolio { master_spec: None, sub_specs: vec![] },
                rate_limit: None,
                replan_performed: false,
            })
        }
    }

    fn policy(rounds: u32) -> RetryPolicy {
        RetryPolicy::new(rounds, false, Some(10), RetryStrategy::Strict)
    }

    #[tokio::test]
    async fn single_round_completes_when_nothing_fails() {
        let goals = vec!["ship it".to_string()];
        let outcome = run(
            &goals,
            &[],
            policy(3),
            PriorityStrategy::Fifo,
            None,
            1,
            0,
            true,
            1,
            None,
            None,
            Arc::new(AlwaysCompletes),
        )
        .await;
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.results[0].status, ResultStatus::Completed);
    }

    #[tokio::test]
    async fn exhausted_budget_marks_remaining_stopped() {
        let goals = vec!["ship it".to_string()];
        let outcome = run(
            &goals,
            &[],
            policy(2),
            PriorityStrategy::Fifo,
            None,
            1,
            0,
            true,
            1,
            None,
            None,
            Arc::new(AlwaysFails),
        )
        .await;
        assert_eq!(outcome.results[0].status, ResultStatus::Stopped);
        assert_eq!(outcome.results[0].error.as_deref(), Some("retry budget was exhausted"));
        assert_eq!(outcome.history.len(), 2);
    }

    #[tokio::test]
    async fn retries_until_it_succeeds_within_budget() {
        let goals = vec!["ship it".to_string()];
        let builder = Arc::new(FailsUntilLastAttempt { attempts_remaining: AtomicU32::new(3) });
        let outcome =
            run(&goals, &[], policy(5), PriorityStrategy::Fifo, None, 1, 0, true, 1, None, None, builder).await;
        assert_eq!(outcome.results[0].status, ResultStatus::Completed);
        assert_eq!(outcome.history.len(), 3);
    }

    #[tokio::test]
    async fn adaptive_strategy_enables_continue_on_error_after_round_one() {
        let goals = vec!["a".to_string(), "b".to_string()];
        let adaptive_policy = RetryPolicy::new(3, false, Some(10), RetryStrategy::Adaptive);
        let outcome = run(
            &goals,
            &[],
            adaptive_policy,
            PriorityStrategy::Fifo,
            None,
            2,
            0,
            false,
            1,
            None,
            None,
            Arc::new(AlwaysFails),
        )
        .await;
        assert!(outcome.continue_on_error);
    }

    #[test]
    fn pressure_gauge_reports_zero_for_no_signals() {
        let gauge = RateLimitPressureGauge::new(5);
        assert_eq!(gauge.pressure(0), 0.0);
    }
}
