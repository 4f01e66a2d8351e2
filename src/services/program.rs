//! Program orchestrator: decompose → schedule/retry → recovery → gate →
//! governance for one goal.
//!
//! Not itself a named system-overview component — it is the sequencing the
//! component table implies between C2 and C8. Spec-session budget and
//! growth-guard accounting is the caller's (the controller's, C11)
//! responsibility, since only the controller holds a `SpecSessionReader`;
//! this module accepts the already-computed guards and threads them through
//! `BatchSummary` and the governance loop untouched.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::domain::errors::AcloResult;
use crate::domain::models::batch::{
    BatchResult, BatchStatus, BatchSummary, GoalInputGuard, RateLimitTelemetry, ResultStatus,
    SpecSessionBudget, SpecSessionGrowthGuard,
};
use crate::domain::models::config::ProgramConfig;
use crate::domain::models::gate::{FallbackChain, GateInputs, GateOutcome, GateProfile};
use crate::domain::models::governance::{GovernanceExecutionMode, GovernanceSession};
use crate::domain::models::kpi::{detect_anomalies, Anomaly, TrendBucket};
use crate::domain::models::plan::ResourcePlan;
use crate::domain::ports::clock::Clock;
use crate::domain::ports::semantics::GoalSemanticsAnalyzer;
use crate::domain::ports::spec_builder::SpecBuilder;
use crate::infrastructure::fs::recovery_store::RecoveryMemoryStore;
use crate::services::circuit_breaker::CircuitBreaker;
use crate::services::event_bus::EventBus;
use crate::services::governance_loop::GovernanceRoundInputs;
use crate::services::{decomposer, gate_evaluator, governance_loop, priority_calculator, recovery_memory, retry_controller};

/// Everything the controller already knows about spec-session state, passed
/// through to the batch summary and the governance loop untouched.
#[derive(Debug, Clone, Default)]
pub struct SpecSessionGuards {
    pub hard_fail: bool,
    pub budget: SpecSessionBudget,
    pub growth: SpecSessionGrowthGuard,
    pub goal_input: GoalInputGuard,
}

/// One goal's full run request.
pub struct ProgramRequest {
    pub goal: String,
    pub program: ProgramConfig,
    pub dod_tests_command: String,
    pub dod_tests_timeout_ms: Option<u64>,
    pub spec_prefix_base: u32,
    pub guards: SpecSessionGuards,
}

/// Outcome of one full program run.
pub struct ProgramOutcome {
    pub decomposition_warnings: Vec<String>,
    pub summary: BatchSummary,
    pub gate_outcome: GateOutcome,
    pub governance_session: Option<GovernanceSession>,
}

fn failure_rate_percent(summary: &BatchSummary) -> f64 {
    if summary.total_goals == 0 {
        0.0
    } else {
        100.0 * summary.failed_goals as f64 / summary.total_goals as f64
    }
}

fn completion_rate_percent(summary: &BatchSummary) -> f64 {
    if summary.total_goals == 0 {
        100.0
    } else {
        100.0 * summary.completed_goals as f64 / summary.total_goals as f64
    }
}

fn total_sub_specs(results: &[BatchResult]) -> u32 {
    results.iter().map(|r| r.sub_spec_count).sum()
}

fn avg_sub_specs_per_goal(summary: &BatchSummary) -> f64 {
    if summary.processed_goals == 0 {
        1.0
    } else {
        (total_sub_specs(&summary.results) as f64 / summary.processed_goals as f64).max(1.0)
    }
}

/// Plan-only execution for `batch.dry_run`: build scheduling plans and
/// report them as `Planned` without invoking the spec builder.
fn dry_run_summary(goals: &[String], complexity_signals: &[(u32, u32)], req: &ProgramRequest) -> BatchSummary {
    let batch = &req.program.batch;
    let plans = priority_calculator::build_plans(
        goals,
        complexity_signals,
        batch.priority_strategy,
        batch.batch_agent_budget,
        1,
        req.spec_prefix_base,
    );
    let resource_plan = ResourcePlan::new(
        batch.batch_agent_budget,
        batch.priority_strategy,
        batch.aging_factor,
        batch.goal.max_parallel,
        crate::services::scheduler::effective_goal_parallel(batch.batch_agent_budget, batch.batch_parallel, &plans),
    );
    let results: Vec<BatchResult> = plans
        .into_iter()
        .map(|plan| BatchResult {
            source_index: plan.source_index,
            status: ResultStatus::Planned,
            master_spec: None,
            sub_spec_count: 0,
            complexity_weight: plan.complexity_weight,
            criticality_weight: plan.criticality_weight,
            scheduling_weight: plan.scheduling_weight,
            wait_ticks: 0,
            batch_attempt: 1,
            replan_cycles: 0,
            rate_limit: RateLimitTelemetry::default(),
            error: None,
        })
        .collect();

    let mut summary = BatchSummary {
        mode: "dry-run".to_string(),
        status: BatchStatus::DryRun,
        total_goals: goals.len(),
        processed_goals: 0,
        completed_goals: 0,
        failed_goals: 0,
        batch_parallel: batch.batch_parallel,
        resource_plan,
        goal_input_guard: req.guards.goal_input.clone(),
        spec_session_budget: req.guards.budget.clone(),
        spec_session_growth_guard: req.guards.growth.clone(),
        results,
    };
    summary.sort_results();
    summary
}

/// Run the retry controller once over `goals` and fold the result into a
/// `BatchSummary`.
#[allow(clippy::too_many_arguments)]
async fn execute_once(
    goals: &[String],
    complexity_signals: &[(u32, u32)],
    req: &ProgramRequest,
    spec_builder: Arc<dyn SpecBuilder>,
    spec_prefix_base: u32,
) -> (BatchSummary, retry_controller::RetryOutcome) {
    let batch = &req.program.batch;
    let outcome = retry_controller::run(
        goals,
        complexity_signals,
        batch.retry,
        batch.priority_strategy,
        batch.batch_agent_budget,
        batch.batch_parallel,
        batch.aging_factor,
        batch.continue_on_error,
        spec_prefix_base,
        Some(req.dod_tests_command.clone()),
        req.dod_tests_timeout_ms,
        spec_builder,
    )
    .await;

    let completed_goals = outcome.results.iter().filter(|r| r.status == ResultStatus::Completed).count();
    let failed_goals = outcome.results.iter().filter(|r| r.is_retryable()).count();

    let mut summary = BatchSummary {
        mode: "batch".to_string(),
        status: BatchStatus::Completed,
        total_goals: goals.len(),
        processed_goals: outcome.results.len(),
        completed_goals,
        failed_goals,
        batch_parallel: batch.batch_parallel,
        resource_plan: outcome.resource_plan.clone(),
        goal_input_guard: req.guards.goal_input.clone(),
        spec_session_budget: req.guards.budget.clone(),
        spec_session_growth_guard: req.guards.growth.clone(),
        results: outcome.results.clone(),
    };
    summary.derive_status(outcome.continue_on_error);
    summary.sort_results();
    (summary, outcome)
}

fn bucket_from(summary: &BatchSummary, key: &str) -> TrendBucket {
    TrendBucket {
        period_key: key.to_string(),
        runs: 1,
        completed_runs: u32::from(summary.status == BatchStatus::Completed),
        gate_passed_runs: 0,
        success_rate_percent: completion_rate_percent(summary),
        completion_rate_percent: completion_rate_percent(summary),
        avg_failed_goals: summary.failed_goals as f64,
        avg_total_sub_specs: total_sub_specs(&summary.results) as f64,
        avg_estimated_spec_created: f64::from(summary.spec_session_budget.estimated_created),
        avg_rate_limit_signals: summary.results.iter().map(|r| r.rate_limit.signal_count).sum::<u32>() as f64,
        avg_rate_limit_backoff_ms: summary.results.iter().map(|r| r.rate_limit.total_backoff_ms).sum::<u64>() as f64,
    }
}

/// Anomalies between two successive rounds of the same run, reusing the
/// trend-bucket comparator rather than a bespoke formula.
fn round_anomalies(previous: &BatchSummary, current: &BatchSummary) -> Vec<Anomaly> {
    let buckets = vec![bucket_from(previous, "previous"), bucket_from(current, "current")];
    detect_anomalies(&buckets)
}

/// Build the next round's `GovernanceRoundInputs` from a before/after summary
/// pair, shared by both the replay and recovery-cycle branches of the
/// governance `re_execute` closure.
fn round_inputs_from_summary(
    previous: &BatchSummary,
    next_summary: &BatchSummary,
    agent_budget_or_effective_parallel: u32,
    spec_session_hard_fail: bool,
) -> GovernanceRoundInputs {
    GovernanceRoundInputs {
        gate_inputs: GateInputs {
            completion_rate_percent: completion_rate_percent(next_summary),
            risk_level: GateInputs::derive_risk_level(failure_rate_percent(next_summary), next_summary.failed_goals > 0, 1),
            program_elapsed_ms: 0,
            agent_budget_or_effective_parallel,
            total_sub_specs: total_sub_specs(&next_summary.results),
        },
        spec_session_hard_fail,
        anomalies: round_anomalies(previous, next_summary),
        estimated_spec_created: next_summary.spec_session_budget.estimated_created,
        recoverable_goals_remaining: next_summary.failed_goals > 0,
    }
}

/// Run the full C2-C8 chain for one goal.
pub async fn run(
    event_bus: &EventBus,
    recovery_store: &RecoveryMemoryStore,
    circuit_breaker: &mut CircuitBreaker,
    analyzer: &dyn GoalSemanticsAnalyzer,
    spec_builder: Arc<dyn SpecBuilder>,
    req: ProgramRequest,
    start: DateTime<Utc>,
    clock: &dyn Clock,
) -> AcloResult<ProgramOutcome> {
    let decomposition = decomposer::decompose(
        analyzer,
        &req.goal,
        req.program.target_sub_goal_count,
        Some(req.program.quality_threshold),
    );
    let sub_goals = decomposition.goals.clone();
    let complexity_signals = decomposition.complexity_signals.clone();

    let mut summary = if req.program.batch.dry_run {
        dry_run_summary(&sub_goals, &complexity_signals, &req)
    } else {
        let (summary, _) =
            execute_once(&sub_goals, &complexity_signals, &req, spec_builder.clone(), req.spec_prefix_base).await;
        summary
    };

    if summary.failed_goals > 0 && !req.program.batch.dry_run {
        let now = clock.now();
        let (signature, _candidates, selection) = recovery_memory::run_selection(
            recovery_store,
            circuit_breaker,
            event_bus,
            &summary,
            "program",
            "batch",
            false,
            &req.dod_tests_command,
            req.program.batch.goal.use_action,
            now,
        )
        .await?;
        if let Some(selection) = selection {
            let succeeded = summary.status == BatchStatus::Completed;
            recovery_memory::complete_cycle(
                recovery_store,
                circuit_breaker,
                event_bus,
                &signature,
                "program",
                &selection.candidate,
                succeeded,
                now,
            )
            .await?;
        }
    }

    let elapsed_ms = (clock.now() - start).num_milliseconds().max(0) as u64;
    let risk = GateInputs::derive_risk_level(failure_rate_percent(&summary), summary.failed_goals > 0, 0);
    let gate_inputs = GateInputs {
        completion_rate_percent: completion_rate_percent(&summary),
        risk_level: risk,
        program_elapsed_ms: elapsed_ms,
        agent_budget_or_effective_parallel: req
            .program
            .batch
            .batch_agent_budget
            .unwrap_or(summary.resource_plan.effective_goal_parallel),
        total_sub_specs: total_sub_specs(&summary.results),
    };

    let profile = GateProfile::for_name(req.program.gate_profile);
    let fallback_chain = FallbackChain::new(req.program.gate_fallback_chain.clone());
    let gate_outcome = gate_evaluator::evaluate(event_bus, profile, &fallback_chain, gate_inputs).await;

    let governance_session = if req.program.governance_enabled {
        let avg_yield = avg_sub_specs_per_goal(&summary);
        let batch = req.program.batch.clone();
        let dod = req.dod_tests_command.clone();
        let dod_timeout = req.dod_tests_timeout_ms;
        let guards = req.guards.clone();
        let goal_text = req.goal.clone();
        let program_config = req.program.clone();
        let goals_for_replay = sub_goals.clone();
        let signals_for_replay = complexity_signals.clone();
        let spec_prefix_base = req.spec_prefix_base;
        let latest = Arc::new(Mutex::new(summary.clone()));
        let circuit_breaker_cell = Arc::new(Mutex::new(circuit_breaker.clone()));
        let dod_for_recovery = req.dod_tests_command.clone();

        let initial_inputs = GovernanceRoundInputs {
            gate_inputs,
            spec_session_hard_fail: req.guards.hard_fail,
            anomalies: Vec::new(),
            estimated_spec_created: summary.spec_session_budget.estimated_created,
            recoverable_goals_remaining: summary.failed_goals > 0,
        };

        let session = governance_loop::run(
            event_bus,
            req.program.governance_max_rounds,
            req.program.governance_max_minutes,
            profile,
            &fallback_chain,
            initial_inputs,
            batch.batch_parallel,
            batch.batch_agent_budget,
            req.program.target_sub_goal_count,
            avg_yield,
            req.program.auto_remediation_enabled,
            start,
            clock,
            |patch, mode| {
                let mut replay_batch = batch.clone();
                replay_batch.batch_parallel = patch.batch_parallel.unwrap_or(replay_batch.batch_parallel);
                replay_batch.batch_agent_budget = patch.batch_agent_budget.or(replay_batch.batch_agent_budget);
                if let Some(rounds) = patch.batch_retry_rounds {
                    replay_batch.retry.rounds = rounds;
                }
                if let Some(until_complete) = patch.batch_retry_until_complete {
                    replay_batch.retry.until_complete = until_complete;
                }

                let replay_req = ProgramRequest {
                    goal: goal_text.clone(),
                    program: ProgramConfig { batch: replay_batch, ..program_config.clone() },
                    dod_tests_command: dod.clone(),
                    dod_tests_timeout_ms: dod_timeout,
                    spec_prefix_base,
                    guards: guards.clone(),
                };
                let goals_for_replay = goals_for_replay.clone();
                let signals_for_replay = signals_for_replay.clone();
                let spec_builder = spec_builder.clone();
                let latest = Arc::clone(&latest);
                let circuit_breaker_cell = Arc::clone(&circuit_breaker_cell);
                let dod_for_recovery = dod_for_recovery.clone();

                async move {
                    match mode {
                        GovernanceExecutionMode::ProgramGovernanceReplay => {
                            let previous = latest.lock().expect("program summary lock poisoned").clone();
                            let (next_summary, _) = execute_once(
                                &goals_for_replay,
                                &signals_for_replay,
                                &replay_req,
                                spec_builder,
                                replay_req.spec_prefix_base,
                            )
                            .await;
                            let agent_budget_or_effective_parallel = replay_req
                                .program
                                .batch
                                .batch_agent_budget
                                .unwrap_or(next_summary.resource_plan.effective_goal_parallel);
                            let next_inputs = round_inputs_from_summary(
                                &previous,
                                &next_summary,
                                agent_budget_or_effective_parallel,
                                replay_req.guards.hard_fail,
                            );
                            *latest.lock().expect("program summary lock poisoned") = next_summary;
                            next_inputs
                        }
                        GovernanceExecutionMode::RecoveryCycle => {
                            let previous = latest.lock().expect("program summary lock poisoned").clone();
                            let mut cb_local = circuit_breaker_cell.lock().expect("circuit breaker lock poisoned").clone();
                            let now = clock.now();

                            let selection = recovery_memory::run_selection(
                                recovery_store,
                                &cb_local,
                                event_bus,
                                &previous,
                                "governance",
                                "batch",
                                false,
                                &dod_for_recovery,
                                None,
                                now,
                            )
                            .await;

                            if let Ok((signature, _candidates, Some(selection))) = selection {
                                let succeeded = previous.status == BatchStatus::Completed;
                                let _ = recovery_memory::complete_cycle(
                                    recovery_store,
                                    &mut cb_local,
                                    event_bus,
                                    &signature,
                                    "governance",
                                    &selection.candidate,
                                    succeeded,
                                    now,
                                )
                                .await;
                            }
                            *circuit_breaker_cell.lock().expect("circuit breaker lock poisoned") = cb_local;

                            let agent_budget_or_effective_parallel = replay_req
                                .program
                                .batch
                                .batch_agent_budget
                                .unwrap_or(previous.resource_plan.effective_goal_parallel);
                            round_inputs_from_summary(&previous, &previous, agent_budget_or_effective_parallel, replay_req.guards.hard_fail)
                        }
                    }
                }
            },
        )
        .await;

        summary = Arc::try_unwrap(latest).map(|cell| cell.into_inner().expect("program summary lock poisoned")).unwrap_or(summary);
        if let Ok(cell) = Arc::try_unwrap(circuit_breaker_cell) {
            *circuit_breaker = cell.into_inner().expect("circuit breaker lock poisoned");
        }
        Some(session)
    } else {
        None
    };

    Ok(ProgramOutcome {
        decomposition_warnings: decomposition.warnings.iter().map(|w| w.as_str().to_string()).collect(),
        summary,
        gate_outcome,
        governance_session,
    })
}
