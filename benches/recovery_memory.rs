//! Benchmarks for recovery-memory catalog construction and selection.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use aclo::domain::models::batch::{BatchResult, BatchStatus, BatchSummary, GoalInputGuard, RateLimitTelemetry, ResultStatus, SpecSessionBudget, SpecSessionGrowthGuard};
use aclo::domain::models::plan::{PriorityStrategy, ResourcePlan};
use aclo::domain::models::recovery::RecoveryMemoryFile;
use aclo::services::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use aclo::services::recovery_memory::{build_catalog, select};

fn failing_result(source_index: usize) -> BatchResult {
    BatchResult {
        source_index,
        status: ResultStatus::Failed,
        master_spec: None,
        sub_spec_count: 0,
        complexity_weight: 2,
        criticality_weight: 2,
        scheduling_weight: 2,
        wait_ticks: 0,
        batch_attempt: 1,
        replan_cycles: 0,
        rate_limit: RateLimitTelemetry::default(),
        error: Some(format!("connection timed out after {source_index}00ms talking to /srv/spec-{source_index}/build.log")),
    }
}

fn failing_summary(n: usize) -> BatchSummary {
    BatchSummary {
        mode: "batch".into(),
        status: BatchStatus::PartialFailed,
        total_goals: n,
        processed_goals: n,
        completed_goals: 0,
        failed_goals: n,
        batch_parallel: 4,
        resource_plan: ResourcePlan::new(Some(8), PriorityStrategy::ComplexFirst, 2, None, 4),
        goal_input_guard: GoalInputGuard::default(),
        spec_session_budget: SpecSessionBudget::default(),
        spec_session_growth_guard: SpecSessionGrowthGuard::default(),
        results: (0..n).map(failing_result).collect(),
    }
}

fn bench_build_catalog(c: &mut Criterion) {
    let summary = failing_summary(50);
    c.bench_function("build_catalog_50_failures", |b| {
        b.iter(|| black_box(build_catalog(&summary, false, "npm run test:smoke")))
    });
}

fn bench_select(c: &mut Criterion) {
    let summary = failing_summary(50);
    let catalog = build_catalog(&summary, false, "npm run test:smoke");
    let memory = RecoveryMemoryFile::default();
    let circuit_breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
    let now = Utc::now();

    c.bench_function("select_from_catalog", |b| {
        b.iter(|| black_box(select(&memory, "scope-batch|batch|failed-50", &catalog, None, &circuit_breaker, now)))
    });
}

criterion_group!(benches, bench_build_catalog, bench_select);
criterion_main!(benches);
