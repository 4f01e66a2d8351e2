//! Benchmarks for the priority scheduler's admission comparator.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use aclo::domain::models::plan::PriorityStrategy;
use aclo::services::priority_calculator::{build_plans, select_next};

fn sample_goals(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| match i % 3 {
            0 => format!("rebuild core data layer for shard {i}"),
            1 => format!("write docs for module {i}"),
            _ => format!("ship the scheduler change {i}"),
        })
        .collect()
}

fn bench_build_plans(c: &mut Criterion) {
    let goals = sample_goals(200);
    c.bench_function("build_plans_200", |b| {
        b.iter(|| black_box(build_plans(&goals, &[], PriorityStrategy::CriticalFirst, Some(8), 1, 1)))
    });
}

fn bench_select_next(c: &mut Criterion) {
    let goals = sample_goals(200);
    let plans = build_plans(&goals, &[], PriorityStrategy::CriticalFirst, Some(8), 1, 1);
    c.bench_function("select_next_200", |b| b.iter(|| black_box(select_next(&plans, 3))));
}

criterion_group!(benches, bench_build_plans, bench_select_next);
criterion_main!(benches);
