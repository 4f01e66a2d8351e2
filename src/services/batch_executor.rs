//! Batch Executor.
//!
//! Invokes the external spec builder once per admitted plan and maps its
//! outcome (or failure) into a `BatchResult`, indexed by `source_index` so
//! retry rounds can merge without losing original ordering.

use crate::domain::models::batch::{BatchResult, RateLimitTelemetry, ResultStatus};
use crate::domain::models::plan::SubGoalPlan;
use crate::domain::ports::spec_builder::{SpecBuilder, SpecBuilderOptions};

/// Run one admitted plan against `spec_builder`, returning its `BatchResult`.
/// Never propagates an error: an exception from the builder becomes
/// `status = error` with the message captured.
pub async fn execute(
    plan: &SubGoalPlan,
    spec_builder: &dyn SpecBuilder,
    dod_tests_command: Option<String>,
    dod_tests_timeout_ms: Option<u64>,
) -> BatchResult {
    let options = SpecBuilderOptions {
        goal: plan.goal.clone(),
        spec_prefix: plan.spec_prefix,
        dod_tests_command,
        dod_tests_timeout_ms,
    };

    match spec_builder.run_auto_close_loop(options).await {
        Ok(outcome) => BatchResult {
            source_index: plan.source_index,
            status: status_from_builder(&outcome.status),
            master_spec: outcome.portfolio.master_spec,
            sub_spec_count: outcome.portfolio.sub_specs.len() as u32,
            complexity_weight: plan.complexity_weight,
            criticality_weight: plan.criticality_weight,
            scheduling_weight: plan.scheduling_weight,
            wait_ticks: plan.wait_ticks,
            batch_attempt: plan.attempt,
            replan_cycles: u32::from(outcome.replan_performed),
            rate_limit: outcome.rate_limit.unwrap_or_default(),
            error: None,
        },
        Err(err) => BatchResult {
            source_index: plan.source_index,
            status: ResultStatus::Error,
            master_spec: None,
            sub_spec_count: 0,
            complexity_weight: plan.complexity_weight,
            criticality_weight: plan.criticality_weight,
            scheduling_weight: plan.scheduling_weight,
            wait_ticks: plan.wait_ticks,
            batch_attempt: plan.attempt,
            replan_cycles: 0,
            rate_limit: RateLimitTelemetry::default(),
            error: Some(err.to_string()),
        },
    }
}

fn status_from_builder(status: &str) -> ResultStatus {
    match status {
        "completed" => ResultStatus::Completed,
        "failed" => ResultStatus::Failed,
        "stopped" => ResultStatus::Stopped,
        "planned" => ResultStatus::Planned,
        "prepared" => ResultStatus::Prepared,
        _ => ResultStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::domain::errors::{AcloError, AcloResult};
    use crate::domain::models::plan::PriorityStrategy;
    use crate::domain::ports::spec_builder::{SpecBuilderOutcome, SpecPortfolio, SubSpec};

    struct AlwaysCompletes;
    #[async_trait]
    impl SpecBuilder for AlwaysCompletes {
        async fn run_auto_close_loop(&self, _options: SpecBuilderOptions) -> AcloResult<SpecBuilderOutcome> {
            Ok(SpecBuilderOutcome {
                status: "completed".into(),
                portfolio: SpecPortfolio { master_spec: Some("m1".into()), sub_specs: vec![SubSpec { id: "s1".into() }] },
                rate_limit: None,
                replan_performed: false,
            })
        }
    }

    struct AlwaysErrors;
    #[async_trait]
    impl SpecBuilder for AlwaysErrors {
        async fn run_auto_close_loop(&self, _options: SpecBuilderOptions) -> AcloResult<SpecBuilderOutcome> {
            Err(AcloError::GoalExecution { source_index: 0, message: "boom".into() })
        }
    }

    fn plan() -> SubGoalPlan {
        SubGoalPlan {
            index: 0,
            source_index: 0,
            attempt: 1,
            complexity_weight: 1,
            criticality_weight: 1,
            scheduling_weight: 1,
            base_priority: SubGoalPlan::compute_base_priority(PriorityStrategy::Fifo, 0, 1, 1),
            wait_ticks: 0,
            spec_prefix: 1,
            goal: "ship it".into(),
        }
    }

    #[tokio::test]
    async fn maps_completed_outcome() {
        let result = execute(&plan(), &AlwaysCompletes, None, None).await;
        assert_eq!(result.status, ResultStatus::Completed);
        assert_eq!(result.sub_spec_count, 1);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn captures_exception_as_error_status() {
        let result = execute(&plan(), &AlwaysErrors, None, None).await;
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.error.as_deref().unwrap().contains("boom"));
    }
}
