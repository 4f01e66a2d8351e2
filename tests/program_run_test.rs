//! End-to-end coverage of the decompose/schedule/retry/gate chain driven
//! through the public service API, the same path the `aclo run` command
//! wires up, against a fake spec-builder collaborator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use aclo::domain::errors::AcloResult;
use aclo::domain::models::config::{GateProfileName, GlobalConfig};
use aclo::domain::ports::clock::SystemClock;
use aclo::domain::ports::spec_builder::{SpecBuilder, SpecBuilderOptions, SpecBuilderOutcome, SpecPortfolio, SubSpec};
use aclo::infrastructure::fs::recovery_store::RecoveryMemoryStore;
use aclo::infrastructure::semantics::HeuristicGoalSemanticsAnalyzer;
use aclo::services::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use aclo::services::event_bus::EventBus;
use aclo::services::program::{self, ProgramRequest, SpecSessionGuards};

/// Always-succeeds spec builder, one sub-spec per invocation.
struct AlwaysSucceeds {
    calls: AtomicUsize,
}

#[async_trait]
impl SpecBuilder for AlwaysSucceeds {
    async fn run_auto_close_loop(&self, options: SpecBuilderOptions) -> AcloResult<SpecBuilderOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SpecBuilderOutcome {
            status: "completed".to_string(),
            portfolio: SpecPortfolio {
                master_spec: Some(format!("spec-{}", options.spec_prefix)),
                sub_specs: vec![SubSpec { id: format!("spec-{}-sub-1", options.spec_prefix) }],
            },
            rate_limit: None,
            replan_performed: false,
        })
    }
}

/// Fails every attempt with a timeout-shaped message so the recovery-memory
/// catalog builds a "reduce parallel pressure" candidate.
struct AlwaysTimesOut;

#[async_trait]
impl SpecBuilder for AlwaysTimesOut {
    async fn run_auto_close_loop(&self, _options: SpecBuilderOptions) -> AcloResult<SpecBuilderOutcome> {
        Err(aclo::domain::errors::AcloError::GoalExecution { source_index: 0, message: "request timed out after 30000ms".into() })
    }
}

fn request(goal: &str) -> ProgramRequest {
    let mut global = GlobalConfig::default();
    global.program.gate_profile = GateProfileName::Dev;
    ProgramRequest {
        goal: goal.to_string(),
        program: global.program,
        dod_tests_command: global.dod_tests_command,
        dod_tests_timeout_ms: None,
        spec_prefix_base: 1,
        guards: SpecSessionGuards::default(),
    }
}

#[tokio::test]
async fn successful_run_passes_the_dev_gate() {
    let event_bus = EventBus::default();
    let recovery_dir = tempfile::tempdir().unwrap();
    let recovery_store = RecoveryMemoryStore::new(recovery_dir.path().join("recovery-memory.json"));
    let mut circuit_breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
    let analyzer = HeuristicGoalSemanticsAnalyzer;
    let clock = SystemClock;
    let spec_builder: Arc<dyn SpecBuilder> = Arc::new(AlwaysSucceeds { calls: AtomicUsize::new(0) });

    let start = Utc::now();
    let outcome = program::run(
        &event_bus,
        &recovery_store,
        &mut circuit_breaker,
        &analyzer,
        spec_builder,
        request("ship the core scheduler and write docs for the release"),
        start,
        &clock,
    )
    .await
    .unwrap();

    assert_eq!(outcome.summary.failed_goals, 0);
    assert!(outcome.gate_outcome.effective_passed);
    assert!(outcome.summary.processed_goals >= 1);
}

#[tokio::test]
async fn failing_run_selects_a_recovery_action_without_crashing() {
    let event_bus = EventBus::default();
    let recovery_dir = tempfile::tempdir().unwrap();
    let recovery_store = RecoveryMemoryStore::new(recovery_dir.path().join("recovery-memory.json"));
    let mut circuit_breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
    let analyzer = HeuristicGoalSemanticsAnalyzer;
    let clock = SystemClock;
    let spec_builder: Arc<dyn SpecBuilder> = Arc::new(AlwaysTimesOut);

    let mut req = request("ship the infra migration");
    req.program.batch.retry.rounds = 1;
    req.program.batch.retry.until_complete = false;

    let start = Utc::now();
    let outcome = program::run(&event_bus, &recovery_store, &mut circuit_breaker, &analyzer, spec_builder, req, start, &clock)
        .await
        .unwrap();

    assert!(outcome.summary.failed_goals > 0);
    assert!(!outcome.gate_outcome.effective_passed);

    let memory = recovery_store.load().await.unwrap();
    assert!(!memory.signatures.is_empty());
}

#[tokio::test]
async fn governance_enabled_run_records_a_session() {
    let event_bus = EventBus::default();
    let recovery_dir = tempfile::tempdir().unwrap();
    let recovery_store = RecoveryMemoryStore::new(recovery_dir.path().join("recovery-memory.json"));
    let mut circuit_breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
    let analyzer = HeuristicGoalSemanticsAnalyzer;
    let clock = SystemClock;
    let spec_builder: Arc<dyn SpecBuilder> = Arc::new(AlwaysSucceeds { calls: AtomicUsize::new(0) });

    let mut req = request("ship the core governance loop");
    req.program.governance_enabled = true;
    req.program.governance_max_rounds = 2;

    let start = Utc::now();
    let outcome = program::run(&event_bus, &recovery_store, &mut circuit_breaker, &analyzer, spec_builder, req, start, &clock)
        .await
        .unwrap();

    assert!(outcome.governance_session.is_some());
}
