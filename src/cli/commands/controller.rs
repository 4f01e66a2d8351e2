//! `aclo controller run` — drain the goal queue under a cycle/time budget.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::output::CommandOutput;
use crate::domain::models::config::GlobalConfig;
use crate::domain::ports::clock::SystemClock;
use crate::domain::ports::spec_builder::SpecBuilder;
use crate::domain::ports::workspace::Workspace;
use crate::infrastructure::fs::recovery_store::RecoveryMemoryStore;
use crate::infrastructure::semantics::HeuristicGoalSemanticsAnalyzer;
use crate::services::circuit_breaker::CircuitBreaker;
use crate::services::controller::{self, ControllerConfig, ControllerStopReason};
use crate::services::event_bus::EventBus;
use crate::services::goal_store::GoalStore;
use crate::services::session_archive::open_all;

#[derive(Debug, Serialize)]
pub struct ControllerRunOutput {
    pub performed_cycles: u32,
    pub stop_reason: String,
    pub cycles: Vec<Value>,
}

impl CommandOutput for ControllerRunOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("performed cycles: {}", self.performed_cycles), format!("stop reason: {}", self.stop_reason)];
        for cycle in &self.cycles {
            lines.push(cycle.to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> Value {
        json!(self)
    }
}

fn stop_reason_label(reason: ControllerStopReason) -> &'static str {
    match reason {
        ControllerStopReason::Completed => "completed",
        ControllerStopReason::QueueEmpty => "queue-empty",
        ControllerStopReason::TimeBudgetExhausted => "time-budget-exhausted",
        ControllerStopReason::CycleLimitReached => "cycle-limit-reached",
        ControllerStopReason::GoalFailure => "goal-failure",
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_run(
    workspace: &Workspace,
    max_cycles: Option<u32>,
    max_minutes: Option<u32>,
    poll_seconds: Option<u64>,
    dequeue_limit: Option<usize>,
    wait_on_empty: bool,
    stop_on_goal_failure: bool,
    log_path: Option<PathBuf>,
    global: &GlobalConfig,
    spec_builder: Arc<dyn SpecBuilder>,
    json_mode: bool,
) -> anyhow::Result<bool> {
    let goal_store = GoalStore::new(workspace.auto_dir().join("close-loop-controller-goals.lines"), global.queue_lock_ttl_seconds);
    let recovery_store = RecoveryMemoryStore::new(workspace.auto_dir().join("close-loop-recovery-memory.json"));
    let event_bus = EventBus::default();
    let mut circuit_breaker = CircuitBreaker::new(crate::services::circuit_breaker::CircuitBreakerConfig::default());
    let analyzer = HeuristicGoalSemanticsAnalyzer;
    let clock = SystemClock;
    let archives = open_all(workspace.root());
    let controller_archive = &archives[2];

    let mut controller_config = ControllerConfig::default();
    if let Some(max_cycles) = max_cycles {
        controller_config.max_cycles = max_cycles;
    }
    if let Some(max_minutes) = max_minutes {
        controller_config.max_minutes = max_minutes;
    }
    if let Some(poll_seconds) = poll_seconds {
        controller_config.poll_seconds = poll_seconds;
    }
    controller_config.dequeue_limit = dequeue_limit;
    controller_config.wait_on_empty = wait_on_empty;
    controller_config.stop_on_goal_failure = stop_on_goal_failure;

    let outcome = controller::run(
        &event_bus,
        &goal_store,
        &recovery_store,
        &mut circuit_breaker,
        &analyzer,
        spec_builder,
        controller_config,
        global,
        controller_archive,
        log_path.as_deref(),
        &clock,
    )
    .await?;

    let succeeded = !matches!(outcome.stop_reason, ControllerStopReason::GoalFailure);
    let output = ControllerRunOutput {
        performed_cycles: outcome.performed_cycles,
        stop_reason: stop_reason_label(outcome.stop_reason).to_string(),
        cycles: outcome
            .cycles
            .iter()
            .map(|cycle| {
                json!({
                    "cycle": cycle.cycle,
                    "dequeued": cycle.dequeued,
                    "dedupeDropped": cycle.dedupe_dropped,
                    "processedGoals": cycle.processed_goals,
                    "completedGoals": cycle.completed_goals,
                    "failedGoals": cycle.failed_goals,
                    "pendingAfter": cycle.pending_after,
                })
            })
            .collect(),
    };
    crate::cli::output::output(&output, json_mode);

    Ok(succeeded)
}
