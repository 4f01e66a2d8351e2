//! Controller: the long-running queue drainer.
//!
//! Each cycle dequeues goals under lease, runs a full program execution
//! (C2-C8) per goal via [`program::run`], and archives the cycle. Bounded by
//! cycle count and a wall-clock budget; the suspension point between cycles
//! is `poll_seconds` when the queue is empty and `wait_on_empty` is set.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::io::AsyncWriteExt;

use crate::domain::errors::AcloResult;
use crate::domain::models::config::{GlobalConfig, ProgramConfig};
use crate::domain::models::session::{generate_session_id, SessionEnvelope, SessionKind, SessionRef};
use crate::domain::ports::clock::Clock;
use crate::domain::ports::semantics::GoalSemanticsAnalyzer;
use crate::domain::ports::spec_builder::SpecBuilder;
use crate::infrastructure::fs::recovery_store::RecoveryMemoryStore;
use crate::infrastructure::fs::session_archive::SessionArchiveStore;
use crate::services::circuit_breaker::CircuitBreaker;
use crate::services::event_bus::{make_event, EventBus, EventCategory, EventSeverity, KernelEvent};
use crate::services::goal_store::GoalStore;
use crate::services::program::{self, ProgramRequest, SpecSessionGuards};

/// Bounds on one controller drain.
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub max_cycles: u32,
    pub max_minutes: u32,
    pub poll_seconds: u64,
    pub dequeue_limit: Option<usize>,
    pub wait_on_empty: bool,
    pub stop_on_goal_failure: bool,
    pub controller_dedupe: bool,
}

impl ControllerConfig {
    pub const DEFAULT_MAX_CYCLES: u32 = 1000;
    pub const DEFAULT_MAX_MINUTES: u32 = 120;
    pub const DEFAULT_POLL_SECONDS: u64 = 30;
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_cycles: Self::DEFAULT_MAX_CYCLES,
            max_minutes: Self::DEFAULT_MAX_MINUTES,
            poll_seconds: Self::DEFAULT_POLL_SECONDS,
            dequeue_limit: None,
            wait_on_empty: false,
            stop_on_goal_failure: false,
            controller_dedupe: true,
        }
    }
}

/// Why the drain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStopReason {
    Completed,
    QueueEmpty,
    TimeBudgetExhausted,
    CycleLimitReached,
    GoalFailure,
}

/// One drained cycle's accounting.
#[derive(Debug, Clone)]
pub struct CycleRecord {
    pub cycle: u32,
    pub dequeued: usize,
    pub dedupe_dropped: u32,
    pub processed_goals: usize,
    pub completed_goals: usize,
    pub failed_goals: usize,
    pub pending_after: usize,
}

/// Full drain outcome.
#[derive(Debug, Clone)]
pub struct ControllerOutcome {
    pub cycles: Vec<CycleRecord>,
    pub performed_cycles: u32,
    pub stop_reason: ControllerStopReason,
}

/// Append one tab-delimited audit line per goal:
/// `timestamp\tstatus\tprogram_status\tgate-pass|gate-fail\tgoal`.
async fn append_log_line(log_path: &Path, now: DateTime<Utc>, status: &str, program_status: &str, gate_passed: bool, goal: &str) -> AcloResult<()> {
    if let Some(parent) = log_path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|source| crate::domain::errors::AcloError::io(log_path.to_path_buf(), source))?;
    }
    let gate_token = if gate_passed { "gate-pass" } else { "gate-fail" };
    let line = format!("{}\t{status}\t{program_status}\t{gate_token}\t{goal}\n", now.to_rfc3339());
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .await
        .map_err(|source| crate::domain::errors::AcloError::io(log_path.to_path_buf(), source))?;
    file.write_all(line.as_bytes()).await.map_err(|source| crate::domain::errors::AcloError::io(log_path.to_path_buf(), source))?;
    Ok(())
}

/// Drive the controller's cycle loop.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    event_bus: &EventBus,
    goal_store: &GoalStore,
    recovery_store: &RecoveryMemoryStore,
    circuit_breaker: &mut CircuitBreaker,
    analyzer: &dyn GoalSemanticsAnalyzer,
    spec_builder: Arc<dyn SpecBuilder>,
    controller_config: ControllerConfig,
    global: &GlobalConfig,
    controller_archive: &SessionArchiveStore,
    log_path: Option<&Path>,
    clock: &dyn Clock,
) -> AcloResult<ControllerOutcome> {
    let start = clock.now();
    let mut cycles = Vec::new();
    let mut spec_prefix_base: u32 = 1;

    let stop_reason = 'cycles: loop {
        let cycle = cycles.len() as u32 + 1;
        if cycle > controller_config.max_cycles {
            break ControllerStopReason::CycleLimitReached;
        }

        let elapsed_minutes = clock.now().signed_duration_since(start).num_minutes();
        if elapsed_minutes >= i64::from(controller_config.max_minutes) {
            break ControllerStopReason::TimeBudgetExhausted;
        }

        let outcome = goal_store.dequeue(controller_config.controller_dedupe, controller_config.dequeue_limit).await?;

        if outcome.dequeued.is_empty() {
            if controller_config.wait_on_empty {
                tokio::time::sleep(std::time::Duration::from_secs(controller_config.poll_seconds)).await;
                continue 'cycles;
            }
            break ControllerStopReason::QueueEmpty;
        }

        let mut completed_goals = 0usize;
        let mut failed_goals = 0usize;
        let mut any_failed = false;

        for goal in &outcome.dequeued {
            let now = clock.now();
            let program: ProgramConfig = global.program.clone();
            let request = ProgramRequest {
                goal: goal.as_str().to_string(),
                program,
                dod_tests_command: global.dod_tests_command.clone(),
                dod_tests_timeout_ms: None,
                spec_prefix_base,
                guards: SpecSessionGuards::default(),
            };
            spec_prefix_base += 64;

            let program_outcome =
                program::run(event_bus, recovery_store, circuit_breaker, analyzer, spec_builder.clone(), request, now, clock).await?;

            let goal_succeeded = program_outcome.summary.failed_goals == 0;
            if goal_succeeded {
                completed_goals += 1;
            } else {
                failed_goals += 1;
                any_failed = true;
            }

            if let Some(log_path) = log_path {
                append_log_line(
                    log_path,
                    now,
                    if goal_succeeded { "completed" } else { "failed" },
                    &format!("{:?}", program_outcome.summary.status).to_lowercase(),
                    program_outcome.gate_outcome.effective_passed,
                    goal.as_str(),
                )
                .await?;
            }
        }

        let session_id = generate_session_id(SessionKind::Controller, clock.now());
        let file_name = format!("{session_id}.json");
        let envelope = SessionEnvelope::new(
            "controller",
            if any_failed { "partial-failed" } else { "completed" },
            SessionRef { id: session_id.clone(), file: file_name.clone() },
            clock.now(),
            json!({
                "cycle": cycle,
                "dequeued": outcome.dequeued.len(),
                "dedupeDropped": outcome.dedupe_dropped,
                "completedGoals": completed_goals,
                "failedGoals": failed_goals,
                "pendingAfter": outcome.pending_after,
            }),
        );
        controller_archive.write(&file_name, &envelope).await?;

        event_bus
            .publish(make_event(
                EventSeverity::Info,
                EventCategory::Controller,
                None,
                KernelEvent::ControllerCycleCompleted { cycle, processed_goals: outcome.dequeued.len() },
            ))
            .await;

        cycles.push(CycleRecord {
            cycle,
            dequeued: outcome.dequeued.len(),
            dedupe_dropped: outcome.dedupe_dropped,
            processed_goals: outcome.dequeued.len(),
            completed_goals,
            failed_goals,
            pending_after: outcome.pending_after,
        });

        if controller_config.stop_on_goal_failure && any_failed {
            break ControllerStopReason::GoalFailure;
        }

        if outcome.pending_after == 0 && !controller_config.wait_on_empty {
            break ControllerStopReason::Completed;
        }
    };

    Ok(ControllerOutcome { performed_cycles: cycles.len() as u32, cycles, stop_reason })
}
