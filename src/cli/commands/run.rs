//! `aclo run` — decompose, schedule, retry, recover, and gate one goal.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::commands::parse_gate_profile;
use crate::cli::output::CommandOutput;
use crate::domain::models::batch::BatchSummary;
use crate::domain::ports::clock::{Clock, SystemClock};
use crate::domain::ports::spec_builder::SpecBuilder;
use crate::domain::ports::workspace::Workspace;
use crate::infrastructure::fs::recovery_store::RecoveryMemoryStore;
use crate::infrastructure::semantics::HeuristicGoalSemanticsAnalyzer;
use crate::services::circuit_breaker::CircuitBreaker;
use crate::services::event_bus::EventBus;
use crate::services::program::{self, ProgramRequest, SpecSessionGuards};

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub goal: String,
    pub decomposition_warnings: Vec<String>,
    pub gate_passed: bool,
    pub governance_rounds_performed: Option<u32>,
    pub summary: Value,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("goal: {}", self.goal),
            format!("gate: {}", if self.gate_passed { "passed" } else { "failed" }),
        ];
        if let Some(rounds) = self.governance_rounds_performed {
            lines.push(format!("governance rounds: {rounds}"));
        }
        for warning in &self.decomposition_warnings {
            lines.push(format!("warning: {warning}"));
        }
        if let Some(status) = self.summary.get("status") {
            lines.push(format!("status: {status}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> Value {
        json!(self)
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_run(
    workspace: &Workspace,
    goal: String,
    target_sub_goal_count: Option<u8>,
    quality_threshold: Option<u8>,
    gate_profile: &str,
    governance: bool,
    dry_run: bool,
    dod_tests_command: Option<String>,
    global: &crate::domain::models::config::GlobalConfig,
    spec_builder: Arc<dyn SpecBuilder>,
    json_mode: bool,
) -> anyhow::Result<bool> {
    let mut program = global.program.clone();
    program.target_sub_goal_count = target_sub_goal_count.or(program.target_sub_goal_count);
    if let Some(threshold) = quality_threshold {
        program.quality_threshold = threshold;
    }
    program.gate_profile = parse_gate_profile(gate_profile)?;
    program.governance_enabled = governance;
    program.batch.dry_run = dry_run;

    let clock = SystemClock;
    let event_bus = EventBus::default();
    let recovery_store = RecoveryMemoryStore::new(workspace.auto_dir().join("close-loop-recovery-memory.json"));
    let mut circuit_breaker = CircuitBreaker::new(crate::services::circuit_breaker::CircuitBreakerConfig::default());
    let analyzer = HeuristicGoalSemanticsAnalyzer;

    let request = ProgramRequest {
        goal: goal.clone(),
        program,
        dod_tests_command: dod_tests_command.unwrap_or_else(|| global.dod_tests_command.clone()),
        dod_tests_timeout_ms: None,
        spec_prefix_base: 1,
        guards: SpecSessionGuards::default(),
    };

    let start = clock.now();
    let outcome = program::run(&event_bus, &recovery_store, &mut circuit_breaker, &analyzer, spec_builder, request, start, &clock).await?;

    let gate_passed = outcome.gate_outcome.effective_passed;
    let output = RunOutput {
        goal,
        decomposition_warnings: outcome.decomposition_warnings,
        gate_passed,
        governance_rounds_performed: outcome.governance_session.as_ref().map(|s| s.performed_rounds),
        summary: serde_json::to_value(&outcome.summary).unwrap_or(Value::Null),
    };
    crate::cli::output::output(&output, json_mode);

    Ok(gate_passed && batch_succeeded(&outcome.summary))
}

fn batch_succeeded(summary: &BatchSummary) -> bool {
    use crate::domain::models::batch::BatchStatus;

    summary.status == BatchStatus::Completed
        && !summary.spec_session_budget.hard_fail_triggered
        && !summary.spec_session_growth_guard.hard_fail_triggered
}
