//! Governance Loop.
//!
//! Drives bounded governance rounds over a finished program run: check the
//! time budget, evaluate the gate and KPI anomalies, build a merged patch
//! (recovery-memory action selection + anomaly response + gate
//! auto-remediation), re-execute via the caller-supplied hook, and re-apply
//! the gate to decide whether to stop or continue.

use chrono::{DateTime, Utc};

use crate::domain::models::gate::{FallbackChain, GateInputs, GateOutcome, GateProfile};
use crate::domain::models::governance::{
    AnomalySeverity, GovernanceExecutionMode, GovernanceRoundRecord, GovernanceSession, StopReason,
};
use crate::domain::models::kpi::{Anomaly, AnomalyType};
use crate::domain::ports::clock::Clock;
use crate::services::gate_evaluator::{self, AutoRemediationPatch};
use crate::services::event_bus::{make_event, EventBus, EventCategory, EventSeverity, KernelEvent};

/// Config overrides merged from governance action selection, anomaly
/// response, and gate auto-remediation.
#[derive(Debug, Clone, Copy, Default)]
pub struct GovernancePatch {
    pub batch_retry_rounds: Option<u32>,
    pub batch_retry_until_complete: Option<bool>,
    pub batch_parallel: Option<u32>,
    pub batch_agent_budget: Option<u32>,
    pub target_sub_goal_count: Option<u8>,
    pub spec_session_hard_fail: Option<bool>,
    pub spec_session_max_created: Option<u32>,
}

impl GovernancePatch {
    pub fn is_empty(&self) -> bool {
        self.batch_retry_rounds.is_none()
            && self.batch_retry_until_complete.is_none()
            && self.batch_parallel.is_none()
            && self.batch_agent_budget.is_none()
            && self.target_sub_goal_count.is_none()
            && self.spec_session_hard_fail.is_none()
            && self.spec_session_max_created.is_none()
    }

    fn merge(mut self, other: Self) -> Self {
        self.batch_retry_rounds = other.batch_retry_rounds.or(self.batch_retry_rounds);
        self.batch_retry_until_complete = other.batch_retry_until_complete.or(self.batch_retry_until_complete);
        self.batch_parallel = other.batch_parallel.or(self.batch_parallel);
        self.batch_agent_budget = other.batch_agent_budget.or(self.batch_agent_budget);
        self.target_sub_goal_count = other.target_sub_goal_count.or(self.target_sub_goal_count);
        self.spec_session_hard_fail = other.spec_session_hard_fail.or(self.spec_session_hard_fail);
        self.spec_session_max_created = other.spec_session_max_created.or(self.spec_session_max_created);
        self
    }
}

impl From<AutoRemediationPatch> for GovernancePatch {
    fn from(patch: AutoRemediationPatch) -> Self {
        Self {
            batch_retry_rounds: patch.next_batch_retry_rounds,
            batch_retry_until_complete: None,
            batch_parallel: patch.next_batch_parallel,
            batch_agent_budget: patch.next_batch_agent_budget,
            target_sub_goal_count: patch.next_target_sub_goal_count,
            spec_session_hard_fail: patch.prune_spec_sessions.then_some(true),
            spec_session_max_created: None,
        }
    }
}

fn anomaly_patch(
    anomalies: &[Anomaly],
    current_parallel: u32,
    current_agent_budget: Option<u32>,
    estimated_created: u32,
) -> GovernancePatch {
    let mut patch = GovernancePatch::default();
    for anomaly in anomalies {
        match anomaly.kind {
            AnomalyType::SuccessRateDrop => {
                patch.batch_retry_rounds = Some(patch.batch_retry_rounds.unwrap_or(0) + 1);
                patch.batch_retry_until_complete = Some(true);
            }
            AnomalyType::FailedGoalsSpike | AnomalyType::RateLimitSignalSpike => {
                patch.batch_parallel = Some(current_parallel.saturating_sub(1).max(1));
                if let Some(budget) = current_agent_budget {
                    patch.batch_agent_budget = Some(budget.saturating_sub(1).max(1));
                }
            }
            AnomalyType::SpecGrowthSpike => {
                patch.spec_session_hard_fail = Some(true);
                patch.spec_session_max_created = Some((f64::from(estimated_created) * 0.8).ceil() as u32);
            }
        }
    }
    patch
}

/// Everything the governance loop needs to evaluate one round and decide
/// whether it is stable.
#[derive(Debug, Clone)]
pub struct GovernanceRoundInputs {
    pub gate_inputs: GateInputs,
    pub spec_session_hard_fail: bool,
    pub anomalies: Vec<Anomaly>,
    pub estimated_spec_created: u32,
    pub recoverable_goals_remaining: bool,
}

fn has_high_anomaly(anomalies: &[Anomaly]) -> bool {
    anomalies.iter().any(|a| a.severity == AnomalySeverity::High)
}

/// Evaluate one round: gate + anomaly failure determination, merged patch,
/// and which execution mode the re-run should take.
#[allow(clippy::too_many_arguments)]
fn evaluate_round(
    profile: GateProfile,
    fallback_chain: &FallbackChain,
    inputs: &GovernanceRoundInputs,
    current_parallel: u32,
    current_agent_budget: Option<u32>,
    current_target_sub_goal_count: Option<u8>,
    avg_sub_specs_per_goal: f64,
    max_minutes: Option<u32>,
    auto_remediation_enabled: bool,
) -> (GateOutcome, bool, GovernancePatch, GovernanceExecutionMode) {
    let gate_outcome = GateOutcome::evaluate(profile, fallback_chain, inputs.gate_inputs);
    let high_anomaly = has_high_anomaly(&inputs.anomalies);
    let has_failure = !gate_outcome.effective_passed || inputs.spec_session_hard_fail || high_anomaly;

    let mut patch = GovernancePatch::default();
    if has_failure {
        patch = patch.merge(anomaly_patch(
            &inputs.anomalies,
            current_parallel,
            current_agent_budget,
            inputs.estimated_spec_created,
        ));
        if let Some(auto_patch) = gate_evaluator::auto_remediate(
            &gate_outcome,
            inputs.spec_session_hard_fail,
            auto_remediation_enabled,
            current_agent_budget,
            current_parallel,
            current_target_sub_goal_count,
            avg_sub_specs_per_goal,
            inputs.gate_inputs.program_elapsed_ms,
            max_minutes,
        ) {
            patch = patch.merge(auto_patch.into());
        }
    }

    let execution_mode = if inputs.recoverable_goals_remaining {
        GovernanceExecutionMode::RecoveryCycle
    } else {
        GovernanceExecutionMode::ProgramGovernanceReplay
    };

    (gate_outcome, has_failure, patch, execution_mode)
}

/// Drive governance rounds until stable, the round limit, or the time budget
/// is reached. `re_execute` performs the actual re-run (recovery
/// cycle or full `program-governance-replay`) for the given patch and
/// execution mode, returning the next round's gate/anomaly inputs — it owns
/// the spec-builder and archive wiring the pure decision logic here does not.
#[allow(clippy::too_many_arguments)]
pub async fn run<F, Fut>(
    event_bus: &EventBus,
    max_rounds: u32,
    max_minutes: u32,
    profile: GateProfile,
    fallback_chain: &FallbackChain,
    mut current_inputs: GovernanceRoundInputs,
    mut current_parallel: u32,
    mut current_agent_budget: Option<u32>,
    current_target_sub_goal_count: Option<u8>,
    avg_sub_specs_per_goal: f64,
    auto_remediation_enabled: bool,
    start: DateTime<Utc>,
    clock: &dyn Clock,
    mut re_execute: F,
) -> GovernanceSession
where
    F: FnMut(GovernancePatch, GovernanceExecutionMode) -> Fut,
    Fut: std::future::Future<Output = GovernanceRoundInputs>,
{
    if max_rounds == 0 {
        return GovernanceSession::disabled();
    }

    let mut session = GovernanceSession::new(max_rounds, max_minutes);

    for round in 1..=max_rounds {
        let elapsed_minutes = clock.now().signed_duration_since(start).num_minutes();
        if elapsed_minutes >= i64::from(max_minutes) {
            session.finish(StopReason::TimeBudgetExhausted);
            publish_round_completed(event_bus, round, Some(StopReason::TimeBudgetExhausted)).await;
            return session;
        }

        let (gate_outcome, has_failure, patch, execution_mode) = evaluate_round(
            profile,
            fallback_chain,
            &current_inputs,
            current_parallel,
            current_agent_budget,
            current_target_sub_goal_count,
            avg_sub_specs_per_goal,
            Some(max_minutes),
            auto_remediation_enabled,
        );
        let high_anomaly = has_high_anomaly(&current_inputs.anomalies);

        if !has_failure {
            session.record_round(GovernanceRoundRecord {
                round,
                gate_outcome: Some(gate_outcome),
                had_high_anomaly: high_anomaly,
                patch_applied: false,
                execution_mode,
            });
            session.finish(StopReason::Stable);
            publish_round_completed(event_bus, round, Some(StopReason::Stable)).await;
            return session;
        }

        if patch.is_empty() {
            session.record_round(GovernanceRoundRecord {
                round,
                gate_outcome: Some(gate_outcome),
                had_high_anomaly: high_anomaly,
                patch_applied: false,
                execution_mode,
            });
            session.finish(StopReason::NoActionablePatch);
            publish_round_completed(event_bus, round, Some(StopReason::NoActionablePatch)).await;
            return session;
        }

        if let Some(parallel) = patch.batch_parallel {
            current_parallel = parallel;
        }
        if let Some(budget) = patch.batch_agent_budget {
            current_agent_budget = Some(budget);
        }

        let next_inputs = re_execute(patch, execution_mode).await;
        session.record_round(GovernanceRoundRecord {
            round,
            gate_outcome: Some(gate_outcome),
            had_high_anomaly: high_anomaly,
            patch_applied: true,
            execution_mode,
        });
        publish_round_completed(event_bus, round, None).await;

        let re_gate = GateOutcome::evaluate(profile, fallback_chain, next_inputs.gate_inputs);
        let reflagged_high = has_high_anomaly(&next_inputs.anomalies);
        if re_gate.effective_passed && !reflagged_high {
            session.finish(StopReason::Stable);
            publish_round_completed(event_bus, round, Some(StopReason::Stable)).await;
            return session;
        }

        current_inputs = next_inputs;
    }

    session.finish(StopReason::RoundLimitReached);
    publish_round_completed(event_bus, max_rounds, Some(StopReason::RoundLimitReached)).await;
    session
}

async fn publish_round_completed(event_bus: &EventBus, round: u32, stop_reason: Option<StopReason>) {
    event_bus
        .publish(make_event(
            EventSeverity::Info,
            EventCategory::Governance,
            None,
            KernelEvent::GovernanceRoundCompleted {
                round,
                stop_reason: stop_reason.map(|r| format!("{r:?}").to_lowercase()),
            },
        ))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::gate::RiskLevel;
    use crate::domain::ports::clock::test_support::FixedClock;

    fn passing_inputs() -> GovernanceRoundInputs {
        GovernanceRoundInputs {
            gate_inputs: GateInputs {
                completion_rate_percent: 100.0,
                risk_level: RiskLevel::Low,
                program_elapsed_ms: 0,
                agent_budget_or_effective_parallel: 1,
                total_sub_specs: 1,
            },
            spec_session_hard_fail: false,
            anomalies: Vec::new(),
            estimated_spec_created: 0,
            recoverable_goals_remaining: false,
        }
    }

    fn failing_inputs() -> GovernanceRoundInputs {
        GovernanceRoundInputs {
            gate_inputs: GateInputs {
                completion_rate_percent: 10.0,
                risk_level: RiskLevel::High,
                program_elapsed_ms: 0,
                agent_budget_or_effective_parallel: 4,
                total_sub_specs: 1,
            },
            spec_session_hard_fail: false,
            anomalies: Vec::new(),
            estimated_spec_created: 0,
            recoverable_goals_remaining: true,
        }
    }

    #[tokio::test]
    async fn stable_on_first_round_when_gate_passes() {
        let bus = EventBus::default();
        let clock = FixedClock(Utc::now());
        let session = run(
            &bus,
            3,
            60,
            GateProfile::DEFAULT,
            &FallbackChain::default(),
            passing_inputs(),
            1,
            None,
            None,
            1.0,
            true,
            clock.0,
            &clock,
            |_patch, _mode| async { passing_inputs() },
        )
        .await;
        assert_eq!(session.stop_reason, Some(StopReason::Stable));
        assert_eq!(session.performed_rounds, 1);
    }

    #[tokio::test]
    async fn disabled_when_max_rounds_zero() {
        let bus = EventBus::default();
        let clock = FixedClock(Utc::now());
        let session = run(
            &bus,
            0,
            60,
            GateProfile::DEFAULT,
            &FallbackChain::default(),
            passing_inputs(),
            1,
            None,
            None,
            1.0,
            true,
            clock.0,
            &clock,
            |_patch, _mode| async { passing_inputs() },
        )
        .await;
        assert!(session.is_disabled());
    }

    #[tokio::test]
    async fn round_limit_reached_when_every_round_still_fails() {
        let bus = EventBus::default();
        let clock = FixedClock(Utc::now());
        let session = run(
            &bus,
            2,
            60,
            GateProfile::PROD,
            &FallbackChain::default(),
            failing_inputs(),
            4,
            Some(4),
            None,
            1.0,
            true,
            clock.0,
            &clock,
            |_patch, _mode| async { failing_inputs() },
        )
        .await;
        assert_eq!(session.stop_reason, Some(StopReason::RoundLimitReached));
        assert_eq!(session.performed_rounds, 2);
    }

    #[tokio::test]
    async fn stabilizes_once_re_execution_reports_a_passing_gate() {
        let bus = EventBus::default();
        let clock = FixedClock(Utc::now());
        let session = run(
            &bus,
            3,
            60,
            GateProfile::PROD,
            &FallbackChain::default(),
            failing_inputs(),
            4,
            Some(4),
            None,
            1.0,
            true,
            clock.0,
            &clock,
            |_patch, _mode| async { passing_inputs() },
        )
        .await;
        assert_eq!(session.stop_reason, Some(StopReason::Stable));
        assert_eq!(session.performed_rounds, 1);
    }
}
