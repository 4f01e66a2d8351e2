//! Release Gate Evaluator.
//!
//! Wraps [`GateOutcome::evaluate`] with the service-layer concerns it needs
//! to participate in a run: publishing `GateEvaluated`, and — when
//! `auto_remediation_enabled` — deriving a patch of config overrides for the
//! next round out of the failure itself, so a failing run tightens its own
//! constraints rather than repeating identically forever.

use crate::domain::models::gate::{FallbackChain, GateInputs, GateOutcome, GateProfile};
use crate::services::event_bus::{make_event, EventBus, EventCategory, EventSeverity, KernelEvent};

/// Config overrides the gate evaluator proposes for the next round when the
/// current run failed and auto-remediation is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoRemediationPatch {
    pub next_batch_agent_budget: Option<u32>,
    pub next_batch_parallel: Option<u32>,
    pub next_target_sub_goal_count: Option<u8>,
    pub next_batch_retry_rounds: Option<u32>,
    pub prune_spec_sessions: bool,
}

impl AutoRemediationPatch {
    pub fn is_empty(&self) -> bool {
        self.next_batch_agent_budget.is_none()
            && self.next_batch_parallel.is_none()
            && self.next_target_sub_goal_count.is_none()
            && self.next_batch_retry_rounds.is_none()
            && !self.prune_spec_sessions
    }
}

/// Evaluate `inputs` against `profile`, falling back through `fallback_chain`
/// on failure, and publish the outcome.
pub async fn evaluate(
    event_bus: &EventBus,
    profile: GateProfile,
    fallback_chain: &FallbackChain,
    inputs: GateInputs,
) -> GateOutcome {
    let outcome = GateOutcome::evaluate(profile, fallback_chain, inputs);

    event_bus
        .publish(make_event(
            if outcome.effective_passed { EventSeverity::Info } else { EventSeverity::Warning },
            EventCategory::Gate,
            None,
            KernelEvent::GateEvaluated {
                profile: format!("{:?}", outcome.primary.profile).to_lowercase(),
                passed: outcome.effective_passed,
                source: gate_source_token(&outcome).to_string(),
            },
        ))
        .await;

    outcome
}

fn gate_source_token(outcome: &GateOutcome) -> &'static str {
    match outcome.source {
        crate::domain::models::gate::GateSource::Primary => "primary",
        crate::domain::models::gate::GateSource::FallbackChain => "fallback-chain",
    }
}

/// Derive the next round's patch from a failed (or hard-failed) run:
/// shrink the agent budget and clamp parallel, shrink the target
/// sub-goal count in proportion to how many sub-specs each goal actually
/// produced, zero out further retry rounds once the elapsed budget is mostly
/// spent, and flag a synchronous spec-session prune when the session budget
/// itself is the thing that's over.
///
/// Returns `None` when auto-remediation is disabled or the run didn't fail.
#[allow(clippy::too_many_arguments)]
pub fn auto_remediate(
    outcome: &GateOutcome,
    spec_session_hard_fail: bool,
    auto_remediation_enabled: bool,
    current_agent_budget: Option<u32>,
    current_parallel: u32,
    current_target_sub_goal_count: Option<u8>,
    avg_sub_specs_per_goal: f64,
    program_elapsed_ms: u64,
    max_minutes: Option<u32>,
) -> Option<AutoRemediationPatch> {
    if !auto_remediation_enabled || (outcome.effective_passed && !spec_session_hard_fail) {
        return None;
    }

    let mut patch = AutoRemediationPatch::default();

    if let Some(budget) = current_agent_budget {
        patch.next_batch_agent_budget = Some(budget.saturating_sub(1).max(1));
    }
    patch.next_batch_parallel = Some(current_parallel.saturating_sub(1).max(1));

    if let Some(target) = current_target_sub_goal_count {
        if avg_sub_specs_per_goal > 1.0 {
            let shrunk = (f64::from(target) / avg_sub_specs_per_goal).floor().max(2.0) as u8;
            if shrunk < target {
                patch.next_target_sub_goal_count = Some(shrunk);
            }
        }
    }

    if let Some(max_minutes) = max_minutes {
        let budget_ms = u64::from(max_minutes) * 60_000;
        if budget_ms > 0 && program_elapsed_ms * 100 >= budget_ms * 80 {
            patch.next_batch_retry_rounds = Some(0);
        }
    }

    patch.prune_spec_sessions = spec_session_hard_fail;

    Some(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::gate::{GateProfile, RiskLevel};

    fn inputs(completion: f64) -> GateInputs {
        GateInputs {
            completion_rate_percent: completion,
            risk_level: RiskLevel::Low,
            program_elapsed_ms: 0,
            agent_budget_or_effective_parallel: 1,
            total_sub_specs: 1,
        }
    }

    #[tokio::test]
    async fn evaluate_publishes_gate_evaluated_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        evaluate(&bus, GateProfile::DEFAULT, &FallbackChain::default(), inputs(100.0)).await;
        let event = rx.recv().await.unwrap();
        assert!(matches!(event.payload, KernelEvent::GateEvaluated { passed: true, .. }));
    }

    #[test]
    fn auto_remediate_returns_none_when_disabled() {
        let outcome = GateOutcome::evaluate(GateProfile::PROD, &FallbackChain::default(), inputs(10.0));
        assert!(auto_remediate(&outcome, false, false, Some(4), 4, Some(4), 1.0, 0, None).is_none());
    }

    #[test]
    fn auto_remediate_returns_none_when_gate_passed_and_no_hard_fail() {
        let outcome = GateOutcome::evaluate(GateProfile::DEFAULT, &FallbackChain::default(), inputs(100.0));
        assert!(auto_remediate(&outcome, false, true, Some(4), 4, Some(4), 1.0, 0, None).is_none());
    }

    #[test]
    fn auto_remediate_shrinks_budget_and_parallel_on_failure() {
        let outcome = GateOutcome::evaluate(GateProfile::PROD, &FallbackChain::default(), inputs(10.0));
        let patch = auto_remediate(&outcome, false, true, Some(4), 4, None, 1.0, 0, None).unwrap();
        assert_eq!(patch.next_batch_agent_budget, Some(3));
        assert_eq!(patch.next_batch_parallel, Some(3));
    }

    #[test]
    fn auto_remediate_shrinks_target_sub_goal_count_by_average_yield() {
        let outcome = GateOutcome::evaluate(GateProfile::PROD, &FallbackChain::default(), inputs(10.0));
        let patch = auto_remediate(&outcome, false, true, None, 1, Some(10), 2.5, 0, None).unwrap();
        assert_eq!(patch.next_target_sub_goal_count, Some(4));
    }

    #[test]
    fn auto_remediate_zeroes_retry_rounds_under_elapsed_pressure() {
        let outcome = GateOutcome::evaluate(GateProfile::PROD, &FallbackChain::default(), inputs(10.0));
        let patch = auto_remediate(&outcome, false, true, None, 1, None, 1.0, 55 * 60_000, Some(60)).unwrap();
        assert_eq!(patch.next_batch_retry_rounds, Some(0));
    }

    #[test]
    fn auto_remediate_flags_spec_session_prune_on_hard_fail() {
        let outcome = GateOutcome::evaluate(GateProfile::DEFAULT, &FallbackChain::default(), inputs(100.0));
        let patch = auto_remediate(&outcome, true, true, None, 1, None, 1.0, 0, None).unwrap();
        assert!(patch.prune_spec_sessions);
    }
}
