//! Program governance loop state.

use serde::{Deserialize, Serialize};

use super::gate::GateOutcome;

/// Why the governance loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    Stable,
    TimeBudgetExhausted,
    NoActionablePatch,
    RoundLimitReached,
    Disabled,
}

/// KPI anomaly severity that can trigger a governance round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Medium,
    High,
}

/// One executed governance round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceRoundRecord {
    pub round: u32,
    pub gate_outcome: Option<GateOutcome>,
    pub had_high_anomaly: bool,
    pub patch_applied: bool,
    pub execution_mode: GovernanceExecutionMode,
}

/// How the round re-executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceExecutionMode {
    RecoveryCycle,
    ProgramGovernanceReplay,
}

/// Bounds and running state for one governance session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceSession {
    pub max_rounds: u32,
    pub max_minutes: u32,
    pub performed_rounds: u32,
    pub rounds: Vec<GovernanceRoundRecord>,
    pub stop_reason: Option<StopReason>,
}

impl GovernanceSession {
    pub const DEFAULT_MAX_ROUNDS: u32 = 3;
    pub const DEFAULT_MAX_MINUTES: u32 = 60;

    pub fn new(max_rounds: u32, max_minutes: u32) -> Self {
        Self {
            max_rounds,
            max_minutes,
            performed_rounds: 0,
            rounds: Vec::new(),
            stop_reason: None,
        }
    }

    /// `maxRounds = 0` disables governance entirely.
    pub fn disabled() -> Self {
        let mut session = Self::new(0, Self::DEFAULT_MAX_MINUTES);
        session.stop_reason = Some(StopReason::Disabled);
        session
    }

    pub const fn is_disabled(&self) -> bool {
        self.max_rounds == 0
    }

    pub fn record_round(&mut self, record: GovernanceRoundRecord) {
        self.performed_rounds += 1;
        self.rounds.push(record);
    }

    pub fn finish(&mut self, reason: StopReason) {
        self.stop_reason = Some(reason);
    }

    /// Knobs whose drift between a resumed session and the current request
    /// must be refused unless `allow-drift` is set.
    pub fn drifted_from(&self, prior: &Self) -> bool {
        self.max_rounds != prior.max_rounds || self.max_minutes != prior.max_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_session_has_zero_performed_rounds() {
        let session = GovernanceSession::disabled();
        assert!(session.is_disabled());
        assert_eq!(session.performed_rounds, 0);
        assert_eq!(session.stop_reason, Some(StopReason::Disabled));
    }

    #[test]
    fn recording_round_increments_performed_rounds() {
        let mut session = GovernanceSession::new(3, 60);
        session.record_round(GovernanceRoundRecord {
            round: 1,
            gate_outcome: None,
            had_high_anomaly: false,
            patch_applied: true,
            execution_mode: GovernanceExecutionMode::RecoveryCycle,
        });
        assert_eq!(session.performed_rounds, 1);
    }

    #[test]
    fn drift_detected_on_max_rounds_change() {
        let prior = GovernanceSession::new(3, 60);
        let requested = GovernanceSession::new(5, 60);
        assert!(requested.drifted_from(&prior));
    }
}
