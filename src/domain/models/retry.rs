//! Retry policy and round history.

use serde::{Deserialize, Serialize};

use super::batch::RateLimitTelemetry;

/// Retry round strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Decrements parallelism/budget under rate-limit pressure.
    Adaptive,
    /// Never adjusts parallelism/budget between rounds.
    Strict,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Adaptive
    }
}

/// Collapses `batchRetryRounds` / `batchRetryUntilComplete` /
/// `batchRetryMaxRounds` / `batchRetryStrategy` into one value type with its
/// own invariant, per the Design Notes' "collapse synonyms" guidance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Rounds to run regardless of outcome, 0..5.
    pub rounds: u32,
    /// Keep retrying until all goals resolve or `max_rounds` is hit.
    pub until_complete: bool,
    /// 1..20; defaults to 10 when `until_complete` and unset.
    pub max_rounds: u32,
    pub strategy: RetryStrategy,
}

impl RetryPolicy {
    pub const MIN_ROUNDS: u32 = 0;
    pub const MAX_ROUNDS_CAP: u32 = 5;
    pub const MIN_MAX_ROUNDS: u32 = 1;
    pub const MAX_MAX_ROUNDS: u32 = 20;
    pub const DEFAULT_UNTIL_COMPLETE_MAX_ROUNDS: u32 = 10;

    /// `until_complete ⇒ max_rounds defaults to 10` when not explicitly set.
    pub fn new(rounds: u32, until_complete: bool, max_rounds: Option<u32>, strategy: RetryStrategy) -> Self {
        let max_rounds = max_rounds.unwrap_or(if until_complete {
            Self::DEFAULT_UNTIL_COMPLETE_MAX_ROUNDS
        } else {
            rounds.max(Self::MIN_MAX_ROUNDS)
        });
        Self { rounds, until_complete, max_rounds, strategy }
    }

    /// The round budget actually enforced by the retry controller.
    pub const fn effective_max_rounds(&self) -> u32 {
        if self.until_complete { self.max_rounds } else { self.rounds }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.rounds > Self::MAX_ROUNDS_CAP {
            return Err(format!("batch_retry_rounds {} exceeds max {}", self.rounds, Self::MAX_ROUNDS_CAP));
        }
        if !(Self::MIN_MAX_ROUNDS..=Self::MAX_MAX_ROUNDS).contains(&self.max_rounds) {
            return Err(format!(
                "batch_retry_max_rounds {} out of range [{}, {}]",
                self.max_rounds, Self::MIN_MAX_ROUNDS, Self::MAX_MAX_ROUNDS
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(0, false, None, RetryStrategy::Adaptive)
    }
}

/// One retry round's recorded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryRoundHistory {
    pub round: u32,
    pub applied_batch_parallel: u32,
    pub applied_batch_agent_budget: Option<u32>,
    pub goals_in: u32,
    pub goals_processed: u32,
    pub goals_failed: u32,
    pub goals_unprocessed: u32,
    pub rate_limit: RateLimitTelemetry,
    pub adaptive_backpressure_applied: bool,
    pub next_batch_parallel: u32,
    pub next_batch_agent_budget: Option<u32>,
}

impl RetryRoundHistory {
    /// Applies the adaptive-decrement rule
    pub fn apply_adaptive_backpressure(&mut self, strategy: RetryStrategy) {
        self.adaptive_backpressure_applied = matches!(strategy, RetryStrategy::Adaptive)
            && self.rate_limit.indicates_pressure();
        if self.adaptive_backpressure_applied {
            self.next_batch_parallel = self.applied_batch_parallel.saturating_sub(1).max(1);
            self.next_batch_agent_budget =
                self.applied_batch_agent_budget.map(|b| b.saturating_sub(1).max(1));
        } else {
            self.next_batch_parallel = self.applied_batch_parallel;
            self.next_batch_agent_budget = self.applied_batch_agent_budget;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn until_complete_defaults_max_rounds_to_ten() {
        let policy = RetryPolicy::new(0, true, None, RetryStrategy::Adaptive);
        assert_eq!(policy.max_rounds, 10);
    }

    #[test]
    fn explicit_max_rounds_is_preserved() {
        let policy = RetryPolicy::new(0, true, Some(15), RetryStrategy::Adaptive);
        assert_eq!(policy.max_rounds, 15);
    }

    #[test]
    fn adaptive_backpressure_decrements_with_floor() {
        let mut round = RetryRoundHistory {
            round: 1,
            applied_batch_parallel: 1,
            applied_batch_agent_budget: Some(1),
            goals_in: 4,
            goals_processed: 4,
            goals_failed: 2,
            goals_unprocessed: 0,
            rate_limit: RateLimitTelemetry { signal_count: 5, ..Default::default() },
            adaptive_backpressure_applied: false,
            next_batch_parallel: 0,
            next_batch_agent_budget: None,
        };
        round.apply_adaptive_backpressure(RetryStrategy::Adaptive);
        assert!(round.adaptive_backpressure_applied);
        assert_eq!(round.next_batch_parallel, 1);
        assert_eq!(round.next_batch_agent_budget, Some(1));
    }

    #[test]
    fn strict_strategy_never_adjusts() {
        let mut round = RetryRoundHistory {
            round: 1,
            applied_batch_parallel: 3,
            applied_batch_agent_budget: Some(3),
            goals_in: 4,
            goals_processed: 4,
            goals_failed: 2,
            goals_unprocessed: 0,
            rate_limit: RateLimitTelemetry { signal_count: 5, ..Default::default() },
            adaptive_backpressure_applied: false,
            next_batch_parallel: 0,
            next_batch_agent_budget: None,
        };
        round.apply_adaptive_backpressure(RetryStrategy::Strict);
        assert!(!round.adaptive_backpressure_applied);
        assert_eq!(round.next_batch_parallel, 3);
    }
}
