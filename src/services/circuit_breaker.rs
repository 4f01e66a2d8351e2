//! Per-(signature, action) circuit breaker gating recovery-memory selection
//!
//! If the same `(signature, action)` pair fails `failure_threshold` times
//! within a rolling window, it is marked open and excluded from the
//! candidate set until `open_timeout` elapses. This never changes the
//! `ActionEntry::score` formula — it only removes an action from
//! consideration, falling through to the next-best scored candidate.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Tunables for the breaker.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub failure_window: Duration,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_window: Duration::from_secs(3600),
            open_timeout: Duration::from_secs(1800),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ActionCircuit {
    recent_failures: Vec<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
}

/// In-memory, per-process breaker over `(signature, action_key)` pairs.
/// Recovery memory itself remains the durable store; this tracks only
/// transient failure-rate state within the current process lifetime.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: HashMap<(String, String), ActionCircuit>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, circuits: HashMap::new() }
    }

    /// Record the outcome of one (signature, action) attempt.
    pub fn record(&mut self, signature: &str, action_key: &str, succeeded: bool, now: DateTime<Utc>) {
        let circuit = self.circuits.entry((signature.to_string(), action_key.to_string())).or_default();
        if succeeded {
            circuit.recent_failures.clear();
            circuit.opened_at = None;
            return;
        }

        circuit.recent_failures.push(now);
        let window = chrono::Duration::from_std(self.config.failure_window).unwrap_or(chrono::Duration::zero());
        let cutoff = now - window;
        circuit.recent_failures.retain(|t| *t >= cutoff);

        if circuit.recent_failures.len() as u32 >= self.config.failure_threshold {
            circuit.opened_at = Some(now);
        }
    }

    /// Whether this (signature, action) pair is currently excluded from
    /// selection.
    pub fn is_open(&self, signature: &str, action_key: &str, now: DateTime<Utc>) -> bool {
        let Some(circuit) = self.circuits.get(&(signature.to_string(), action_key.to_string())) else {
            return false;
        };
        match circuit.opened_at {
            Some(opened_at) => {
                let timeout = chrono::Duration::from_std(self.config.open_timeout).unwrap_or(chrono::Duration::zero());
                now < opened_at + timeout
            }
            None => false,
        }
    }

    /// Filter a scored candidate list down to those not currently open,
    /// preserving relative order (caller has already sorted by score).
    pub fn filter_open<'a, T>(
        &self,
        signature: &str,
        candidates: &'a [T],
        action_key_of: impl Fn(&T) -> &str,
        now: DateTime<Utc>,
    ) -> Vec<&'a T> {
        candidates.iter().filter(|c| !self.is_open(signature, action_key_of(c), now)).collect()
    }
}
