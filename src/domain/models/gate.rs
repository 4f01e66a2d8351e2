//! Convergence gate profiles and evaluation outcomes.

use serde::{Deserialize, Serialize};

/// Coarse risk classification derived from a run's failure rate and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Fixed gate-profile constants. Changing these values
/// requires a `schema_version` bump per the Open Questions resolution (see
/// the project's design ledger).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateProfileName {
    Default,
    Dev,
    Staging,
    Prod,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GateProfile {
    pub name: GateProfileName,
    pub min_success_percent: u8,
    pub max_risk: RiskLevel,
    pub max_minutes: Option<u32>,
    pub max_agent_budget: Option<u32>,
    pub max_sub_specs: Option<u32>,
}

impl GateProfile {
    pub const DEFAULT: Self = Self {
        name: GateProfileName::Default,
        min_success_percent: 100,
        max_risk: RiskLevel::High,
        max_minutes: None,
        max_agent_budget: None,
        max_sub_specs: None,
    };
    pub const DEV: Self = Self {
        name: GateProfileName::Dev,
        min_success_percent: 80,
        max_risk: RiskLevel::High,
        max_minutes: Some(240),
        max_agent_budget: Some(60),
        max_sub_specs: Some(500),
    };
    pub const STAGING: Self = Self {
        name: GateProfileName::Staging,
        min_success_percent: 95,
        max_risk: RiskLevel::Medium,
        max_minutes: Some(120),
        max_agent_budget: Some(30),
        max_sub_specs: Some(300),
    };
    pub const PROD: Self = Self {
        name: GateProfileName::Prod,
        min_success_percent: 100,
        max_risk: RiskLevel::Low,
        max_minutes: Some(60),
        max_agent_budget: Some(12),
        max_sub_specs: Some(120),
    };

    pub const fn for_name(name: GateProfileName) -> Self {
        match name {
            GateProfileName::Default => Self::DEFAULT,
            GateProfileName::Dev => Self::DEV,
            GateProfileName::Staging => Self::STAGING,
            GateProfileName::Prod => Self::PROD,
        }
    }
}

/// Inputs the evaluator reads from a finished `BatchSummary`.
#[derive(Debug, Clone, Copy)]
pub struct GateInputs {
    pub completion_rate_percent: f64,
    pub risk_level: RiskLevel,
    pub program_elapsed_ms: u64,
    pub agent_budget_or_effective_parallel: u32,
    pub total_sub_specs: u32,
}

impl GateInputs {
    /// `failureRate>20% → high; any failure or performed retry rounds →
    /// medium; else low`.
    pub fn derive_risk_level(failure_rate_percent: f64, had_failure: bool, retry_rounds_performed: u32) -> RiskLevel {
        if failure_rate_percent > 20.0 {
            RiskLevel::High
        } else if had_failure || retry_rounds_performed > 0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// A single policy-bound violation; at most one reason per bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateViolation {
    pub bound: String,
    pub reason: String,
}

/// Where the effective gate outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateSource {
    Primary,
    FallbackChain,
}

/// Result of evaluating one profile against one set of inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateVerdict {
    pub profile: GateProfileName,
    pub passed: bool,
    pub violations: Vec<GateViolation>,
}

impl GateVerdict {
    pub fn evaluate(profile: GateProfile, inputs: GateInputs) -> Self {
        let mut violations = Vec::new();

        if inputs.completion_rate_percent < f64::from(profile.min_success_percent) {
            violations.push(GateViolation {
                bound: "min_success_percent".into(),
                reason: format!(
                    "completion_rate_percent {:.1} below required {}",
                    inputs.completion_rate_percent, profile.min_success_percent
                ),
            });
        }
        if inputs.risk_level > profile.max_risk {
            violations.push(GateViolation {
                bound: "max_risk".into(),
                reason: format!("risk_level {:?} exceeds max {:?}", inputs.risk_level, profile.max_risk),
            });
        }
        if let Some(max_minutes) = profile.max_minutes {
            let elapsed_minutes = inputs.program_elapsed_ms / 60_000;
            if elapsed_minutes > u64::from(max_minutes) {
                violations.push(GateViolation {
                    bound: "max_minutes".into(),
                    reason: format!("program_elapsed {elapsed_minutes}m exceeds max {max_minutes}m"),
                });
            }
        }
        if let Some(max_agent) = profile.max_agent_budget {
            if inputs.agent_budget_or_effective_parallel > max_agent {
                violations.push(GateViolation {
                    bound: "max_agent_budget".into(),
                    reason: format!(
                        "agent_budget {} exceeds max {}",
                        inputs.agent_budget_or_effective_parallel, max_agent
                    ),
                });
            }
        }
        if let Some(max_sub_specs) = profile.max_sub_specs {
            if inputs.total_sub_specs > max_sub_specs {
                violations.push(GateViolation {
                    bound: "max_sub_specs".into(),
                    reason: format!("total_sub_specs {} exceeds max {}", inputs.total_sub_specs, max_sub_specs),
                });
            }
        }

        let passed = violations.is_empty();
        Self { profile: profile.name, passed, violations }
    }
}

/// Ordered, deduped list of relaxed profiles tried when the primary fails.
/// `none` is represented as an empty chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackChain(pub Vec<GateProfileName>);

impl FallbackChain {
    pub fn new(mut profiles: Vec<GateProfileName>) -> Self {
        let mut seen = std::collections::HashSet::new();
        profiles.retain(|p| seen.insert(*p));
        Self(profiles)
    }
}

/// The effective gate outcome after the fallback chain, if any, ran
///
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateOutcome {
    pub primary: GateVerdict,
    pub fallbacks: Vec<GateVerdict>,
    pub effective_passed: bool,
    pub source: GateSource,
    pub fallback_profile: Option<GateProfileName>,
}

impl GateOutcome {
    /// Run the primary, then on failure each fallback profile in order,
    /// preserving the primary's elapsed/budget/sub-spec caps.
    pub fn evaluate(primary_profile: GateProfile, fallback_chain: &FallbackChain, inputs: GateInputs) -> Self {
        let primary = GateVerdict::evaluate(primary_profile, inputs);
        if primary.passed {
            return Self {
                primary: primary.clone(),
                fallbacks: Vec::new(),
                effective_passed: true,
                source: GateSource::Primary,
                fallback_profile: None,
            };
        }

        let mut fallbacks = Vec::new();
        let mut chosen = None;
        for name in &fallback_chain.0 {
            let profile = GateProfile::for_name(*name);
            let verdict = GateVerdict::evaluate(profile, inputs);
            let passed = verdict.passed;
            fallbacks.push(verdict);
            if passed && chosen.is_none() {
                chosen = Some(*name);
            }
        }

        Self {
            primary,
            fallbacks,
            effective_passed: chosen.is_some(),
            source: if chosen.is_some() { GateSource::FallbackChain } else { GateSource::Primary },
            fallback_profile: chosen,
        }
    }
}
