//! Layered configuration for the orchestration kernel.
//!
//! `GlobalConfig ⟶ ProgramConfig ⟶ BatchConfig ⟶ GoalConfig`. Each layer
//! implements `merge` ("caller's explicit value wins, else inherit") and a
//! pure `validate`, so the source's ~80 CLI options collapse onto a finite
//! set of semantic knobs without hidden defaults.

use serde::{Deserialize, Serialize};

use super::gate::GateProfileName;
use super::plan::PriorityStrategy;
use super::retry::{RetryPolicy, RetryStrategy};

/// Root configuration layer: workspace- and process-wide defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Number of days session archives are retained before pruning.
    #[serde(default = "default_session_retention_days")]
    pub session_retention_days: u32,
    /// Number of newest sessions kept per kind regardless of age.
    #[serde(default = "default_session_retention_keep")]
    pub session_retention_keep: u32,
    /// Recovery-memory TTL, in days, for the prune pass.
    #[serde(default = "default_recovery_memory_ttl_days")]
    pub recovery_memory_ttl_days: i64,
    /// Default evidence-window size in weeks.
    #[serde(default = "default_evidence_window_weeks")]
    pub evidence_window_weeks: u32,
    /// Protection window for spec-session pruning, in days.
    #[serde(default = "default_protect_window_days")]
    pub protect_window_days: u32,
    /// TTL (seconds) for the advisory queue lease lock.
    #[serde(default = "default_queue_lock_ttl_seconds")]
    pub queue_lock_ttl_seconds: u64,
    /// Command used by the "Run strict quality gates" recovery action.
    /// Belongs in `GlobalConfig`, not hard-coded in the kernel.
    #[serde(default = "default_dod_tests_command")]
    pub dod_tests_command: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub program: ProgramConfig,
}

const fn default_session_retention_days() -> u32 {
    90
}
const fn default_session_retention_keep() -> u32 {
    50
}
const fn default_recovery_memory_ttl_days() -> i64 {
    180
}
const fn default_evidence_window_weeks() -> u32 {
    12
}
const fn default_protect_window_days() -> u32 {
    7
}
const fn default_queue_lock_ttl_seconds() -> u64 {
    1800
}
fn default_dod_tests_command() -> String {
    "npm run test:smoke".to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            session_retention_days: default_session_retention_days(),
            session_retention_keep: default_session_retention_keep(),
            recovery_memory_ttl_days: default_recovery_memory_ttl_days(),
            evidence_window_weeks: default_evidence_window_weeks(),
            protect_window_days: default_protect_window_days(),
            queue_lock_ttl_seconds: default_queue_lock_ttl_seconds(),
            dod_tests_command: default_dod_tests_command(),
            logging: LoggingConfig::default(),
            program: ProgramConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// "Caller's explicit value wins, else inherit" merge.
    #[must_use]
    pub fn merge(&self, overrides: &Self) -> Self {
        Self {
            session_retention_days: overrides.session_retention_days,
            session_retention_keep: overrides.session_retention_keep,
            recovery_memory_ttl_days: overrides.recovery_memory_ttl_days,
            evidence_window_weeks: overrides.evidence_window_weeks,
            protect_window_days: overrides.protect_window_days,
            queue_lock_ttl_seconds: overrides.queue_lock_ttl_seconds,
            dod_tests_command: overrides.dod_tests_command.clone(),
            logging: overrides.logging.clone(),
            program: self.program.merge(&overrides.program),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.queue_lock_ttl_seconds == 0 {
            return Err("queue_lock_ttl_seconds must be positive".into());
        }
        if self.dod_tests_command.trim().is_empty() {
            return Err("dod_tests_command cannot be empty".into());
        }
        if self.logging.format != "json" && self.logging.format != "pretty" {
            return Err(format!("logging.format must be \"json\" or \"pretty\", got {:?}", self.logging.format));
        }
        self.program.validate()
    }
}

/// Decomposition and gate policy layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProgramConfig {
    /// Target sub-goal count, 2..12, or `None` for heuristic default.
    pub target_sub_goal_count: Option<u8>,
    /// Minimum decomposition quality score to accept.
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: u8,
    #[serde(default = "default_gate_profile")]
    pub gate_profile: GateProfileName,
    #[serde(default)]
    pub gate_fallback_chain: Vec<GateProfileName>,
    #[serde(default)]
    pub governance_enabled: bool,
    #[serde(default = "default_governance_max_rounds")]
    pub governance_max_rounds: u32,
    #[serde(default = "default_governance_max_minutes")]
    pub governance_max_minutes: u32,
    #[serde(default = "default_true")]
    pub auto_remediation_enabled: bool,
    #[serde(default)]
    pub batch: BatchConfig,
}

const fn default_quality_threshold() -> u8 {
    70
}
const fn default_gate_profile() -> GateProfileName {
    GateProfileName::Default
}
const fn default_governance_max_rounds() -> u32 {
    3
}
const fn default_governance_max_minutes() -> u32 {
    60
}
const fn default_true() -> bool {
    true
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            target_sub_goal_count: None,
            quality_threshold: default_quality_threshold(),
            gate_profile: default_gate_profile(),
            gate_fallback_chain: Vec::new(),
            governance_enabled: false,
            governance_max_rounds: default_governance_max_rounds(),
            governance_max_minutes: default_governance_max_minutes(),
            auto_remediation_enabled: default_true(),
            batch: BatchConfig::default(),
        }
    }
}

impl ProgramConfig {
    #[must_use]
    pub fn merge(&self, overrides: &Self) -> Self {
        Self {
            target_sub_goal_count: overrides.target_sub_goal_count.or(self.target_sub_goal_count),
            quality_threshold: overrides.quality_threshold,
            gate_profile: overrides.gate_profile,
            gate_fallback_chain: overrides.gate_fallback_chain.clone(),
            governance_enabled: overrides.governance_enabled,
            governance_max_rounds: overrides.governance_max_rounds,
            governance_max_minutes: overrides.governance_max_minutes,
            auto_remediation_enabled: overrides.auto_remediation_enabled,
            batch: self.batch.merge(&overrides.batch),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(n) = self.target_sub_goal_count {
            if !(2..=12).contains(&n) {
                return Err(format!("target_sub_goal_count {n} out of range [2, 12]"));
            }
        }
        if !(1..=20).contains(&self.governance_max_rounds) && self.governance_max_rounds != 0 {
            return Err(format!("governance_max_rounds {} out of range", self.governance_max_rounds));
        }
        if !(1..=10_080).contains(&self.governance_max_minutes) {
            return Err(format!("governance_max_minutes {} out of range", self.governance_max_minutes));
        }
        self.batch.validate()
    }
}

/// Batch-execution and retry policy layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    #[serde(default = "default_batch_parallel")]
    pub batch_parallel: u32,
    pub batch_agent_budget: Option<u32>,
    #[serde(default)]
    pub priority_strategy: PriorityStrategy,
    #[serde(default = "default_aging_factor")]
    pub aging_factor: u32,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub goal: GoalConfig,
}

const fn default_batch_parallel() -> u32 {
    1
}
const fn default_aging_factor() -> u32 {
    1
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_parallel: default_batch_parallel(),
            batch_agent_budget: None,
            priority_strategy: PriorityStrategy::default(),
            aging_factor: default_aging_factor(),
            retry: RetryPolicy::default(),
            continue_on_error: false,
            dry_run: false,
            goal: GoalConfig::default(),
        }
    }
}

impl BatchConfig {
    #[must_use]
    pub fn merge(&self, overrides: &Self) -> Self {
        Self {
            batch_parallel: overrides.batch_parallel,
            batch_agent_budget: overrides.batch_agent_budget.or(self.batch_agent_budget),
            priority_strategy: overrides.priority_strategy,
            aging_factor: overrides.aging_factor,
            retry: overrides.retry,
            continue_on_error: overrides.continue_on_error,
            dry_run: overrides.dry_run,
            goal: self.goal.merge(&overrides.goal),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.batch_parallel == 0 {
            return Err("batch_parallel must be at least 1".into());
        }
        if let Some(budget) = self.batch_agent_budget {
            if !(1..=500).contains(&budget) {
                return Err(format!("batch_agent_budget {budget} out of range [1, 500]"));
            }
        }
        if self.aging_factor > 100 {
            return Err(format!("aging_factor {} out of range [0, 100]", self.aging_factor));
        }
        self.retry.validate().map_err(|e| e.to_string())?;
        self.goal.validate()
    }
}

/// Per-goal overrides layered on top of `BatchConfig`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GoalConfig {
    pub max_parallel: Option<u32>,
    pub use_action: Option<usize>,
    pub explicit_sub_count: Option<u8>,
}

impl GoalConfig {
    #[must_use]
    pub fn merge(&self, overrides: &Self) -> Self {
        Self {
            max_parallel: overrides.max_parallel.or(self.max_parallel),
            use_action: overrides.use_action.or(self.use_action),
            explicit_sub_count: overrides.explicit_sub_count.or(self.explicit_sub_count),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(n) = self.explicit_sub_count {
            if !(2..=12).contains(&n) {
                return Err(format!("explicit_sub_count {n} out of range [2, 12]"));
            }
        }
        Ok(())
    }
}

/// Rolling log-retention and format preferences (ambient, not kernel policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
const fn default_log_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            retention_days: default_log_retention_days(),
        }
    }
}

impl RetryStrategy {
    pub const ALL: [Self; 2] = [Self::Adaptive, Self::Strict];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_global_config_validates() {
        assert!(GlobalConfig::default().validate().is_ok());
    }

    #[test]
    fn merge_prefers_override_batch_parallel() {
        let base = BatchConfig::default();
        let mut overrides = BatchConfig::default();
        overrides.batch_parallel = 4;
        let merged = base.merge(&overrides);
        assert_eq!(merged.batch_parallel, 4);
    }

    #[test]
    fn merge_inherits_unset_goal_agent_budget() {
        let mut base = BatchConfig::default();
        base.batch_agent_budget = Some(10);
        let overrides = BatchConfig::default();
        let merged = base.merge(&overrides);
        assert_eq!(merged.batch_agent_budget, Some(10));
    }

    #[test]
    fn rejects_out_of_range_agent_budget() {
        let mut config = BatchConfig::default();
        config.batch_agent_budget = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_sub_goal_count() {
        let mut config = ProgramConfig::default();
        config.target_sub_goal_count = Some(1);
        assert!(config.validate().is_err());
    }
}
