//! Domain error types for the ACLO orchestration kernel.
//!
//! One variant per error kind from the error-handling design. Each
//! variant carries the structured context a caller needs to react, rather
//! than a free-text message alone.

use thiserror::Error;

/// Top-level kernel error.
#[derive(Error, Debug)]
pub enum AcloError {
    /// Out-of-range option, conflicting flags, or invalid JSON payload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A required file was absent; the caller should have auto-created it.
    ///
    /// Surfaced only when auto-creation itself failed (e.g. permissions).
    #[error("missing input at {path}: {reason}")]
    MissingInput { path: String, reason: String },

    /// A session/archive file could not be parsed. Non-fatal: the entry is
    /// reported as `invalid` and enumeration continues.
    #[error("failed to parse archive entry {path}: {reason}")]
    ArchiveParse { path: String, reason: String },

    /// A single goal execution raised an exception in the external spec
    /// builder.
    #[error("goal execution failed for source_index {source_index}: {message}")]
    GoalExecution { source_index: usize, message: String },

    /// Retry rounds were exhausted with goals still unresolved.
    #[error("retry budget was exhausted after {rounds} rounds")]
    RetryExhaustion { rounds: u32 },

    /// The convergence gate (and every fallback) rejected the run.
    #[error("gate failed: {}", .reasons.join("; "))]
    GateFailure { reasons: Vec<String> },

    /// A spec-session budget or growth guard hard-failed.
    #[error("spec-session guard hard-failed: {0}")]
    BudgetHardFail(String),

    /// The advisory queue lease was lost (token mismatch on refresh).
    #[error("lost queue lease: {0}")]
    LeaseLost(String),

    /// A resumed governance session's policy knobs drifted from the request
    /// without `allow-drift` being set.
    #[error("governance session drifted from prior run: {0}")]
    GovernanceDrift(String),

    /// Wraps an I/O failure with the path that triggered it.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Wraps a `serde_json` (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AcloError {
    /// Kinds the error-handling design marks "Locally recovered": the caller
    /// resets state and continues rather than surfacing a hard failure.
    pub const fn is_locally_recovered(&self) -> bool {
        matches!(self, Self::ArchiveParse { .. })
    }

    /// Whether this error should flip the CLI's exit code to 1
    pub const fn is_exit_triggering(&self) -> bool {
        !self.is_locally_recovered()
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Convenience alias used throughout the kernel.
pub type AcloResult<T> = Result<T, AcloError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_parse_is_locally_recovered() {
        let err = AcloError::ArchiveParse { path: "x".into(), reason: "bad json".into() };
        assert!(err.is_locally_recovered());
    }

    #[test]
    fn gate_failure_is_exit_triggering() {
        let err = AcloError::GateFailure { reasons: vec!["risk too high".into()] };
        assert!(err.is_exit_triggering());
        assert!(!err.is_locally_recovered());
    }

    #[test]
    fn validation_surfaces_message() {
        let err = AcloError::Validation("agent_budget out of range".into());
        assert_eq!(err.to_string(), "validation failed: agent_budget out of range");
    }
}
